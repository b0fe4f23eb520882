// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of Hearth.
//
// Hearth is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// Hearth is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Hearth. If not, see <https://www.gnu.org/licenses/>.

//! Lock getter: the entry point the rest of the platform uses to obtain locks.

use crate::config::{BackendType, LockConfig};
use crate::memory::MemoryLockGetter;
use crate::{ErrorLocker, ErrorRwLocker, LockResult};
use hearth_common::Prefixer;
use std::sync::Arc;
use tracing::info;

/// Hands out locks on tenant-scoped resources.
///
/// ## Purpose
/// Lets the file tree, sharing and job subsystems lock a resource by
/// `(tenant, name)` without knowing which backend is configured.
///
/// ## Naming
/// `name` identifies the resource within the tenant, by convention the name
/// of the subsystem that owns it (e.g. `vfs`, `sharings/<id>`). Any string is
/// valid; asking for a lock never fails.
///
/// ## Example
/// ```rust,no_run
/// use hearth_common::TenantPrefixer;
/// use hearth_locks::{new_getter, ErrorLocker, LockConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let getter = new_getter(&LockConfig::in_memory()).await?;
/// let tenant = TenantPrefixer::new("alice.example.net", "alice");
///
/// let lock = getter.read_write(&tenant, "vfs");
/// lock.lock().await?;
/// // ... mutate the file tree ...
/// lock.unlock().await;
/// # Ok(())
/// # }
/// ```
pub trait LockGetter: Send + Sync {
    /// Readers-writer lock on `name` within the tenant of `prefixer`.
    fn read_write(&self, prefixer: &dyn Prefixer, name: &str) -> Arc<dyn ErrorRwLocker>;

    /// Exclusive lock on `name` that stays held for as long as the operation
    /// runs, renewing its lease in the background when the backend has one.
    fn long_operation(&self, prefixer: &dyn Prefixer, name: &str) -> Arc<dyn ErrorLocker>;
}

/// Build the getter described by `config`.
///
/// ## Behavior
/// - `BackendType::InMemory`: process-local locks
/// - `BackendType::Redis`: connects to Redis and returns distributed locks
///
/// ## Errors
/// - [`crate::LockError::ConfigError`]: invalid options, or Redis requested
///   without the `redis-backend` feature
/// - [`crate::LockError::BackendError`]: Redis could not be reached
pub async fn new_getter(config: &LockConfig) -> LockResult<Arc<dyn LockGetter>> {
    config.options.validate()?;

    match &config.backend {
        BackendType::InMemory => {
            info!("using in-memory locks");
            Ok(Arc::new(MemoryLockGetter::new()))
        }
        #[cfg(feature = "redis-backend")]
        BackendType::Redis { url, namespace, connection } => {
            use crate::distributed::DistributedLockGetter;
            use crate::store::RedisLeaseStore;

            connection.validate()?;
            let store = RedisLeaseStore::connect(url, namespace, connection).await?;
            info!(
                namespace = %namespace,
                lease_ms = config.options.lease_duration.as_millis() as u64,
                "using redis locks"
            );
            Ok(Arc::new(DistributedLockGetter::new(Arc::new(store), config.options)))
        }
        #[cfg(not(feature = "redis-backend"))]
        BackendType::Redis { .. } => Err(crate::LockError::ConfigError(
            "redis locks require the redis-backend feature".to_string(),
        )),
    }
}
