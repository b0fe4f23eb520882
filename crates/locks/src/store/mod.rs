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

//! Lease store protocol used by the distributed backend.
//!
//! ## Purpose
//! The distributed backend needs only a handful of atomic primitives from its
//! shared store. This trait names them so the locking algorithm can run
//! against Redis in production and against a process-local fake in tests.
//!
//! ## Guarantees required from implementors
//! Every method must be atomic with respect to every other method on the same
//! key:
//! - a writer lease is set only if no writer lease exists and no live reader
//!   is registered
//! - a reader is registered only if no writer lease exists
//! - release and extend of a writer lease apply only when the stored token is
//!   the caller's
//! - every reader holds its own token and lease, and releasing one reader
//!   never affects another
//! - acquisition is idempotent per token: retrying with a token that already
//!   holds the lease succeeds, so a lost reply cannot orphan a lease

pub mod memory;

#[cfg(feature = "redis-backend")]
pub mod redis;

pub use memory::MemoryLeaseStore;

#[cfg(feature = "redis-backend")]
pub use self::redis::RedisLeaseStore;

use crate::LockResult;
use async_trait::async_trait;
use std::time::Duration;

/// Atomic lease primitives over a shared key/value store.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Short name used in logs and metrics labels.
    fn backend_name(&self) -> &'static str;

    /// Store `token` under `key` with a TTL of `lease` if the key holds no
    /// writer lease and has no live readers. If the lease already holds
    /// `token` its TTL is reset and the call succeeds. Returns whether the
    /// lease is held by `token`.
    async fn try_acquire_write(&self, key: &str, token: &str, lease: Duration) -> LockResult<bool>;

    /// Delete the writer lease of `key` if it still holds `token`. Returns
    /// `false` when the lease is gone or owned by someone else.
    async fn release_write(&self, key: &str, token: &str) -> LockResult<bool>;

    /// Reset the TTL of the writer lease of `key` to `lease` if it still holds
    /// `token`. Returns `false` when the lease is gone or owned by someone else.
    async fn extend_write(&self, key: &str, token: &str, lease: Duration) -> LockResult<bool>;

    /// Register reader `token` on `key` with its own TTL of `lease` if no
    /// writer lease exists. Registering a token twice only resets its TTL.
    async fn try_acquire_read(&self, key: &str, token: &str, lease: Duration) -> LockResult<bool>;

    /// Unregister reader `token` from `key`. Returns `false` when that reader
    /// already expired.
    async fn release_read(&self, key: &str, token: &str) -> LockResult<bool>;
}
