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

//! # Hearth Locks
//!
//! ## Purpose
//! Lets request handlers, possibly spread over several processes and
//! machines, take exclusive or shared access to a named resource of a tenant
//! ("alice's file tree", "bob's sharing record").
//!
//! ## Architecture Context
//! This crate is used by:
//! - **File tree**: read/write locks around tree mutations
//! - **Sharing**: exclusive locks on sharing records
//! - **Jobs**: long-operation locks around job runs
//!
//! ## Design Decisions
//! - **Tenant-scoped keys**: `<tenant>/<name>`, collision free across tenants
//! - **Capability traits**: [`ErrorLocker`], [`ErrorRwLocker`] and
//!   [`RenewableLocker`], implemented by every backend
//! - **Leases with owner tokens**: crashed holders expire, stale holders
//!   cannot release or renew someone else's lease
//! - **Background renewal**: [`LongOperation`] keeps a lease alive for
//!   operations of unknown length
//! - **No global state**: [`new_getter`] builds a getter that callers pass down
//!
//! ## Backend Support
//!
//! - **InMemory**: tokio `RwLock` per key (always available)
//! - **Redis**: leases with native TTL (feature: `redis-backend`)
//!
//! ## Examples
//!
//! ### Basic Usage
//! ```rust,no_run
//! use hearth_common::TenantPrefixer;
//! use hearth_locks::{new_getter, ErrorLocker, ErrorRwLocker, LockConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let getter = new_getter(&LockConfig::from_env()?).await?;
//! let tenant = TenantPrefixer::new("alice.example.net", "alice");
//!
//! // Shared access
//! let lock = getter.read_write(&tenant, "vfs");
//! lock.rlock().await?;
//! lock.runlock().await;
//!
//! // Exclusive access for an operation of unknown length
//! let long = getter.long_operation(&tenant, "jobs/import");
//! long.lock().await?;
//! long.unlock().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod distributed;
pub mod error;
pub mod getter;
pub mod key;
pub mod locker;
pub mod long_operation;
pub mod memory;
pub mod store;

pub use config::{BackendType, LockConfig, LockOptions, RedisOptions};
pub use distributed::{DistributedLock, DistributedLockGetter};
pub use error::{LockError, LockResult};
pub use getter::{new_getter, LockGetter};
pub use key::lock_key;
pub use locker::{ErrorLocker, ErrorRwLocker, RenewableLocker};
pub use long_operation::LongOperation;
pub use memory::{MemoryLock, MemoryLockGetter};
pub use store::{LeaseStore, MemoryLeaseStore};
