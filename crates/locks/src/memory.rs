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

//! In-memory lock backend (single process).
//!
//! ## Purpose
//! Provides process-local readers-writer locks for deployments without a
//! shared store, and for tests.
//!
//! ## Limitations
//! - Not distributed (single process only)
//! - No leases: a lock is held until released, `extend` does nothing
//! - Waiters are served in the order tokio's `RwLock` queues them, which is
//!   FIFO today; callers must not depend on it

use crate::getter::LockGetter;
use crate::key::lock_key;
use crate::{ErrorLocker, ErrorRwLocker, LockResult, RenewableLocker};
use async_trait::async_trait;
use hearth_common::Prefixer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{trace, warn};

/// Getter handing out process-local locks.
///
/// One primitive is created per key and kept for the lifetime of the getter,
/// so every handle for the same key contends on the same lock.
#[derive(Default)]
pub struct MemoryLockGetter {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl MemoryLockGetter {
    /// Create a new in-memory lock getter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the lock stored under `key`.
    pub fn lock_for_key(&self, key: &str) -> MemoryLock {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let rw = locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone();
        MemoryLock::new(key.to_string(), rw)
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when no lock was ever requested.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LockGetter for MemoryLockGetter {
    fn read_write(&self, prefixer: &dyn Prefixer, name: &str) -> Arc<dyn ErrorRwLocker> {
        Arc::new(self.lock_for_key(&lock_key(prefixer, name)))
    }

    // Nothing expires locally, so a long operation is just the exclusive lock.
    fn long_operation(&self, prefixer: &dyn Prefixer, name: &str) -> Arc<dyn ErrorLocker> {
        Arc::new(self.lock_for_key(&lock_key(prefixer, name)))
    }
}

/// Handle on a process-local readers-writer lock.
///
/// Guards acquired through a handle are kept inside it until released, so a
/// handle can be shared between tasks the same way a bare mutex would be.
pub struct MemoryLock {
    key: String,
    rw: Arc<RwLock<()>>,
    writer: Mutex<Option<OwnedRwLockWriteGuard<()>>>,
    readers: Mutex<Vec<OwnedRwLockReadGuard<()>>>,
}

impl MemoryLock {
    fn new(key: String, rw: Arc<RwLock<()>>) -> Self {
        Self {
            key,
            rw,
            writer: Mutex::new(None),
            readers: Mutex::new(Vec::new()),
        }
    }

    /// Key this handle locks.
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl ErrorLocker for MemoryLock {
    async fn lock(&self) -> LockResult<()> {
        let guard = self.rw.clone().write_owned().await;
        *self.writer.lock().unwrap_or_else(|e| e.into_inner()) = Some(guard);
        trace!(key = %self.key, "memory lock acquired");
        Ok(())
    }

    async fn unlock(&self) {
        let guard = self.writer.lock().unwrap_or_else(|e| e.into_inner()).take();
        match guard {
            Some(guard) => {
                drop(guard);
                trace!(key = %self.key, "memory lock released");
            }
            None => warn!(key = %self.key, "unlock called on a memory lock that is not held"),
        }
    }
}

#[async_trait]
impl ErrorRwLocker for MemoryLock {
    async fn rlock(&self) -> LockResult<()> {
        let guard = self.rw.clone().read_owned().await;
        self.readers.lock().unwrap_or_else(|e| e.into_inner()).push(guard);
        Ok(())
    }

    async fn runlock(&self) {
        let guard = self.readers.lock().unwrap_or_else(|e| e.into_inner()).pop();
        if guard.is_none() {
            warn!(key = %self.key, "runlock called on a memory lock without readers");
        }
    }
}

#[async_trait]
impl RenewableLocker for MemoryLock {
    async fn extend(&self) {}
}
