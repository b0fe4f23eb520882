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

//! Process-local lease store with real expiry.
//!
//! Behaves like the Redis store, including TTLs, but lives in one process.
//! Expiry is measured with `tokio::time::Instant`, so tests running on a
//! paused clock can advance past a lease deterministically. The store can also
//! be switched offline to simulate an unreachable backend.

use super::LeaseStore;
use crate::{LockError, LockResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct WriterLease {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
struct Leases {
    writers: HashMap<String, WriterLease>,
    /// Reader token to expiry, per key
    readers: HashMap<String, HashMap<String, Instant>>,
}

impl Leases {
    fn purge_expired(&mut self, key: &str, now: Instant) {
        if self.writers.get(key).is_some_and(|w| w.expires_at <= now) {
            self.writers.remove(key);
        }
        if let Some(readers) = self.readers.get_mut(key) {
            readers.retain(|_, expires_at| *expires_at > now);
            if readers.is_empty() {
                self.readers.remove(key);
            }
        }
    }
}

/// In-process [`LeaseStore`].
#[derive(Default)]
pub struct MemoryLeaseStore {
    leases: Mutex<Leases>,
    offline: AtomicBool,
}

impl MemoryLeaseStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a backend error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Token of the live writer lease on `key`, if any.
    pub fn holder(&self, key: &str) -> Option<String> {
        let mut leases = self.leases();
        leases.purge_expired(key, Instant::now());
        leases.writers.get(key).map(|w| w.token.clone())
    }

    /// Number of live readers registered on `key`.
    pub fn reader_count(&self, key: &str) -> u64 {
        let mut leases = self.leases();
        leases.purge_expired(key, Instant::now());
        leases.readers.get(key).map(|r| r.len() as u64).unwrap_or(0)
    }

    fn leases(&self) -> std::sync::MutexGuard<'_, Leases> {
        self.leases.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(&self) -> LockResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LockError::BackendError("memory lease store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn try_acquire_write(&self, key: &str, token: &str, lease: Duration) -> LockResult<bool> {
        self.check_online()?;
        let now = Instant::now();
        let mut leases = self.leases();
        leases.purge_expired(key, now);
        if leases.readers.contains_key(key) {
            return Ok(false);
        }
        match leases.writers.get_mut(key) {
            Some(writer) if writer.token == token => {
                writer.expires_at = now + lease;
                return Ok(true);
            }
            Some(_) => return Ok(false),
            None => {}
        }
        leases.writers.insert(key.to_string(), WriterLease {
            token: token.to_string(),
            expires_at: now + lease,
        });
        Ok(true)
    }

    async fn release_write(&self, key: &str, token: &str) -> LockResult<bool> {
        self.check_online()?;
        let mut leases = self.leases();
        leases.purge_expired(key, Instant::now());
        if leases.writers.get(key).is_some_and(|w| w.token == token) {
            leases.writers.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn extend_write(&self, key: &str, token: &str, lease: Duration) -> LockResult<bool> {
        self.check_online()?;
        let now = Instant::now();
        let mut leases = self.leases();
        leases.purge_expired(key, now);
        match leases.writers.get_mut(key) {
            Some(writer) if writer.token == token => {
                writer.expires_at = now + lease;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn try_acquire_read(&self, key: &str, token: &str, lease: Duration) -> LockResult<bool> {
        self.check_online()?;
        let now = Instant::now();
        let mut leases = self.leases();
        leases.purge_expired(key, now);
        if leases.writers.contains_key(key) {
            return Ok(false);
        }
        leases
            .readers
            .entry(key.to_string())
            .or_default()
            .insert(token.to_string(), now + lease);
        Ok(true)
    }

    async fn release_read(&self, key: &str, token: &str) -> LockResult<bool> {
        self.check_online()?;
        let mut leases = self.leases();
        leases.purge_expired(key, Instant::now());
        let Some(readers) = leases.readers.get_mut(key) else {
            return Ok(false);
        };
        let released = readers.remove(token).is_some();
        if readers.is_empty() {
            leases.readers.remove(key);
        }
        Ok(released)
    }
}
