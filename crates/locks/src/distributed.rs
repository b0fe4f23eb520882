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

//! Distributed lock backend.
//!
//! ## Purpose
//! Implements the lock contracts on top of a shared [`LeaseStore`], so that
//! processes on different machines exclude each other.
//!
//! ## Design
//! - **Token per acquisition**: every `lock` and `rlock` uses a fresh ULID;
//!   release and renewal only act on a lease still holding that token, so a
//!   holder whose lease expired can never touch its successor's lease. The
//!   token is kept across retries of one acquisition, which makes a retry
//!   after a lost reply succeed instead of colliding with itself
//! - **Single writer per handle**: `lock` on a handle that already holds the
//!   writer lease fails with [`LockError::AlreadyHeld`]
//! - **Lease expiry**: a crashed holder is reclaimed once its lease runs out
//! - **Bounded retry**: contention and backend errors are retried with a
//!   randomized backoff until `max_wait` is spent, then reported as
//!   [`LockError::AcquireTimeout`]
//! - **Fire-and-forget cleanup**: `unlock`, `runlock` and `extend` only log
//!   and count failures
//!
//! No fairness between waiters: under sustained contention a waiter can
//! starve.

use crate::config::LockOptions;
use crate::getter::LockGetter;
use crate::key::lock_key;
use crate::long_operation::LongOperation;
use crate::store::LeaseStore;
use crate::{ErrorLocker, ErrorRwLocker, LockError, LockResult, RenewableLocker};
use async_trait::async_trait;
use hearth_common::Prefixer;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use ulid::Ulid;

/// Getter handing out locks backed by a shared lease store.
pub struct DistributedLockGetter {
    store: Arc<dyn LeaseStore>,
    options: LockOptions,
}

impl DistributedLockGetter {
    /// Create a getter over `store` using `options` for every lock.
    pub fn new(store: Arc<dyn LeaseStore>, options: LockOptions) -> Self {
        Self { store, options }
    }

    /// Lock on an already-built key.
    pub fn lock_for_key(&self, key: &str) -> DistributedLock {
        DistributedLock::new(self.store.clone(), key.to_string(), self.options)
    }

    /// Lease and retry policy of the locks built by this getter.
    pub fn options(&self) -> &LockOptions {
        &self.options
    }
}

impl LockGetter for DistributedLockGetter {
    fn read_write(&self, prefixer: &dyn Prefixer, name: &str) -> Arc<dyn ErrorRwLocker> {
        Arc::new(self.lock_for_key(&lock_key(prefixer, name)))
    }

    fn long_operation(&self, prefixer: &dyn Prefixer, name: &str) -> Arc<dyn ErrorLocker> {
        let key = lock_key(prefixer, name);
        let inner = Arc::new(self.lock_for_key(&key));
        Arc::new(LongOperation::new(key, inner, self.options.lease_duration))
    }
}

enum Acquisition<'a> {
    Write { token: &'a str },
    Read { token: &'a str },
}

impl Acquisition<'_> {
    fn mode(&self) -> &'static str {
        match self {
            Acquisition::Write { .. } => "write",
            Acquisition::Read { .. } => "read",
        }
    }
}

/// Readers-writer lock held as leases in a [`LeaseStore`].
pub struct DistributedLock {
    store: Arc<dyn LeaseStore>,
    key: String,
    options: LockOptions,
    /// Token of the writer lease this handle holds
    token: Mutex<Option<String>>,
    /// Tokens of the readers registered through this handle
    readers: Mutex<Vec<String>>,
}

impl DistributedLock {
    /// Create a lock on `key`. Nothing is written to the store until `lock`
    /// or `rlock`.
    pub fn new(store: Arc<dyn LeaseStore>, key: String, options: LockOptions) -> Self {
        Self {
            store,
            key,
            options,
            token: Mutex::new(None),
            readers: Mutex::new(Vec::new()),
        }
    }

    /// Key this lock guards.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Token of the current writer lease, if this handle believes it holds one.
    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn backoff(&self) -> Duration {
        let (min, max) = (self.options.backoff_min, self.options.backoff_max);
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    async fn try_once(&self, acquisition: &Acquisition<'_>) -> LockResult<bool> {
        let lease = self.options.lease_duration;
        match acquisition {
            Acquisition::Write { token } => self.store.try_acquire_write(&self.key, token, lease).await,
            Acquisition::Read { token } => self.store.try_acquire_read(&self.key, token, lease).await,
        }
    }

    /// Retry `acquisition`, backing off between tries, until it succeeds or
    /// the wait budget is spent.
    async fn acquire(&self, acquisition: Acquisition<'_>) -> LockResult<()> {
        let mode = acquisition.mode();
        let started = Instant::now();
        let deadline = started + self.options.max_wait;
        let backend = self.store.backend_name();
        let mut attempts = 0u32;
        let mut last_error = None;

        loop {
            attempts += 1;
            match self.try_once(&acquisition).await {
                Ok(true) => {
                    metrics::histogram!(
                        "hearth_locks_acquire_wait_seconds",
                        "backend" => backend,
                        "mode" => mode
                    )
                    .record(started.elapsed().as_secs_f64());
                    metrics::counter!(
                        "hearth_locks_acquire_total",
                        "backend" => backend,
                        "mode" => mode,
                        "result" => "acquired"
                    )
                    .increment(1);
                    debug!(key = %self.key, mode, attempts, "lock acquired");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %self.key, mode, attempts, error = %e, "lock backend error while acquiring");
                    metrics::counter!(
                        "hearth_locks_backend_errors_total",
                        "backend" => backend,
                        "op" => "acquire"
                    )
                    .increment(1);
                    last_error = Some(e.to_string());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let delay = self.backoff().min(deadline - now);
            tokio::time::sleep(delay).await;
        }

        metrics::counter!(
            "hearth_locks_acquire_total",
            "backend" => backend,
            "mode" => mode,
            "result" => "timeout"
        )
        .increment(1);
        warn!(key = %self.key, mode, attempts, "gave up acquiring lock");
        Err(LockError::AcquireTimeout {
            key: self.key.clone(),
            attempts,
            last_error,
        })
    }

    fn count_stale(&self, mode: &'static str) {
        metrics::counter!(
            "hearth_locks_release_stale_total",
            "backend" => self.store.backend_name(),
            "mode" => mode
        )
        .increment(1);
    }

    fn count_backend_error(&self, op: &'static str) {
        metrics::counter!(
            "hearth_locks_backend_errors_total",
            "backend" => self.store.backend_name(),
            "op" => op
        )
        .increment(1);
    }
}

#[async_trait]
impl ErrorLocker for DistributedLock {
    #[instrument(skip(self), fields(key = %self.key))]
    async fn lock(&self) -> LockResult<()> {
        if self.token().is_some() {
            return Err(LockError::AlreadyHeld(self.key.clone()));
        }
        let token = Ulid::new().to_string();
        self.acquire(Acquisition::Write { token: &token }).await?;

        let installed = {
            let mut held = self.token.lock().unwrap_or_else(|e| e.into_inner());
            if held.is_none() {
                *held = Some(token.clone());
                true
            } else {
                false
            }
        };
        if !installed {
            // Another task locked this handle while we waited.
            if let Err(e) = self.store.release_write(&self.key, &token).await {
                warn!(key = %self.key, error = %e, "failed to release duplicate lease, it will expire");
                self.count_backend_error("release");
            }
            return Err(LockError::AlreadyHeld(self.key.clone()));
        }
        Ok(())
    }

    async fn unlock(&self) {
        let token = self.token.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(token) = token else {
            warn!(key = %self.key, "unlock called on a distributed lock that is not held");
            return;
        };
        match self.store.release_write(&self.key, &token).await {
            Ok(true) => debug!(key = %self.key, "lock released"),
            Ok(false) => {
                // Our lease expired and may belong to someone else by now.
                warn!(key = %self.key, "lease lost before unlock, nothing released");
                self.count_stale("write");
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to release lock, lease will expire");
                self.count_backend_error("release");
            }
        }
    }
}

#[async_trait]
impl ErrorRwLocker for DistributedLock {
    #[instrument(skip(self), fields(key = %self.key))]
    async fn rlock(&self) -> LockResult<()> {
        let token = Ulid::new().to_string();
        self.acquire(Acquisition::Read { token: &token }).await?;
        self.readers.lock().unwrap_or_else(|e| e.into_inner()).push(token);
        Ok(())
    }

    async fn runlock(&self) {
        let token = self.readers.lock().unwrap_or_else(|e| e.into_inner()).pop();
        let Some(token) = token else {
            warn!(key = %self.key, "runlock called on a distributed lock without readers");
            return;
        };
        match self.store.release_read(&self.key, &token).await {
            Ok(true) => debug!(key = %self.key, "read lock released"),
            Ok(false) => {
                warn!(key = %self.key, "read lease lost before runlock, nothing released");
                self.count_stale("read");
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to release read lock, reader lease will expire");
                self.count_backend_error("release_read");
            }
        }
    }
}

#[async_trait]
impl RenewableLocker for DistributedLock {
    async fn extend(&self) {
        let Some(token) = self.token() else {
            debug!(key = %self.key, "extend called without a held lease");
            return;
        };
        match self
            .store
            .extend_write(&self.key, &token, self.options.lease_duration)
            .await
        {
            Ok(true) => debug!(key = %self.key, "lease extended"),
            Ok(false) => {
                warn!(key = %self.key, "lease lost, not extending");
                self.count_stale("extend");
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to extend lease");
                self.count_backend_error("extend");
            }
        }
    }
}
