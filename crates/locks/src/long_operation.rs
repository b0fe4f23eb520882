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

//! Long-operation locks.
//!
//! ## Purpose
//! Some operations (imports, moves of whole trees, job runs) take longer than
//! one lease. [`LongOperation`] wraps a [`RenewableLocker`] and keeps its
//! lease alive from `lock` until `unlock` with a background renewal task.
//!
//! ## Design
//! - The renewal task ticks every `lease / 3`, so at least two renewals are
//!   attempted before the lease could run out even if one tick is late
//! - The task is owned through a small state machine
//!   (`Idle` → `Acquiring` → `Renewing` → `Stopped`) behind one async mutex
//!   that is never held while waiting for the inner lock
//! - `unlock` signals the task, joins it (a tick already calling `extend`
//!   finishes first), and only then releases the inner lock, so no renewal
//!   ever races with the release
//! - Dropping a handle without `unlock` closes the stop channel, which also
//!   ends the task
//!
//! One `lock`/`unlock` pair per logical operation; concurrent operations need
//! their own handles.

use crate::{ErrorLocker, LockError, LockResult, RenewableLocker};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

const MIN_RENEWAL_PERIOD: Duration = Duration::from_millis(1);

enum RenewalState {
    Idle,
    Acquiring,
    Renewing {
        stop: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Exclusive lock whose lease is renewed in the background while held.
pub struct LongOperation {
    key: String,
    lock: Arc<dyn RenewableLocker>,
    period: Duration,
    state: Mutex<RenewalState>,
}

impl LongOperation {
    /// Wrap `lock`, whose lease lasts `lease`.
    pub fn new(key: impl Into<String>, lock: Arc<dyn RenewableLocker>, lease: Duration) -> Self {
        Self {
            key: key.into(),
            lock,
            period: (lease / 3).max(MIN_RENEWAL_PERIOD),
            state: Mutex::new(RenewalState::Idle),
        }
    }

    /// Interval between two renewals.
    pub fn renewal_period(&self) -> Duration {
        self.period
    }

    /// True while the renewal task is running.
    pub async fn is_renewing(&self) -> bool {
        matches!(*self.state.lock().await, RenewalState::Renewing { .. })
    }
}

async fn renew(
    lock: Arc<dyn RenewableLocker>,
    key: String,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {
                trace!(key = %key, "renewing lease");
                lock.extend().await;
            }
        }
    }
    debug!(key = %key, "lease renewal stopped");
}

#[async_trait]
impl ErrorLocker for LongOperation {
    async fn lock(&self) -> LockResult<()> {
        {
            let mut state = self.state.lock().await;
            if matches!(*state, RenewalState::Acquiring | RenewalState::Renewing { .. }) {
                return Err(LockError::AlreadyHeld(self.key.clone()));
            }
            *state = RenewalState::Acquiring;
        }

        let acquired = self.lock.lock().await;

        let mut state = self.state.lock().await;
        if let Err(e) = acquired {
            *state = RenewalState::Idle;
            return Err(e);
        }
        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(renew(self.lock.clone(), self.key.clone(), self.period, stop_rx));
        *state = RenewalState::Renewing { stop, handle };
        debug!(key = %self.key, period_ms = self.period.as_millis() as u64, "long operation started");
        Ok(())
    }

    async fn unlock(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, RenewalState::Acquiring) {
            warn!(key = %self.key, "unlock called while the long operation is still acquiring");
            return;
        }
        match std::mem::replace(&mut *state, RenewalState::Stopped) {
            RenewalState::Renewing { stop, handle } => {
                // A send error means the task already ended.
                let _ = stop.send(());
                if let Err(e) = handle.await {
                    warn!(key = %self.key, error = %e, "lease renewal task failed");
                }
            }
            RenewalState::Idle | RenewalState::Acquiring | RenewalState::Stopped => {
                warn!(key = %self.key, "unlock called on a long operation that is not held");
            }
        }
        self.lock.unlock().await;
        debug!(key = %self.key, "long operation finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockOptions;
    use crate::distributed::DistributedLock;
    use crate::store::MemoryLeaseStore;
    use std::sync::Mutex as StdMutex;

    const LEASE: Duration = Duration::from_secs(2);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Lock,
        ExtendStart,
        ExtendEnd,
        Unlock,
    }

    #[derive(Default)]
    struct RecordingLock {
        events: StdMutex<Vec<Event>>,
        fail_lock: bool,
        lock_delay: Duration,
        extend_delay: Duration,
    }

    impl RecordingLock {
        fn record(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn extends(&self) -> usize {
            self.events().iter().filter(|e| **e == Event::ExtendEnd).count()
        }
    }

    #[async_trait]
    impl ErrorLocker for RecordingLock {
        async fn lock(&self) -> LockResult<()> {
            if !self.lock_delay.is_zero() {
                tokio::time::sleep(self.lock_delay).await;
            }
            if self.fail_lock {
                return Err(LockError::BackendError("unreachable".to_string()));
            }
            self.record(Event::Lock);
            Ok(())
        }

        async fn unlock(&self) {
            self.record(Event::Unlock);
        }
    }

    #[async_trait]
    impl RenewableLocker for RecordingLock {
        async fn extend(&self) {
            self.record(Event::ExtendStart);
            if !self.extend_delay.is_zero() {
                tokio::time::sleep(self.extend_delay).await;
            }
            self.record(Event::ExtendEnd);
        }
    }

    #[test]
    fn test_period_is_third_of_lease() {
        let op = LongOperation::new("k", Arc::new(RecordingLock::default()), Duration::from_secs(30));
        assert_eq!(op.renewal_period(), Duration::from_secs(10));

        let tiny = LongOperation::new("k", Arc::new(RecordingLock::default()), Duration::ZERO);
        assert_eq!(tiny.renewal_period(), MIN_RENEWAL_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_survives_twice_its_duration() {
        let store = Arc::new(MemoryLeaseStore::new());
        let options = LockOptions {
            lease_duration: LEASE,
            ..Default::default()
        };
        let inner = Arc::new(DistributedLock::new(store.clone(), "alice/jobs".to_string(), options));
        let op = LongOperation::new("alice/jobs", inner.clone(), LEASE);

        op.lock().await.unwrap();
        let token = inner.token();
        assert!(token.is_some());

        tokio::time::sleep(LEASE * 2).await;
        assert_eq!(store.holder("alice/jobs"), token);

        let rival = DistributedLock::new(store.clone(), "alice/jobs".to_string(), LockOptions {
            lease_duration: LEASE,
            max_wait: Duration::from_millis(300),
            ..Default::default()
        });
        assert!(rival.lock().await.is_err());

        op.unlock().await;
        assert_eq!(store.holder("alice/jobs"), None);
        rival.lock().await.unwrap();
        rival.unlock().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_renewal_lease_expires() {
        let store = Arc::new(MemoryLeaseStore::new());
        let options = LockOptions {
            lease_duration: LEASE,
            ..Default::default()
        };
        let plain = DistributedLock::new(store.clone(), "alice/jobs".to_string(), options);
        plain.lock().await.unwrap();
        tokio::time::sleep(LEASE * 2).await;
        assert_eq!(store.holder("alice/jobs"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renews_every_period() {
        let inner = Arc::new(RecordingLock::default());
        let op = LongOperation::new("k", inner.clone(), Duration::from_secs(3));

        op.lock().await.unwrap();
        assert!(op.is_renewing().await);
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(inner.extends(), 3);
        op.unlock().await;
        assert!(!op.is_renewing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_renewal_after_unlock() {
        let inner = Arc::new(RecordingLock::default());
        let op = LongOperation::new("k", inner.clone(), Duration::from_secs(3));

        op.lock().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        op.unlock().await;
        let extends = inner.extends();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(inner.extends(), extends);
        assert_eq!(inner.events().last(), Some(&Event::Unlock));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_waits_for_tick_in_progress() {
        let inner = Arc::new(RecordingLock {
            extend_delay: Duration::from_millis(200),
            ..Default::default()
        });
        let op = LongOperation::new("k", inner.clone(), Duration::from_secs(3));

        op.lock().await.unwrap();
        // Land in the middle of the first extend.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(inner.events().last(), Some(&Event::ExtendStart));

        op.unlock().await;
        assert_eq!(
            inner.events(),
            vec![Event::Lock, Event::ExtendStart, Event::ExtendEnd, Event::Unlock]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_lock_rejected() {
        let inner = Arc::new(RecordingLock::default());
        let op = LongOperation::new("alice/jobs", inner.clone(), LEASE);
        op.lock().await.unwrap();
        match op.lock().await {
            Err(LockError::AlreadyHeld(key)) => assert_eq!(key, "alice/jobs"),
            other => panic!("expected AlreadyHeld, got {other:?}"),
        }
        op.unlock().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_for_inner_lock_does_not_block_state() {
        let inner = Arc::new(RecordingLock {
            lock_delay: Duration::from_secs(5),
            ..Default::default()
        });
        let op = Arc::new(LongOperation::new("alice/jobs", inner.clone(), LEASE));

        let first = {
            let op = op.clone();
            tokio::spawn(async move { op.lock().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let renewing = tokio::time::timeout(Duration::from_millis(10), op.is_renewing()).await;
        assert_eq!(renewing.ok(), Some(false));
        let second = tokio::time::timeout(Duration::from_millis(10), op.lock()).await;
        match second {
            Ok(Err(LockError::AlreadyHeld(key))) => assert_eq!(key, "alice/jobs"),
            other => panic!("expected AlreadyHeld without waiting, got {other:?}"),
        }

        first.await.unwrap().unwrap();
        assert!(op.is_renewing().await);
        op.unlock().await;
        assert_eq!(inner.events().first(), Some(&Event::Lock));
        assert_eq!(inner.events().last(), Some(&Event::Unlock));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_lock_starts_no_renewal() {
        let inner = Arc::new(RecordingLock {
            fail_lock: true,
            ..Default::default()
        });
        let op = LongOperation::new("k", inner.clone(), LEASE);
        assert!(op.lock().await.is_err());
        assert!(!op.is_renewing().await);
        tokio::time::sleep(LEASE * 2).await;
        assert_eq!(inner.extends(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relock_after_unlock() {
        let inner = Arc::new(RecordingLock::default());
        let op = LongOperation::new("k", inner.clone(), Duration::from_secs(3));
        op.lock().await.unwrap();
        op.unlock().await;
        op.lock().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(inner.extends(), 1);
        op.unlock().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_renewal() {
        let inner = Arc::new(RecordingLock::default());
        let op = LongOperation::new("k", inner.clone(), Duration::from_secs(3));
        op.lock().await.unwrap();
        drop(op);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(inner.extends(), 0);
    }
}
