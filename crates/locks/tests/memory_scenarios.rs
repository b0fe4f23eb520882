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

//! In-memory lock scenarios.

use hearth_common::TenantPrefixer;
use hearth_locks::{ErrorLocker, ErrorRwLocker, LockGetter, MemoryLockGetter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

fn tenant(prefix: &str) -> TenantPrefixer {
    TenantPrefixer::new(format!("{prefix}.example.net"), prefix)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_writers_exclusive_across_threads() {
    let getter = Arc::new(MemoryLockGetter::new());
    let inside = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let getter = getter.clone();
        let inside = inside.clone();
        handles.push(tokio::spawn(async move {
            let lock = getter.read_write(&tenant("alice"), "vfs");
            for _ in 0..10 {
                lock.lock().await.unwrap();
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0, "two writers inside");
                tokio::task::yield_now().await;
                inside.fetch_sub(1, Ordering::SeqCst);
                lock.unlock().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_run_concurrently() {
    let getter = Arc::new(MemoryLockGetter::new());
    let reading = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let getter = getter.clone();
        let reading = reading.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move {
            let lock = getter.read_write(&tenant("alice"), "vfs");
            lock.rlock().await.unwrap();
            let now = reading.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(100)).await;
            reading.fetch_sub(1, Ordering::SeqCst);
            lock.runlock().await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_writer_waits_for_every_reader() {
    let getter = MemoryLockGetter::new();
    let readers: Vec<_> = (0..3).map(|_| getter.read_write(&tenant("alice"), "vfs")).collect();
    for reader in &readers {
        reader.rlock().await.unwrap();
    }

    let writer = getter.read_write(&tenant("alice"), "vfs");
    for reader in &readers {
        assert!(timeout(Duration::from_millis(20), writer.lock()).await.is_err());
        reader.runlock().await;
    }
    timeout(Duration::from_millis(20), writer.lock())
        .await
        .expect("writer still blocked after every reader left")
        .unwrap();
    writer.unlock().await;
}
