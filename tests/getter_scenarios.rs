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

//! Getter scenarios as seen by platform subsystems.
//!
//! Each test builds its own getter; nothing is shared between tests.

use hearth::locks::{DistributedLockGetter, ErrorLocker, ErrorRwLocker, LockOptions, MemoryLeaseStore};
use hearth::{new_getter, LockConfig, LockGetter, TenantPrefixer};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

fn tenant(prefix: &str) -> TenantPrefixer {
    TenantPrefixer::new(format!("{prefix}.example.net"), prefix)
}

/// Stand-in for a subsystem that receives the getter by injection.
struct FileTree {
    locks: Arc<dyn LockGetter>,
}

impl FileTree {
    async fn rename(&self, tenant: &TenantPrefixer) -> hearth::LockResult<()> {
        let lock = self.locks.read_write(tenant, "vfs");
        lock.lock().await?;
        sleep(Duration::from_millis(50)).await;
        lock.unlock().await;
        Ok(())
    }

    async fn stat(&self, tenant: &TenantPrefixer) -> hearth::LockResult<()> {
        let lock = self.locks.read_write(tenant, "vfs");
        lock.rlock().await?;
        lock.runlock().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_independent_in_memory_getters() {
    let first = new_getter(&LockConfig::in_memory()).await.unwrap();
    let second = new_getter(&LockConfig::in_memory()).await.unwrap();

    let held = first.read_write(&tenant("alice"), "vfs");
    held.lock().await.unwrap();

    // A separately constructed getter does not see the first one's locks.
    let other = second.read_write(&tenant("alice"), "vfs");
    timeout(Duration::from_millis(50), other.lock())
        .await
        .expect("getters share state")
        .unwrap();
    other.unlock().await;
    held.unlock().await;
}

#[tokio::test]
async fn test_subsystem_uses_injected_getter() {
    let tree = FileTree {
        locks: new_getter(&LockConfig::in_memory()).await.unwrap(),
    };
    tree.rename(&tenant("alice")).await.unwrap();
    tree.stat(&tenant("alice")).await.unwrap();
    tree.rename(&tenant("bob")).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_subsystem_over_distributed_getter() {
    let store = Arc::new(MemoryLeaseStore::new());
    let tree = Arc::new(FileTree {
        locks: Arc::new(DistributedLockGetter::new(store, LockOptions::default())),
    });

    let mut handles = Vec::new();
    for _ in 0..4 {
        let tree = tree.clone();
        handles.push(tokio::spawn(async move { tree.rename(&tenant("alice")).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    tree.stat(&tenant("alice")).await.unwrap();
}
