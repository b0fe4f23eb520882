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

//! Lock capability traits.
//!
//! Three capability sets, each extending [`ErrorLocker`]:
//! - [`ErrorLocker`]: exclusive access that can fail to be acquired
//! - [`ErrorRwLocker`]: adds shared (read) access
//! - [`RenewableLocker`]: adds lease renewal for an exclusive hold
//!
//! Acquisition stays pending while the resource is contended and only fails
//! on an unrecoverable condition (wait budget exhausted, backend unreachable).
//! Release and renewal never fail from the caller's point of view.

use crate::LockResult;
use async_trait::async_trait;

/// A lock whose acquisition can fail.
#[async_trait]
pub trait ErrorLocker: Send + Sync {
    /// Acquire exclusive access.
    async fn lock(&self) -> LockResult<()>;

    /// Release exclusive access acquired by [`ErrorLocker::lock`].
    ///
    /// Calling it without a preceding successful `lock` is a caller bug; it
    /// is logged and otherwise ignored.
    async fn unlock(&self);
}

/// Readers-writer lock: any number of readers, or exactly one writer.
#[async_trait]
pub trait ErrorRwLocker: ErrorLocker {
    /// Acquire shared access.
    async fn rlock(&self) -> LockResult<()>;

    /// Release shared access acquired by [`ErrorRwLocker::rlock`].
    async fn runlock(&self);
}

/// Exclusive lock backed by a lease that the holder can renew.
#[async_trait]
pub trait RenewableLocker: ErrorLocker {
    /// Push the lease deadline of the current hold forward.
    ///
    /// Best effort: a holder that already lost its lease is left as is.
    async fn extend(&self);
}
