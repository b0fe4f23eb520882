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

//! Hearth: multi-tenant platform primitives.
//!
//! Independent crates re-exported here:
//! - [`common`]: tenant identity ([`common::Prefixer`])
//! - [`locks`]: tenant-scoped read/write and long-operation locks
//!
//! Subsystems (file tree, sharing, jobs) receive a
//! [`locks::LockGetter`] built once at startup with [`locks::new_getter`] and
//! passed down explicitly.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub use hearth_common as common;
pub use hearth_locks as locks;

pub use hearth_common::{Prefixer, TenantPrefixer};
pub use hearth_locks::{new_getter, LockConfig, LockError, LockGetter, LockResult};
