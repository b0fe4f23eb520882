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

//! # Hearth Common
//!
//! Tenant identity shared by every Hearth crate. Anything scoped to a tenant
//! (locks, documents, jobs) is addressed through a [`Prefixer`].

pub mod prefixer;

pub use prefixer::{Prefixer, TenantPrefixer};
