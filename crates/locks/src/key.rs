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

//! Lock key naming.
//!
//! Every lock lives in one namespace shared by all tenants, so the key must
//! carry the tenant. Keys have the form `<tenant>/<name>` where `<tenant>` is
//! the tenant's storage prefix with `%` and `/` percent-escaped. The first `/`
//! therefore always ends the tenant segment, and distinct `(tenant, name)`
//! pairs can never produce the same key.

use hearth_common::Prefixer;

/// Build the lock key for `name` within the tenant of `prefixer`.
pub fn lock_key(prefixer: &dyn Prefixer, name: &str) -> String {
    let tenant = prefixer.db_prefix();
    let mut key = String::with_capacity(tenant.len() + name.len() + 1);
    for c in tenant.chars() {
        match c {
            '%' => key.push_str("%25"),
            '/' => key.push_str("%2F"),
            c => key.push(c),
        }
    }
    key.push('/');
    key.push_str(name);
    key
}
