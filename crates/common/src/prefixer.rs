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

//! Tenant prefixer.
//!
//! ## Purpose
//! Carries the identity of a tenant through the call chain. Storage layers
//! use [`Prefixer::db_prefix`] to keep one tenant's data apart from another's,
//! and [`Prefixer::domain_name`] for diagnostics.
//!
//! ## Design
//! - **Tenant isolation**: the prefix is the only thing a storage layer needs
//!   to scope a key; two tenants never share one
//! - **Borrowed access**: implementors hand out `&str`, callers decide whether
//!   to allocate

use std::fmt;

/// Identifies the tenant a resource belongs to.
pub trait Prefixer: Send + Sync {
    /// Storage prefix of the tenant (unique per tenant).
    fn db_prefix(&self) -> &str;

    /// Public domain of the tenant, e.g. `alice.example.net`.
    fn domain_name(&self) -> &str;
}

/// Plain tenant identity: a domain and the storage prefix derived for it.
///
/// ## Usage Pattern
/// ```rust
/// use hearth_common::{Prefixer, TenantPrefixer};
///
/// let tenant = TenantPrefixer::new("alice.example.net", "alice-prefix");
/// assert_eq!(tenant.db_prefix(), "alice-prefix");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TenantPrefixer {
    domain: String,
    prefix: String,
}

impl TenantPrefixer {
    /// Create a tenant identity.
    ///
    /// An empty `prefix` falls back to the domain, so a tenant always has a
    /// non-empty storage prefix as long as it has a domain.
    pub fn new(domain: impl Into<String>, prefix: impl Into<String>) -> Self {
        let domain = domain.into();
        let mut prefix = prefix.into();
        if prefix.is_empty() {
            prefix = domain.clone();
        }
        Self { domain, prefix }
    }
}

impl Prefixer for TenantPrefixer {
    fn db_prefix(&self) -> &str {
        &self.prefix
    }

    fn domain_name(&self) -> &str {
        &self.domain
    }
}

impl<P: Prefixer + ?Sized> Prefixer for &P {
    fn db_prefix(&self) -> &str {
        (**self).db_prefix()
    }

    fn domain_name(&self) -> &str {
        (**self).domain_name()
    }
}

impl fmt::Display for TenantPrefixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.domain, self.prefix)
    }
}
