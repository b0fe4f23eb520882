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

//! Configuration for lock backends.
//!
//! ## Purpose
//! Selects the lock backend (in-process or Redis) and the lease/retry policy
//! used by the distributed backend.
//!
//! ## Environment Variables
//!
//! ### Backend Selection
//! - `HEARTH_LOCK_BACKEND`: Backend type (default: "in-memory")
//!   - "in-memory" | "memory" → process-local locks
//!   - "redis" → Redis-backed leases
//!
//! ### Redis Configuration
//! - `HEARTH_LOCK_REDIS_URL`: Redis server URL (default: "redis://localhost:6379")
//! - `HEARTH_LOCK_REDIS_NAMESPACE`: Key prefix for isolation (default: "hearth")
//! - `HEARTH_LOCK_REDIS_CONNECT_TIMEOUT_MS`: Bound on one connection attempt (default: 1000)
//! - `HEARTH_LOCK_REDIS_RESPONSE_TIMEOUT_MS`: Bound on one command (default: 2000)
//! - `HEARTH_LOCK_REDIS_RETRIES`: Reconnect attempts before giving up (default: 2)
//!
//! ### Lease Policy
//! - `HEARTH_LOCK_LEASE_MS`: Lease duration (default: 20000)
//! - `HEARTH_LOCK_MAX_WAIT_MS`: Maximum total wait when acquiring (default: 12000)
//! - `HEARTH_LOCK_BACKOFF_MIN_MS` / `HEARTH_LOCK_BACKOFF_MAX_MS`: Bounds of
//!   the randomized delay between attempts (default: 50 / 150)
//!
//! ## Examples
//! ```bash
//! export HEARTH_LOCK_BACKEND=redis
//! export HEARTH_LOCK_REDIS_URL=redis://localhost:6379
//! export HEARTH_LOCK_LEASE_MS=30000
//! ```

use crate::{LockError, LockResult};
use std::time::Duration;

/// Default lease: long enough for a typical request, short enough that a
/// crashed holder is reclaimed quickly.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(20);

/// Default maximum total wait for one acquisition.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(12);

/// Default lower bound of the retry delay.
pub const DEFAULT_BACKOFF_MIN: Duration = Duration::from_millis(50);

/// Default upper bound of the retry delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_millis(150);

/// Default bound on one Redis connection attempt.
pub const DEFAULT_REDIS_CONNECTION_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bound on one Redis command.
pub const DEFAULT_REDIS_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of Redis reconnect attempts.
pub const DEFAULT_REDIS_RETRIES: usize = 2;

/// Connection policy of the Redis backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedisOptions {
    /// Bound on one connection attempt
    pub connection_timeout: Duration,
    /// Bound on one command round trip
    pub response_timeout: Duration,
    /// Reconnect attempts before an operation fails
    pub retries: usize,
    /// Longest delay between two reconnect attempts
    pub retry_delay_max: Duration,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_REDIS_CONNECTION_TIMEOUT,
            response_timeout: DEFAULT_REDIS_RESPONSE_TIMEOUT,
            retries: DEFAULT_REDIS_RETRIES,
            retry_delay_max: Duration::from_millis(200),
        }
    }
}

impl RedisOptions {
    /// Check the policy is usable.
    pub fn validate(&self) -> LockResult<()> {
        if self.connection_timeout.is_zero() || self.response_timeout.is_zero() {
            return Err(LockError::ConfigError("redis timeouts must be positive".to_string()));
        }
        Ok(())
    }
}

/// Backend type configuration.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Process-local readers-writer locks (default, always available)
    #[default]
    InMemory,
    /// Redis leases (requires redis-backend feature)
    Redis {
        /// Redis server URL
        url: String,
        /// Key namespace prefix
        namespace: String,
        /// Connection timeouts and retries
        connection: RedisOptions,
    },
}

/// Lease and retry policy of the distributed backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockOptions {
    /// Lifetime of a lease that is not renewed
    pub lease_duration: Duration,
    /// Acquisition gives up once this much time has passed
    pub max_wait: Duration,
    /// Shortest delay between two attempts
    pub backoff_min: Duration,
    /// Longest delay between two attempts
    pub backoff_max: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lease_duration: DEFAULT_LEASE_DURATION,
            max_wait: DEFAULT_MAX_WAIT,
            backoff_min: DEFAULT_BACKOFF_MIN,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl LockOptions {
    /// Check the policy is usable.
    pub fn validate(&self) -> LockResult<()> {
        if self.lease_duration.is_zero() {
            return Err(LockError::ConfigError("lease_duration must be positive".to_string()));
        }
        if self.max_wait.is_zero() {
            return Err(LockError::ConfigError("max_wait must be positive".to_string()));
        }
        if self.backoff_min > self.backoff_max {
            return Err(LockError::ConfigError(format!(
                "backoff_min ({:?}) exceeds backoff_max ({:?})",
                self.backoff_min, self.backoff_max
            )));
        }
        Ok(())
    }
}

/// Lock subsystem configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockConfig {
    /// Backend type
    pub backend: BackendType,
    /// Lease and retry policy
    pub options: LockOptions,
}

impl LockConfig {
    /// In-process locks with default options.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Redis-backed locks with default options.
    pub fn redis(url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            backend: BackendType::Redis {
                url: url.into(),
                namespace: namespace.into(),
                connection: RedisOptions::default(),
            },
            options: LockOptions::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// See module documentation for the complete list.
    pub fn from_env() -> LockResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> LockResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_str = lookup("HEARTH_LOCK_BACKEND")
            .unwrap_or_else(|| "in-memory".to_string())
            .to_lowercase();

        let millis = |name: &str, default: Duration| -> LockResult<Duration> {
            match lookup(name) {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| LockError::ConfigError(format!("{name}={raw}: {e}"))),
            }
        };

        let backend = match backend_str.as_str() {
            "in-memory" | "memory" => BackendType::InMemory,
            "redis" => {
                let url = lookup("HEARTH_LOCK_REDIS_URL")
                    .unwrap_or_else(|| "redis://localhost:6379".to_string());
                let namespace =
                    lookup("HEARTH_LOCK_REDIS_NAMESPACE").unwrap_or_else(|| "hearth".to_string());
                let retries = match lookup("HEARTH_LOCK_REDIS_RETRIES") {
                    None => DEFAULT_REDIS_RETRIES,
                    Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                        LockError::ConfigError(format!("HEARTH_LOCK_REDIS_RETRIES={raw}: {e}"))
                    })?,
                };
                let connection = RedisOptions {
                    connection_timeout: millis(
                        "HEARTH_LOCK_REDIS_CONNECT_TIMEOUT_MS",
                        DEFAULT_REDIS_CONNECTION_TIMEOUT,
                    )?,
                    response_timeout: millis(
                        "HEARTH_LOCK_REDIS_RESPONSE_TIMEOUT_MS",
                        DEFAULT_REDIS_RESPONSE_TIMEOUT,
                    )?,
                    retries,
                    ..RedisOptions::default()
                };
                connection.validate()?;
                BackendType::Redis { url, namespace, connection }
            }
            other => {
                return Err(LockError::ConfigError(format!(
                    "Unknown lock backend: {}. Valid options: in-memory, redis",
                    other
                )))
            }
        };

        let options = LockOptions {
            lease_duration: millis("HEARTH_LOCK_LEASE_MS", DEFAULT_LEASE_DURATION)?,
            max_wait: millis("HEARTH_LOCK_MAX_WAIT_MS", DEFAULT_MAX_WAIT)?,
            backoff_min: millis("HEARTH_LOCK_BACKOFF_MIN_MS", DEFAULT_BACKOFF_MIN)?,
            backoff_max: millis("HEARTH_LOCK_BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX)?,
        };
        options.validate()?;

        Ok(Self { backend, options })
    }
}
