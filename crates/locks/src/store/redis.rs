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

//! Redis lease store.
//!
//! ## Purpose
//! Provides the lease primitives of [`LeaseStore`] on top of Redis so that
//! locks are shared by every process talking to the same Redis.
//!
//! ## Design
//! - Uses `redis` crate with async ConnectionManager (automatic reconnection)
//! - Every primitive is a Lua script, so check-then-act sequences run
//!   atomically on the server
//! - Writer lease: `<namespace>:lock:{<key>}` holding the owner token with a
//!   PX expiry
//! - Readers: `<namespace>:lock:{<key>}:readers`, a sorted set of reader
//!   tokens scored by their expiry in server milliseconds; expired members are
//!   pruned by every script that reads the set
//! - Both keys share a hash tag so they land on the same cluster slot
//! - Scripts read the server clock with `TIME` and write afterwards, which
//!   needs Redis 5 or newer (script effects replication)
//! - Connection setup and every command are bounded by [`RedisOptions`]
//!
//! ## Usage
//! ```rust,no_run
//! use hearth_locks::store::{LeaseStore, RedisLeaseStore};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisLeaseStore::new("redis://localhost:6379", "hearth").await?;
//! let taken = store.try_acquire_write("alice/vfs", "token", Duration::from_secs(20)).await?;
//! # Ok(())
//! # }
//! ```

use super::LeaseStore;
use crate::config::RedisOptions;
use crate::LockResult;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, Script};
use std::time::Duration;
use tracing::debug;

// KEYS[1] = writer key, KEYS[2] = readers key, ARGV[1] = token, ARGV[2] = lease ms
const ACQUIRE_WRITE: &str = r#"
local now = redis.call("TIME")
local now_ms = tonumber(now[1]) * 1000 + math.floor(tonumber(now[2]) / 1000)
redis.call("ZREMRANGEBYSCORE", KEYS[2], "-inf", now_ms)
if redis.call("ZCARD", KEYS[2]) > 0 then
    return 0
end
local holder = redis.call("GET", KEYS[1])
if holder == ARGV[1] then
    redis.call("PEXPIRE", KEYS[1], ARGV[2])
    return 1
end
if holder then
    return 0
end
redis.call("SET", KEYS[1], ARGV[1], "PX", ARGV[2])
return 1
"#;

// KEYS[1] = writer key, ARGV[1] = token
const RELEASE_WRITE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

// KEYS[1] = writer key, ARGV[1] = token, ARGV[2] = lease ms
const EXTEND_WRITE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
end
return 0
"#;

// KEYS[1] = writer key, KEYS[2] = readers key, ARGV[1] = token, ARGV[2] = lease ms
const ACQUIRE_READ: &str = r#"
if redis.call("EXISTS", KEYS[1]) == 1 then
    return 0
end
local now = redis.call("TIME")
local now_ms = tonumber(now[1]) * 1000 + math.floor(tonumber(now[2]) / 1000)
redis.call("ZREMRANGEBYSCORE", KEYS[2], "-inf", now_ms)
redis.call("ZADD", KEYS[2], now_ms + tonumber(ARGV[2]), ARGV[1])
local last = redis.call("ZRANGE", KEYS[2], -1, -1, "WITHSCORES")
redis.call("PEXPIREAT", KEYS[2], last[2])
return 1
"#;

// KEYS[1] = readers key, ARGV[1] = token
const RELEASE_READ: &str = r#"
local now = redis.call("TIME")
local now_ms = tonumber(now[1]) * 1000 + math.floor(tonumber(now[2]) / 1000)
redis.call("ZREMRANGEBYSCORE", KEYS[1], "-inf", now_ms)
return redis.call("ZREM", KEYS[1], ARGV[1])
"#;

/// Redis-backed [`LeaseStore`].
#[derive(Clone)]
pub struct RedisLeaseStore {
    /// Redis connection manager (async, pooled)
    manager: ConnectionManager,
    /// Namespace prefix for all keys (e.g., "hearth")
    namespace: String,
    acquire_write: Script,
    release_write: Script,
    extend_write: Script,
    acquire_read: Script,
    release_read: Script,
}

impl RedisLeaseStore {
    /// Connect to Redis with the default [`RedisOptions`].
    ///
    /// ## Arguments
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `namespace` - Key prefix for isolation (e.g., "hearth")
    ///
    /// ## Errors
    /// - [`crate::LockError::BackendError`]: If the URL is invalid or Redis
    ///   cannot be reached
    pub async fn new(url: &str, namespace: &str) -> LockResult<Self> {
        Self::connect(url, namespace, &RedisOptions::default()).await
    }

    /// Connect to Redis, giving up after `options.retries` reconnect attempts
    /// bounded by `options.connection_timeout` each.
    pub async fn connect(url: &str, namespace: &str, options: &RedisOptions) -> LockResult<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new_with_config(client, manager_config(options)).await?;
        debug!(url = %url, namespace = %namespace, "connected redis lease store");

        Ok(Self {
            manager,
            namespace: namespace.trim_end_matches(':').to_string(),
            acquire_write: Script::new(ACQUIRE_WRITE),
            release_write: Script::new(RELEASE_WRITE),
            extend_write: Script::new(EXTEND_WRITE),
            acquire_read: Script::new(ACQUIRE_READ),
            release_read: Script::new(RELEASE_READ),
        })
    }

    fn writer_key(&self, key: &str) -> String {
        format!("{}:lock:{{{}}}", self.namespace, key)
    }

    fn readers_key(&self, key: &str) -> String {
        format!("{}:lock:{{{}}}:readers", self.namespace, key)
    }
}

fn manager_config(options: &RedisOptions) -> ConnectionManagerConfig {
    ConnectionManagerConfig::new()
        .set_number_of_retries(options.retries)
        .set_max_delay(options.retry_delay_max.as_millis() as u64)
        .set_connection_timeout(options.connection_timeout)
        .set_response_timeout(options.response_timeout)
}

fn lease_millis(lease: Duration) -> u64 {
    (lease.as_millis() as u64).max(1)
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn try_acquire_write(&self, key: &str, token: &str, lease: Duration) -> LockResult<bool> {
        let mut conn = self.manager.clone();
        let taken: i64 = self
            .acquire_write
            .key(self.writer_key(key))
            .key(self.readers_key(key))
            .arg(token)
            .arg(lease_millis(lease))
            .invoke_async(&mut conn)
            .await?;
        Ok(taken == 1)
    }

    async fn release_write(&self, key: &str, token: &str) -> LockResult<bool> {
        let mut conn = self.manager.clone();
        let deleted: i64 = self
            .release_write
            .key(self.writer_key(key))
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn extend_write(&self, key: &str, token: &str, lease: Duration) -> LockResult<bool> {
        let mut conn = self.manager.clone();
        let extended: i64 = self
            .extend_write
            .key(self.writer_key(key))
            .arg(token)
            .arg(lease_millis(lease))
            .invoke_async(&mut conn)
            .await?;
        Ok(extended == 1)
    }

    async fn try_acquire_read(&self, key: &str, token: &str, lease: Duration) -> LockResult<bool> {
        let mut conn = self.manager.clone();
        let taken: i64 = self
            .acquire_read
            .key(self.writer_key(key))
            .key(self.readers_key(key))
            .arg(token)
            .arg(lease_millis(lease))
            .invoke_async(&mut conn)
            .await?;
        Ok(taken == 1)
    }

    async fn release_read(&self, key: &str, token: &str) -> LockResult<bool> {
        let mut conn = self.manager.clone();
        let removed: i64 = self
            .release_read
            .key(self.readers_key(key))
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }
}
