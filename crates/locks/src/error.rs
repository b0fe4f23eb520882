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

//! Error types for lock operations.

use thiserror::Error;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur while acquiring a lock or building a getter.
///
/// Release and renewal never produce these: they are absorbed and logged.
#[derive(Error, Debug)]
pub enum LockError {
    /// Acquisition gave up after its wait budget, either because the lock
    /// stayed contended or because the backend could not be reached
    #[error("Timed out acquiring lock {key} after {attempts} attempts{}", last_error_suffix(.last_error))]
    AcquireTimeout {
        key: String,
        attempts: u32,
        last_error: Option<String>,
    },

    /// The same long-operation handle was locked twice
    #[error("Lock already held by this handle: {0}")]
    AlreadyHeld(String),

    /// Backend error (connection, script, protocol)
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last error: {e})"),
        None => String::new(),
    }
}

impl LockError {
    /// True when retrying the whole protected operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LockError::AcquireTimeout { .. } | LockError::BackendError(_))
    }
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for LockError {
    fn from(err: redis::RedisError) -> Self {
        LockError::BackendError(format!("Redis error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_includes_last_error() {
        let err = LockError::AcquireTimeout {
            key: "alice/vfs".to_string(),
            attempts: 7,
            last_error: Some("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Timed out acquiring lock alice/vfs after 7 attempts (last error: connection refused)"
        );
    }

    #[test]
    fn test_timeout_message_without_last_error() {
        let err = LockError::AcquireTimeout {
            key: "alice/vfs".to_string(),
            attempts: 3,
            last_error: None,
        };
        assert_eq!(err.to_string(), "Timed out acquiring lock alice/vfs after 3 attempts");
    }

    #[test]
    fn test_transient_classification() {
        assert!(LockError::BackendError("down".into()).is_transient());
        assert!(LockError::AcquireTimeout {
            key: "k".into(),
            attempts: 1,
            last_error: None
        }
        .is_transient());
        assert!(!LockError::ConfigError("bad".into()).is_transient());
        assert!(!LockError::AlreadyHeld("k".into()).is_transient());
    }
}
