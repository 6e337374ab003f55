// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for the FuseDB engine.
//
// Three layers of failure are modelled separately: a `DriverError` is what a
// storage backend reports, a `HookError` is what a middleware hook reports,
// and an `EngineError` is what the caller of an `Engine` operation sees.
// Every variant carries owned strings so errors are `Clone` and can be fanned
// out to middleware and lifecycle subscribers before being returned.

use std::fmt;

use thiserror::Error;

/// Convenience alias for results returned by engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by a storage driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The backend could not be reached (connection refused, file locked, ...).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// An I/O error occurred in the underlying storage layer.
    #[error("I/O error: {0}")]
    Io(String),

    /// Failed to serialize or deserialize a stored value.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The stored data is corrupted or in an unexpected format.
    #[error("corrupted data: {0}")]
    Corrupted(String),

    /// Any other backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        DriverError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Serialization(err.to_string())
    }
}

/// Error raised from inside a middleware hook.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    /// Create a hook error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message supplied by the hook.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The engine operation during which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Disconnect,
    Get,
    Set,
    Remove,
    Has,
    Size,
    Keys,
    Values,
    Clear,
    BulkSet,
    BulkRemove,
    ExportSnapshot,
    ImportSnapshot,
}

impl Operation {
    /// Lowercase operation name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Remove => "remove",
            Operation::Has => "has",
            Operation::Size => "size",
            Operation::Keys => "keys",
            Operation::Values => "values",
            Operation::Clear => "clear",
            Operation::BulkSet => "bulk_set",
            Operation::BulkRemove => "bulk_remove",
            Operation::ExportSnapshot => "export_snapshot",
            Operation::ImportSnapshot => "import_snapshot",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the driver call a hook runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Before,
    After,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Before => f.write_str("before"),
            HookPhase::After => f.write_str("after"),
        }
    }
}

/// Errors surfaced to callers of [`crate::Engine`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// `connect` or `disconnect` failed.
    #[error("connection error during {op} ({driver}): {source}")]
    Connection {
        /// Name of the driver that failed.
        driver: String,
        /// `Connect` or `Disconnect`.
        op: Operation,
        /// Underlying driver failure.
        source: DriverError,
    },

    /// A driver primitive failed.
    #[error("driver error during {op}: {source}")]
    Driver {
        /// Operation that was running.
        op: Operation,
        /// Underlying driver failure.
        source: DriverError,
    },

    /// A `before`/`after` hook failed.
    #[error("middleware '{middleware}' failed in {phase}.{op}: {source}")]
    Middleware {
        /// Name of the failing middleware.
        middleware: String,
        /// Operation being intercepted.
        op: Operation,
        /// Hook phase.
        phase: HookPhase,
        /// Error returned by the hook.
        source: HookError,
    },

    /// A driver or snapshot produced output outside the documented contract.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// The key is not acceptable (empty, or a reserved namespace).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A glob pattern could not be compiled.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as given by the caller.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },

    /// The engine was configured to require a connection and is disconnected.
    #[error("engine is not connected (operation: {op})")]
    NotConnected {
        /// Operation that was rejected.
        op: Operation,
    },

    /// The engine settings are invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to serialize or deserialize a value at the engine boundary.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Wrap a driver failure for the given operation.
    pub fn driver(op: Operation, source: DriverError) -> Self {
        EngineError::Driver { op, source }
    }

    /// Wrap a hook failure with the identity of the middleware that raised it.
    pub fn middleware(
        middleware: &str,
        op: Operation,
        phase: HookPhase,
        source: HookError,
    ) -> Self {
        EngineError::Middleware {
            middleware: middleware.to_string(),
            op,
            phase,
            source,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts_to_driver_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file gone");
        let err = DriverError::from(io_err);
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("file gone"));
    }

    #[test]
    fn test_unavailable_display() {
        let err = DriverError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "backend unavailable: connection refused");
    }

    #[test]
    fn test_driver_error_display_names_operation() {
        let err = EngineError::driver(Operation::Get, DriverError::Corrupted("bad".into()));
        assert_eq!(err.to_string(), "driver error during get: corrupted data: bad");
    }

    #[test]
    fn test_middleware_error_display() {
        let err = EngineError::Middleware {
            middleware: "crypto".to_string(),
            op: Operation::Set,
            phase: HookPhase::Before,
            source: HookError::new("boom"),
        };
        assert_eq!(err.to_string(), "middleware 'crypto' failed in before.set: boom");
    }

    #[test]
    fn test_connection_error_names_lifecycle_step() {
        let err = EngineError::Connection {
            driver: "json-file".to_string(),
            op: Operation::Disconnect,
            source: DriverError::Io("disk full".into()),
        };
        assert_eq!(
            err.to_string(),
            "connection error during disconnect (json-file): I/O error: disk full"
        );
    }

    #[test]
    fn test_errors_are_clone_and_comparable() {
        let err = EngineError::NotConnected { op: Operation::Keys };
        assert_eq!(err.clone(), err);
        assert!(err.to_string().contains("keys"));
    }
}
