// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FuseDB Middleware
//
// Ready-made `Middleware` implementations for the FuseDB engine.
//
// # Modules
//
// - [`crypto`] -- AES-256-GCM encryption of stored values.
// - [`logger`] -- `tracing` events around every intercepted operation.
// - [`metrics`] -- Operation counters with hit/miss tracking.
// - [`error`] -- Errors raised by the bundled middleware.

pub mod crypto;
pub mod error;
pub mod logger;
pub mod metrics;

pub use crypto::{CryptoMiddleware, EncryptedPayload, EncryptionKey};
pub use error::CryptoError;
pub use logger::{LoggerMiddleware, LoggerOptions};
pub use metrics::{MetricsMiddleware, MiddlewareStats};
