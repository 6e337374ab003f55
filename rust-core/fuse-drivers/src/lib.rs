// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FuseDB Drivers
//
// Persistent `Driver` implementations for the FuseDB engine. The in-memory
// driver lives in `fuse-core`; this crate adds backends that touch the disk.
//
// # Modules
//
// - [`json`] -- One pretty-printed JSON object file, with optional autosave.
// - [`redb_driver`] -- redb single-file ACID database (feature `redb-driver`).

pub mod json;

// Optional persistent backends, behind cargo features.
#[cfg(feature = "redb-driver")]
pub mod redb_driver;

pub use json::{JsonFileDriver, JsonFileOptions};

#[cfg(feature = "redb-driver")]
pub use redb_driver::RedbDriver;
