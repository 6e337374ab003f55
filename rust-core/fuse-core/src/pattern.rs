// SPDX-License-Identifier: PMPL-1.0-or-later
//! Glob-style key patterns used by `Engine::find`.
//!
//! `*` matches any run of characters (including none), `?` matches exactly
//! one character, and every other character matches itself. Patterns are
//! anchored to the whole key.

use regex::Regex;

use crate::error::{EngineError, EngineResult};

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> EngineResult<Self> {
        let regex = Regex::new(&translate(pattern)).map_err(|e| EngineError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// True if `key` matches the whole pattern.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// The pattern as originally written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Translate a glob into an anchored regular expression.
fn translate(pattern: &str) -> String {
    // (?s) lets `*` and `?` cross newlines inside keys.
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}
