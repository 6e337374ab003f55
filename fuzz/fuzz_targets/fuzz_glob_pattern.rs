// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for glob pattern compilation and matching

#![no_main]

use fuse_core::GlobPattern;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // First half is the pattern, second half the key.
    let split = s.char_indices().nth(s.chars().count() / 2).map_or(s.len(), |(i, _)| i);
    let (pattern, key) = s.split_at(split);

    if let Ok(glob) = GlobPattern::new(pattern) {
        let _ = glob.matches(key);

        // A pattern without metacharacters matches exactly itself.
        if !pattern.contains(['*', '?']) {
            assert!(glob.matches(pattern));
            assert_eq!(glob.matches(key), key == pattern);
        }
    }
});
