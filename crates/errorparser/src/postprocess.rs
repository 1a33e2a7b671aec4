// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message post-processors: small, targeted rewrites applied to a finalized
//! cluster's message before it becomes an [`brummer_core::ErrorContext`].
//!
//! These are intentionally narrow (keyed on `error_type`) rather than a
//! general plugin system — spec.md §4.4(a) names exactly two examples and
//! both are handled here.

use std::sync::LazyLock;

use regex::Regex;

static HOSTNAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"hostname:\s*'([^']+)'").expect("static regex")
});

/// `getaddrinfo ENOTFOUND host` reads like an OS error code to anyone who
/// hasn't memorized libc; rewrite it to the plain-English diagnosis the
/// teacher's error messages favor.
fn substitute_getaddrinfo(message: &mut String) {
    if let Some(idx) = message.find("getaddrinfo") {
        message.replace_range(idx..idx + "getaddrinfo".len(), "DNS lookup failed -");
    }
}

/// If any line in the cluster carries a `hostname: 'x'` companion line
/// (common in MongoDB/Sequelize connection-refused dumps), append it to the
/// message so the failing host survives summarization.
fn append_hostname(message: &mut String, raw_lines: &[String]) {
    for line in raw_lines {
        if let Some(caps) = HOSTNAME_LINE.captures(line) {
            let host = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            message.push_str(&format!(" (hostname: {host})"));
            return;
        }
    }
}

/// Apply every post-processor relevant to `error_type`, mutating `message`
/// in place.
pub fn apply(error_type: &str, message: &mut String, raw_lines: &[String]) {
    if error_type.starts_with("Mongo") || error_type.starts_with("Sequelize") {
        substitute_getaddrinfo(message);
        append_hostname(message, raw_lines);
    }
}
