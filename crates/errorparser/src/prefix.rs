// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prefix-stripping pipeline: removes timestamp prefixes and
//! bracketed/parenthesized process tags from a line before it is matched
//! against the error-start patterns, while guarding an exclusion list of
//! tokens that must never be mistaken for a process tag.

use std::sync::LazyLock;

use regex::Regex;

/// Explicit examples of tokens that must never be mistaken for a process
/// tag — kept named here for clarity even though [`is_excluded_tag`]'s
/// general casing rule already covers each of them.
const EXCLUDED_TAG_EXAMPLES: &[&str] =
    &["TS1234", "Error", "TypeError", "RangeError", "SyntaxError", "ReferenceError", "ECONNREFUSED", "ENOTFOUND"];

/// Lowercase log-level and diagnostic keywords that read like a bare
/// `name: message` process tag but are themselves error headers (`go`'s
/// `panic: ...`, a bare `warning: ...`). Checked case-insensitively since
/// tools vary in casing (`panic:`, `Panic:`, `PANIC:`).
const RESERVED_KEYWORDS: &[&str] =
    &["panic", "error", "warning", "warn", "fatal", "critical", "exception", "traceback"];

/// Whether `tag` (the inner text of a candidate process-tag prefix) is
/// actually the start of a recognized error header rather than a process
/// name.
///
/// Process names from tools like `lerna`/`npm-run-all`/`concurrently` are
/// conventionally lowercase script or package names (`web`, `api`,
/// `build:client`). Error class names and diagnostic codes are not:
/// PascalCase (`TypeError`, `MongoError`), all-caps error codes
/// (`ECONNREFUSED`, `ENOTFOUND`), a `TS`-prefixed diagnostic number
/// (`TS1234`), or a lowercase log-level keyword (`panic`). Any tag matching
/// one of those shapes is excluded from stripping, which generalizes past
/// the explicit [`EXCLUDED_TAG_EXAMPLES`] to error types the pattern table
/// doesn't even know about yet.
fn is_excluded_tag(tag: &str) -> bool {
    let trimmed = tag.trim_end_matches(':');
    if trimmed.is_empty() {
        return false;
    }
    if EXCLUDED_TAG_EXAMPLES.contains(&trimmed) {
        return true;
    }
    if RESERVED_KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(trimmed)) {
        return true;
    }
    if trimmed.starts_with("TS") && trimmed[2..].chars().all(|c| c.is_ascii_digit()) && trimmed.len() > 2 {
        return true;
    }
    let first = trimmed.chars().next().expect("checked non-empty above");
    if first.is_ascii_uppercase() {
        return true;
    }
    if trimmed.len() > 2 && trimmed.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
        return true;
    }
    false
}

static TIMESTAMP_ISO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?\s+").expect("static regex")
});

static TIMESTAMP_CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{2}:\d{2}(\.\d+)?\s+").expect("static regex"));

static BRACKET_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[([^\]]+)\]\s*").expect("static regex"));

static PAREN_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\(([^)]+)\)\s*").expect("static regex"));

/// `npm-run-all`/`concurrently`-style bare process prefix: `dev: message`.
/// This is the form the exclusion list actually guards — without it,
/// `TS1234: ...`, `TypeError: ...`, `Error: ...`, and `ECONNREFUSED: ...`
/// would all look exactly like a process name followed by its output.
static COLON_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+):\s+").expect("static regex"));

/// Strip timestamp prefixes and process tags (bracketed, parenthesized, or
/// bare `name: `) from the start of `line`, repeating until no further
/// prefix matches or an excluded token is encountered.
///
/// Order: timestamp prefixes first (ISO-8601 or bare clock time), then one
/// process tag. A tag candidate whose inner text is an excluded token (see
/// [`is_excluded_tag`]) is left in place — stripping stops there, since it
/// is itself the start of a recognized error header, not a process tag.
pub fn strip_prefixes(line: &str) -> String {
    let mut rest = line;
    loop {
        if let Some(m) = TIMESTAMP_ISO.find(rest) {
            rest = &rest[m.end()..];
            continue;
        }
        if let Some(m) = TIMESTAMP_CLOCK.find(rest) {
            rest = &rest[m.end()..];
            continue;
        }
        if let Some(caps) = BRACKET_TAG.captures(rest) {
            let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if is_excluded_tag(inner) {
                break;
            }
            rest = &rest[caps.get(0).unwrap().end()..];
            continue;
        }
        if let Some(caps) = PAREN_TAG.captures(rest) {
            let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if is_excluded_tag(inner) {
                break;
            }
            rest = &rest[caps.get(0).unwrap().end()..];
            continue;
        }
        if let Some(caps) = COLON_TAG.captures(rest) {
            let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if is_excluded_tag(inner) {
                break;
            }
            rest = &rest[caps.get(0).unwrap().end()..];
            continue;
        }
        break;
    }
    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_iso_timestamp() {
        assert_eq!(strip_prefixes("2024-01-01T00:00:00Z Error: boom"), "Error: boom");
    }

    #[test]
    fn strips_clock_timestamp() {
        assert_eq!(strip_prefixes("12:03:04 Error: boom"), "Error: boom");
    }

    #[test]
    fn strips_bracketed_process_tag() {
        assert_eq!(strip_prefixes("[server] listening on 3000"), "listening on 3000");
    }

    #[test]
    fn strips_parenthesized_process_tag() {
        assert_eq!(strip_prefixes("(worker) started"), "started");
    }

    #[yare::parameterized(
        ts_code = { "TS1234: Argument of type string" },
        error_prefix = { "Error: something broke" },
        type_error = { "TypeError: x is not a function" },
        econnrefused = { "ECONNREFUSED: connect failed" },
        go_panic = { "panic: runtime error: index out of range" },
        mongo_error = { "MongoError: getaddrinfo ENOTFOUND mongodb.localhost" },
    )]
    fn never_strips_excluded_tokens(line: &str) {
        assert_eq!(strip_prefixes(line), line, "must not strip recognized error token {line:?}");
    }

    #[test]
    fn chains_timestamp_then_bracket_tag() {
        assert_eq!(strip_prefixes("2024-01-01T00:00:00Z [server] Error: boom"), "Error: boom");
    }
}
