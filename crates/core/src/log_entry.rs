// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log entry: a single captured line of process output, plus its derived
//! classification.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::process::ProcessId;

/// Monotonic, store-unique identity for a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntryId(pub u64);

/// Severity derived from a log line's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

crate::simple_display! {
    LogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
        Critical => "critical",
    }
}

impl LogLevel {
    /// Derive a level from line content: an explicit `is_error` flag always
    /// wins; otherwise a keyword match in fatal > error > warn > debug order.
    pub fn classify(content: &str, is_error: bool) -> Self {
        if is_error {
            return LogLevel::Error;
        }
        let lower = content.to_ascii_lowercase();
        if lower.contains("critical") || lower.contains("fatal") {
            LogLevel::Critical
        } else if lower.contains("error") || lower.contains("failed") {
            LogLevel::Error
        } else if lower.contains("warn") {
            LogLevel::Warn
        } else if lower.contains("debug") {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

/// Keyword tags extracted from a log line's content, used for priority
/// scoring and filtering.
pub const TAG_KEYWORDS: &[&str] = &["build", "test", "lint", "compile", "warning", "error"];

/// A single captured line of process output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogEntryId,
    pub process_id: ProcessId,
    pub process_name: String,
    pub timestamp: SystemTime,
    /// UTF-8 content with the trailing newline stripped.
    pub content: String,
    pub is_error: bool,
    pub level: LogLevel,
    pub tags: Vec<String>,
    pub priority: i32,
}

impl LogEntry {
    /// Additive priority score used to rank entries for the high-priority query.
    pub fn score_priority(content: &str, is_error: bool, tags: &[String]) -> i32 {
        let lower = content.to_ascii_lowercase();
        let mut score = 0;
        if is_error {
            score += 50;
        }
        if lower.contains("failed") {
            score += 40;
        }
        if lower.contains("error") {
            score += 30;
        }
        if lower.contains("warning") || lower.contains("warn") {
            score += 20;
        }
        if tags.iter().any(|t| t == "build") {
            score += 10;
        }
        if tags.iter().any(|t| t == "test") {
            if lower.contains("fail") {
                score += 15;
            } else if lower.contains("pass") {
                score += 15;
            }
        }
        score
    }

    pub fn extract_tags(content: &str) -> Vec<String> {
        let lower = content.to_ascii_lowercase();
        TAG_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).map(|kw| kw.to_string()).collect()
    }
}

/// A run of consecutive identical [`LogEntry`] contents collapsed into one
/// record, used by the "collapsed" query variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollapsedLogEntry {
    pub process_id: ProcessId,
    pub process_name: String,
    pub content: String,
    pub level: LogLevel,
    pub count: usize,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_error_flag_wins() {
        assert_eq!(LogLevel::classify("all good", true), LogLevel::Error);
    }

    #[yare::parameterized(
        error_keyword = { "Build error: x", LogLevel::Error },
        failed_keyword = { "task failed", LogLevel::Error },
        fatal_keyword = { "fatal: repository not found", LogLevel::Critical },
        warn_keyword = { "warning: unused import", LogLevel::Warn },
        debug_keyword = { "debug: entering loop", LogLevel::Debug },
        plain = { "server started", LogLevel::Info },
    )]
    fn classify_keyword_matches(content: &str, expected: LogLevel) {
        assert_eq!(LogLevel::classify(content, false), expected);
    }

    #[test]
    fn priority_additive_scoring() {
        let tags = vec!["build".to_string()];
        let score = LogEntry::score_priority("build failed with error", false, &tags);
        assert_eq!(score, 40 + 30 + 10);
    }

    #[test]
    fn extract_tags_finds_all_keyword_matches() {
        let tags = LogEntry::extract_tags("lint warning during compile step of build");
        for kw in ["build", "lint", "compile", "warning"] {
            assert!(tags.iter().any(|t| t == kw), "missing tag {kw}");
        }
    }
}
