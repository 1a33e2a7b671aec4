// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error context: a finalized grouping of log lines believed to form one
//! logical error.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::process::ProcessId;

crate::define_id! {
    /// Identity for an [`ErrorContext`] cluster.
    pub struct ErrorContextId("errc-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

crate::simple_display! {
    Severity {
        Warning => "warning",
        Error => "error",
        Critical => "critical",
    }
}

/// A grouping of one or more log entries believed to form a single logical
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub id: ErrorContextId,
    pub process_id: ProcessId,
    pub process_name: String,
    pub first_timestamp: SystemTime,
    pub last_timestamp: SystemTime,
    /// Free-form type chosen from the configurable taxonomy (e.g. `"MongoError"`).
    pub error_type: String,
    pub message: String,
    pub severity: Severity,
    /// `None` when no language-specific pattern matched (time-clustered fallback).
    pub language: Option<String>,
    /// Verbatim input lines, in order.
    pub raw_lines: Vec<String>,
    /// Subset of `raw_lines` recognized as stack frames.
    pub stack_lines: Vec<String>,
    /// Everything in `raw_lines` that is neither the header nor a stack line.
    pub context_lines: Vec<String>,
    /// How this context was produced: `"pattern"` or `"cluster"`.
    pub source: &'static str,
}

impl ErrorContext {
    /// Invariant check used by tests and by the parser's own sanity pass:
    /// `stack_lines ∪ context_lines` must exactly partition the body lines
    /// (everything in `raw_lines` after the header).
    pub fn is_well_formed(&self) -> bool {
        if self.first_timestamp > self.last_timestamp {
            return false;
        }
        if self.raw_lines.is_empty() {
            return false;
        }
        let body = &self.raw_lines[1..];
        let mut accounted = 0usize;
        for line in body {
            let in_stack = self.stack_lines.iter().any(|s| s == line);
            let in_context = self.context_lines.iter().any(|s| s == line);
            if in_stack == in_context {
                // Must be in exactly one, never both or neither.
                return false;
            }
            accounted += 1;
        }
        accounted == self.stack_lines.len() + self.context_lines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn sample(raw: Vec<&str>, stack: Vec<&str>, context: Vec<&str>) -> ErrorContext {
        ErrorContext {
            id: ErrorContextId::new(),
            process_id: ProcessId::new(),
            process_name: "dev".into(),
            first_timestamp: SystemTime::UNIX_EPOCH,
            last_timestamp: SystemTime::UNIX_EPOCH,
            error_type: "Test".into(),
            message: "boom".into(),
            severity: Severity::Error,
            language: None,
            raw_lines: raw.into_iter().map(String::from).collect(),
            stack_lines: stack.into_iter().map(String::from).collect(),
            context_lines: context.into_iter().map(String::from).collect(),
            source: "pattern",
        }
    }

    #[test]
    fn well_formed_when_partition_is_exact() {
        let ctx = sample(vec!["Error: boom", "  at foo", "  note"], vec!["  at foo"], vec!["  note"]);
        assert!(ctx.is_well_formed());
    }

    #[test]
    fn rejects_line_in_both_stack_and_context() {
        let ctx = sample(vec!["Error: boom", "  at foo"], vec!["  at foo"], vec!["  at foo"]);
        assert!(!ctx.is_well_formed());
    }

    #[test]
    fn rejects_unaccounted_line() {
        let ctx = sample(vec!["Error: boom", "  at foo", "  note"], vec!["  at foo"], vec![]);
        assert!(!ctx.is_well_formed());
    }
}
