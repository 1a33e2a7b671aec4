// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern-driven state machine: one active context per process id, fed a
//! line at a time, emitting [`ErrorContext`]s as contexts finalize.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use brummer_core::{ErrorContext, ErrorContextId, ProcessId, Severity};

use crate::patterns::CompiledPatternSet;
use crate::prefix;
use crate::postprocess;

struct StartMatch {
    /// The compiled language entry's own `name`, used afterward to look up
    /// its stack/continuation/end patterns — distinct from
    /// `reported_language`, which may be a `maps_to` alias (e.g. `react` ->
    /// `javascript`).
    language_name: String,
    reported_language: String,
    error_type: String,
    message: String,
    severity: Severity,
    multiline: bool,
}

struct ActiveContext {
    process_name: String,
    reported_language: String,
    error_type: String,
    severity: Severity,
    message: String,
    first_timestamp: SystemTime,
    last_timestamp: SystemTime,
    raw_lines: Vec<String>,
    stack_lines: Vec<String>,
    context_lines: Vec<String>,
}

impl ActiveContext {
    fn finalize(mut self, process_id: ProcessId) -> ErrorContext {
        postprocess::apply(&self.error_type, &mut self.message, &self.raw_lines);
        ErrorContext {
            id: ErrorContextId::new(),
            process_id,
            process_name: self.process_name,
            first_timestamp: self.first_timestamp,
            last_timestamp: self.last_timestamp,
            error_type: self.error_type,
            message: self.message,
            severity: self.severity,
            language: Some(self.reported_language),
            raw_lines: self.raw_lines,
            stack_lines: self.stack_lines,
            context_lines: self.context_lines,
            source: "pattern",
        }
    }
}

/// Per-process pattern state machine. Shares one compiled pattern table
/// (reference-counted) across every process id it tracks.
pub struct PatternStateMachine {
    patterns: Arc<CompiledPatternSet>,
    max_lines: usize,
    active: HashMap<ProcessId, ActiveContext>,
    /// The compiled language `name` (not the reported/aliased one) that
    /// opened each process's active context, so stack/continuation/end
    /// matching stays bound to the rule set that actually matched.
    active_language: HashMap<ProcessId, String>,
}

impl PatternStateMachine {
    pub fn new(patterns: Arc<CompiledPatternSet>, max_lines: usize) -> Self {
        Self { patterns, max_lines: max_lines.max(1), active: HashMap::new(), active_language: HashMap::new() }
    }

    /// Feed one line from `process_id`. Returns any contexts this line
    /// finalized — the previously active multi-line context (end pattern,
    /// cap reached, or a non-continuation line closing it) and/or an
    /// immediately-finalized single-line match.
    pub fn process_line(
        &mut self,
        process_id: ProcessId,
        process_name: &str,
        content: &str,
        timestamp: SystemTime,
    ) -> Vec<ErrorContext> {
        let stripped = prefix::strip_prefixes(content);
        let mut emitted = Vec::new();

        if let Some(lang_name) = self.active_language.get(&process_id).cloned() {
            if let Some(lang) = self.patterns.languages.iter().find(|l| l.name == lang_name) {
                if lang.stack.iter().any(|re| re.is_match(&stripped)) {
                    self.append_line(process_id, content, timestamp, true);
                    if self.over_cap(process_id) {
                        emitted.push(self.take_and_finalize(process_id));
                    }
                    return emitted;
                }
                if lang.end.iter().any(|re| re.is_match(&stripped)) {
                    self.append_line(process_id, content, timestamp, false);
                    emitted.push(self.take_and_finalize(process_id));
                    return emitted;
                }
                if lang.continuation.iter().any(|re| re.is_match(&stripped)) {
                    self.append_line(process_id, content, timestamp, false);
                    if self.over_cap(process_id) {
                        emitted.push(self.take_and_finalize(process_id));
                    }
                    return emitted;
                }
            }
            // Non-continuation line: finalize the open context, then fall
            // through to re-evaluate this same line as a fresh candidate.
            emitted.push(self.take_and_finalize(process_id));
        }

        if let Some(m) = self.find_start(&stripped) {
            let ctx = ActiveContext {
                process_name: process_name.to_string(),
                reported_language: m.reported_language,
                error_type: m.error_type,
                severity: m.severity,
                message: m.message,
                first_timestamp: timestamp,
                last_timestamp: timestamp,
                raw_lines: vec![content.to_string()],
                stack_lines: Vec::new(),
                context_lines: Vec::new(),
            };
            if m.multiline {
                self.active_language.insert(process_id, m.language_name);
                self.active.insert(process_id, ctx);
            } else {
                emitted.push(ctx.finalize(process_id));
            }
        }

        emitted
    }

    fn append_line(&mut self, process_id: ProcessId, content: &str, timestamp: SystemTime, is_stack: bool) {
        if let Some(active) = self.active.get_mut(&process_id) {
            active.raw_lines.push(content.to_string());
            if is_stack {
                active.stack_lines.push(content.to_string());
            } else {
                active.context_lines.push(content.to_string());
            }
            active.last_timestamp = timestamp;
        }
    }

    fn over_cap(&self, process_id: ProcessId) -> bool {
        self.active.get(&process_id).map(|a| a.raw_lines.len() >= self.max_lines).unwrap_or(false)
    }

    fn take_and_finalize(&mut self, process_id: ProcessId) -> ErrorContext {
        self.active_language.remove(&process_id);
        let active = self.active.remove(&process_id).expect("caller verified presence");
        active.finalize(process_id)
    }

    /// Force-finalize an open context for `process_id`, if any — used on
    /// shutdown and on process exit so no cluster is silently lost.
    pub fn flush(&mut self, process_id: ProcessId) -> Option<ErrorContext> {
        if self.active.contains_key(&process_id) {
            Some(self.take_and_finalize(process_id))
        } else {
            None
        }
    }

    pub fn flush_all(&mut self) -> Vec<ErrorContext> {
        let ids: Vec<ProcessId> = self.active.keys().copied().collect();
        ids.into_iter().filter_map(|id| self.flush(id)).collect()
    }

    fn find_start(&self, stripped: &str) -> Option<StartMatch> {
        for lang in &self.patterns.languages {
            for rule in &lang.start {
                if let Some(caps) = rule.regex.captures(stripped) {
                    return Some(StartMatch {
                        language_name: lang.name.clone(),
                        reported_language: lang.reported_language.clone(),
                        error_type: rule.error_type(&caps),
                        message: rule.message(&caps),
                        severity: rule.severity,
                        multiline: rule.multiline,
                    });
                }
            }
        }
        None
    }
}
