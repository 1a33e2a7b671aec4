// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! brummer-errorparser: turns a per-process stream of log lines into a
//! stream of [`brummer_core::ErrorContext`]s via two independent
//! strategies — a pattern-driven multi-line state machine and a time-based
//! clusterer — sharing the same output shape (spec.md §4.4).

mod cluster;
pub mod default_patterns {
    //! Re-exported only so downstream crates/tests can assert against the
    //! embedded table's text if they need to (e.g. doc generation); normal
    //! callers just use [`crate::CompiledPatternSet::default`].
    pub const TOML: &str = include_str!("default_patterns.toml");
}
mod patterns;
mod postprocess;
mod prefix;
mod state_machine;

use std::sync::Arc;
use std::time::SystemTime;

use brummer_core::{Config, ErrorContext, ProcessId};

pub use cluster::{ClusterConfig, ClusterEngine};
pub use patterns::{CompiledLanguage, CompiledPatternSet, PatternError, StartRule};
pub use state_machine::PatternStateMachine;

/// The combined parser: runs both strategies over every line and returns
/// whatever either one finalized. A single non-matching, non-error line
/// commonly yields nothing from either side — that's normal, not an error
/// (spec.md §7.4).
pub struct ErrorParser {
    pattern_machine: PatternStateMachine,
    cluster_engine: ClusterEngine,
}

impl ErrorParser {
    /// Always uses the embedded default pattern table, ignoring
    /// `config.error_patterns_path`. Callers that want a configured custom
    /// table honored should use [`ErrorParser::from_config`] instead; this
    /// constructor exists for tests and as `LogStore`'s fallback when
    /// loading the configured path fails.
    pub fn new(config: &Config) -> Self {
        Self::with_patterns(config, Arc::new(CompiledPatternSet::default()))
    }

    /// Load the pattern table from `config.error_patterns_path` if set,
    /// falling back to the embedded default.
    pub fn from_config(config: &Config) -> Result<Self, PatternError> {
        let patterns = match &config.error_patterns_path {
            Some(path) => Arc::new(CompiledPatternSet::load(path)?),
            None => Arc::new(CompiledPatternSet::default()),
        };
        Ok(Self::with_patterns(config, patterns))
    }

    pub fn with_patterns(config: &Config, patterns: Arc<CompiledPatternSet>) -> Self {
        Self {
            pattern_machine: PatternStateMachine::new(patterns, config.error_pattern_max_lines),
            cluster_engine: ClusterEngine::new(ClusterConfig {
                gap: config.error_cluster_gap(),
                max_lines: config.error_cluster_max_lines,
                max_duration: config.error_cluster_max_duration(),
                min_lines: config.error_cluster_min_lines,
            }),
        }
    }

    /// Feed one log line. `is_error` gates whether the line is offered to
    /// the time-based clusterer (spec.md: "each incoming error-level
    /// entry"); the pattern state machine always sees every line, since an
    /// error header frequently arrives on a plain stdout line with no
    /// `is_error` flag set (e.g. a framework printing its own stack trace).
    pub fn process_line(
        &mut self,
        process_id: ProcessId,
        process_name: &str,
        content: &str,
        is_error: bool,
        timestamp: SystemTime,
    ) -> Vec<ErrorContext> {
        let mut out = self.pattern_machine.process_line(process_id, process_name, content, timestamp);
        if is_error {
            if let Some(ctx) = self.cluster_engine.process_error_line(process_id, process_name, content, timestamp) {
                out.push(ctx);
            }
        }
        out
    }

    /// Force-finalize both strategies' open state for `process_id` — called
    /// when a process exits, so no in-flight cluster is silently lost.
    pub fn flush_process(&mut self, process_id: ProcessId) -> Vec<ErrorContext> {
        let mut out = Vec::new();
        out.extend(self.pattern_machine.flush(process_id));
        out.extend(self.cluster_engine.flush(process_id));
        out
    }

    /// Force-finalize every process's open state — called at shutdown.
    pub fn flush_all(&mut self) -> Vec<ErrorContext> {
        let mut out = self.pattern_machine.flush_all();
        out.extend(self.cluster_engine.flush_all());
        out
    }
}
