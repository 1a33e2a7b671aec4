// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time-based clustering: groups consecutive error-level log lines from one
//! process into an [`ErrorContext`] purely by timing, independent of the
//! pattern table. Catches errors whose shape the pattern table doesn't know.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use regex::Regex;

use brummer_core::{ErrorContext, ErrorContextId, ProcessId, Severity};

/// Heuristic "this looks like a stack frame" patterns, used only by the
/// clustering strategy (the pattern state machine has its own, per-language
/// stack regexes — this is the generic fallback for shapes it has never
/// seen).
static STACK_LIKE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"^\s+at\s", r#"^\s+File "#, r"^\s+\S+\.(go|rs|py|js|ts):\d+", r"^\s*\d+:\s", r"^goroutine\s"]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
});

fn looks_like_stack_frame(line: &str) -> bool {
    STACK_LIKE.iter().any(|re| re.is_match(line))
}

struct Cluster {
    process_name: String,
    start: SystemTime,
    last: SystemTime,
    lines: Vec<String>,
}

/// Tunables mirrored from [`brummer_core::Config`]'s `error_cluster_*` fields.
#[derive(Debug, Clone, Copy)]
pub struct ClusterConfig {
    pub gap: Duration,
    pub max_lines: usize,
    pub max_duration: Duration,
    pub min_lines: usize,
}

/// Per-process time-based clustering engine.
pub struct ClusterEngine {
    config: ClusterConfig,
    active: HashMap<ProcessId, Cluster>,
}

impl ClusterEngine {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config, active: HashMap::new() }
    }

    /// Feed one error-level line. Returns a finalized [`ErrorContext`] if
    /// this line's arrival closed a cluster that met `min_lines` (either
    /// because the gap/cap/duration closed the *previous* cluster, whose
    /// lines this new one doesn't belong to).
    pub fn process_error_line(
        &mut self,
        process_id: ProcessId,
        process_name: &str,
        content: &str,
        timestamp: SystemTime,
    ) -> Option<ErrorContext> {
        let mut finalized = None;
        if let Some(cluster) = self.active.get(&process_id) {
            let gap = timestamp.duration_since(cluster.last).unwrap_or_default();
            let span = timestamp.duration_since(cluster.start).unwrap_or_default();
            let joins = gap <= self.config.gap
                && cluster.lines.len() < self.config.max_lines
                && span <= self.config.max_duration;
            if !joins {
                finalized = self.finalize(process_id);
            }
        }

        let cluster = self.active.entry(process_id).or_insert_with(|| Cluster {
            process_name: process_name.to_string(),
            start: timestamp,
            last: timestamp,
            lines: Vec::new(),
        });
        cluster.lines.push(content.to_string());
        cluster.last = timestamp;

        if cluster.lines.len() >= self.config.max_lines {
            let capped = self.finalize(process_id);
            return finalized.or(capped);
        }
        finalized
    }

    /// Force-finalize a process's open cluster, if any — shutdown flush.
    pub fn flush(&mut self, process_id: ProcessId) -> Option<ErrorContext> {
        self.finalize(process_id)
    }

    pub fn flush_all(&mut self) -> Vec<ErrorContext> {
        let ids: Vec<ProcessId> = self.active.keys().copied().collect();
        ids.into_iter().filter_map(|id| self.finalize(id)).collect()
    }

    fn finalize(&mut self, process_id: ProcessId) -> Option<ErrorContext> {
        let cluster = self.active.remove(&process_id)?;
        if cluster.lines.len() < self.config.min_lines {
            return None;
        }
        let header = cluster.lines[0].clone();
        let mut stack_lines = Vec::new();
        let mut context_lines = Vec::new();
        for line in &cluster.lines[1..] {
            if looks_like_stack_frame(line) {
                stack_lines.push(line.clone());
            } else {
                context_lines.push(line.clone());
            }
        }
        Some(ErrorContext {
            id: ErrorContextId::new(),
            process_id,
            process_name: cluster.process_name,
            first_timestamp: cluster.start,
            last_timestamp: cluster.last,
            error_type: "Clustered".to_string(),
            message: header,
            severity: Severity::Error,
            language: None,
            raw_lines: cluster.lines,
            stack_lines,
            context_lines,
            source: "cluster",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn engine() -> ClusterEngine {
        ClusterEngine::new(ClusterConfig {
            gap: Duration::from_millis(200),
            max_lines: 50,
            max_duration: Duration::from_secs(5),
            min_lines: 2,
        })
    }

    #[test]
    fn lines_within_gap_join_one_cluster() {
        let mut e = engine();
        let p = ProcessId::new();
        let t0 = UNIX_EPOCH;
        assert!(e.process_error_line(p, "api", "line one", t0).is_none());
        assert!(e.process_error_line(p, "api", "  at foo", t0 + Duration::from_millis(50)).is_none());
        // Gap > 200ms closes the cluster.
        let closed =
            e.process_error_line(p, "api", "unrelated later error", t0 + Duration::from_millis(600));
        let ctx = closed.expect("first cluster should finalize on gap");
        assert_eq!(ctx.raw_lines.len(), 2);
        assert_eq!(ctx.stack_lines, vec!["  at foo".to_string()]);
    }

    #[test]
    fn cluster_below_min_size_is_dropped() {
        let mut e = engine();
        let p = ProcessId::new();
        let t0 = UNIX_EPOCH;
        e.process_error_line(p, "api", "only line", t0);
        let closed = e.process_error_line(p, "api", "next cluster", t0 + Duration::from_secs(1));
        assert!(closed.is_none(), "single-line cluster must not be promoted to a context");
    }

    #[test]
    fn max_lines_cap_closes_cluster_immediately() {
        let mut e = ClusterEngine::new(ClusterConfig {
            gap: Duration::from_secs(5),
            max_lines: 3,
            max_duration: Duration::from_secs(60),
            min_lines: 1,
        });
        let p = ProcessId::new();
        let t0 = UNIX_EPOCH;
        assert!(e.process_error_line(p, "api", "one", t0).is_none());
        assert!(e.process_error_line(p, "api", "two", t0 + Duration::from_millis(10)).is_none());
        let closed = e.process_error_line(p, "api", "three", t0 + Duration::from_millis(20));
        assert!(closed.is_some());
    }

    #[test]
    fn flush_finalizes_an_open_cluster_that_met_min_size() {
        let mut e = engine();
        let p = ProcessId::new();
        e.process_error_line(p, "api", "only line", UNIX_EPOCH);
        e.process_error_line(p, "api", "second line", UNIX_EPOCH + Duration::from_millis(10));
        assert!(e.flush(p).is_some());
    }

    #[test]
    fn flush_drops_a_cluster_still_below_min_size() {
        let mut e = engine();
        let p = ProcessId::new();
        e.process_error_line(p, "api", "only line", UNIX_EPOCH);
        assert!(e.flush(p).is_none());
    }
}
