// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types carried on the EventBus.
//!
//! `Event` is a typed sum carrying exactly one `EventKind`'s payload. The
//! EventBus dispatches by `EventKind` so subscribers register for a specific
//! variant rather than a free-form string name.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error_context::ErrorContext;
use crate::log_entry::LogLevel;
use crate::process::{ProcessId, Termination};
use crate::url_record::UrlRecord;

/// Discriminant used for EventBus subscription keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LogLine,
    ProcessStarted,
    ProcessExited,
    ErrorDetected,
    UrlDetected,
    Build,
    Test,
    ResourceUpdated,
}

/// Result of a build detected in process output (heuristic, content-derived).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildOutcome {
    Started,
    Succeeded,
    Failed,
}

/// Result of a test run detected in process output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    Started,
    Passed,
    Failed,
}

/// A typed event published onto the EventBus.
///
/// Serializes with `{"kind": "...", ...fields}`. An unrecognized `kind`
/// deserializes to nothing usable by design — there is no catch-all variant,
/// since events never cross a process boundary at rest (only within the
/// in-memory bus, or re-encoded as JSON-RPC notifications by the Instance
/// Server, which owns its own wire shapes in `brummer-wire`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    LogLine {
        process_id: ProcessId,
        process_name: String,
        content: String,
        is_error: bool,
        level: LogLevel,
        #[serde(default)]
        timestamp: Option<SystemTime>,
    },
    ProcessStarted {
        process_id: ProcessId,
        process_name: String,
        pid: u32,
        cwd: PathBuf,
    },
    ProcessExited {
        process_id: ProcessId,
        process_name: String,
        termination: Termination,
        duration_ms: u64,
    },
    ErrorDetected {
        context: ErrorContext,
    },
    UrlDetected {
        record: UrlRecord,
    },
    Build {
        process_id: ProcessId,
        process_name: String,
        outcome: BuildOutcome,
        #[serde(default)]
        detail: HashMap<String, String>,
    },
    Test {
        process_id: ProcessId,
        process_name: String,
        outcome: TestOutcome,
        #[serde(default)]
        detail: HashMap<String, String>,
    },
    ResourceUpdated {
        uri: String,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::LogLine { .. } => EventKind::LogLine,
            Event::ProcessStarted { .. } => EventKind::ProcessStarted,
            Event::ProcessExited { .. } => EventKind::ProcessExited,
            Event::ErrorDetected { .. } => EventKind::ErrorDetected,
            Event::UrlDetected { .. } => EventKind::UrlDetected,
            Event::Build { .. } => EventKind::Build,
            Event::Test { .. } => EventKind::Test,
            Event::ResourceUpdated { .. } => EventKind::ResourceUpdated,
        }
    }

    /// Originating process, when the event is process-scoped.
    pub fn process_id(&self) -> Option<ProcessId> {
        match self {
            Event::LogLine { process_id, .. }
            | Event::ProcessStarted { process_id, .. }
            | Event::ProcessExited { process_id, .. }
            | Event::Build { process_id, .. }
            | Event::Test { process_id, .. } => Some(*process_id),
            Event::ErrorDetected { context } => Some(context.process_id),
            Event::UrlDetected { record } => Some(record.process_id),
            Event::ResourceUpdated { .. } => None,
        }
    }

    /// Whether dropping this event under EventBus pool saturation is
    /// acceptable, or whether it instead gets the inline fallback delivery.
    ///
    /// `ProcessExited` and `ErrorDetected` are the two kinds whose loss would
    /// leave a client-visible state machine (process lifecycle, error
    /// surfacing) permanently out of sync; everything else is a best-effort
    /// stream.
    pub fn is_critical(&self) -> bool {
        matches!(self.kind(), EventKind::ProcessExited | EventKind::ErrorDetected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_exited_and_error_detected_are_critical() {
        let ev = Event::ProcessExited {
            process_id: ProcessId::new(),
            process_name: "dev".into(),
            termination: Termination::Exited(0),
            duration_ms: 10,
        };
        assert!(ev.is_critical());
        assert_eq!(ev.kind(), EventKind::ProcessExited);
    }

    #[test]
    fn log_line_is_not_critical() {
        let ev = Event::LogLine {
            process_id: ProcessId::new(),
            process_name: "dev".into(),
            content: "hi".into(),
            is_error: false,
            level: LogLevel::Info,
            timestamp: None,
        };
        assert!(!ev.is_critical());
    }

    #[test]
    fn kind_roundtrips_through_json() {
        let ev = Event::ResourceUpdated { uri: "logs://recent".into() };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"kind\":\"resource_updated\""));
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind(), EventKind::ResourceUpdated);
    }
}
