// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URL record: a URL detected in captured output.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::process::ProcessId;

/// A URL observed in a process's output.
///
/// The URL string is the logical map key: re-observations update `latest`
/// and `context` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub process_id: ProcessId,
    pub process_name: String,
    pub first_seen: SystemTime,
    pub latest_seen: SystemTime,
    /// The line it was first seen in.
    pub context: String,
    /// Optional proxy alias URL (set by the external HTTP proxy collaborator).
    pub proxy_url: Option<String>,
}

impl UrlRecord {
    pub fn observe(&mut self, at: SystemTime, context: impl Into<String>) {
        self.latest_seen = at;
        self.context = context.into();
    }
}
