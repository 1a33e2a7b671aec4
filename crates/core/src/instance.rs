// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance descriptor: the record a running Instance Server publishes to
//! Discovery so peers and the Hub can find it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identity for a running Instance Server, stable for its process lifetime.
    pub struct InstanceId("inst-");
}

/// Everything a peer needs to locate and greet a running instance without
/// having talked to it yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub id: InstanceId,
    pub display_name: String,
    pub working_dir: PathBuf,
    pub addr: SocketAddr,
    pub pid: u32,
    pub started_at: SystemTime,
    pub last_heartbeat: SystemTime,
    /// Crate/tool version, surfaced for compatibility diagnostics.
    pub version: String,
}

impl InstanceDescriptor {
    pub fn new(
        id: InstanceId,
        display_name: impl Into<String>,
        working_dir: PathBuf,
        addr: SocketAddr,
        pid: u32,
        now: SystemTime,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            working_dir,
            addr,
            pid,
            started_at: now,
            last_heartbeat: now,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn heartbeat(&mut self, now: SystemTime) {
        self.last_heartbeat = now;
    }

    /// An instance is stale once its heartbeat hasn't refreshed within `ttl`.
    /// Discovery treats stale descriptors as candidates for removal, but only
    /// after independently confirming the pid is gone — a slow heartbeat
    /// writer is not the same as a dead process.
    pub fn is_stale(&self, now: SystemTime, ttl: std::time::Duration) -> bool {
        now.duration_since(self.last_heartbeat).unwrap_or_default() >= ttl
    }
}
