// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client session: per-connection state held by the Instance Server for a
//! single JSON-RPC client (an SSE stream, an HTTP POST caller, or a stdio
//! peer).

use std::collections::HashSet;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;

crate::define_id! {
    /// Opaque identity handed to a client on `initialize` and echoed back on
    /// every subsequent request.
    pub struct SessionId("sess-");
}

/// Transport a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    HttpSse,
    Stdio,
}

crate::simple_display! {
    Transport {
        HttpSse => "http_sse",
        Stdio => "stdio",
    }
}

/// A single client session tracked by an Instance Server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSession {
    pub id: SessionId,
    pub transport: Transport,
    pub created_at: SystemTime,
    pub last_activity: SystemTime,
    /// Resource URIs this session has subscribed to for change notifications.
    pub subscriptions: HashSet<String>,
    /// When this session is a hub-bound proxy leg, the peer instance it is
    /// currently bound to.
    pub bound_peer: Option<InstanceId>,
}

impl ClientSession {
    pub fn new(id: SessionId, transport: Transport, now: SystemTime) -> Self {
        Self { id, transport, created_at: now, last_activity: now, subscriptions: HashSet::new(), bound_peer: None }
    }

    pub fn touch(&mut self, now: SystemTime) {
        self.last_activity = now;
    }

    pub fn idle_for(&self, now: SystemTime) -> std::time::Duration {
        now.duration_since(self.last_activity).unwrap_or_default()
    }

    pub fn is_idle(&self, now: SystemTime, timeout: std::time::Duration) -> bool {
        self.idle_for(now) >= timeout
    }

    pub fn subscribe(&mut self, uri: impl Into<String>) -> bool {
        self.subscriptions.insert(uri.into())
    }

    pub fn unsubscribe(&mut self, uri: &str) -> bool {
        self.subscriptions.remove(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn idle_detection_uses_last_activity() {
        let t0 = SystemTime::UNIX_EPOCH;
        let mut s = ClientSession::new(SessionId::new(), Transport::HttpSse, t0);
        let t1 = t0 + Duration::from_secs(30);
        assert!(s.is_idle(t1, Duration::from_secs(10)));
        s.touch(t1);
        assert!(!s.is_idle(t1, Duration::from_secs(10)));
    }

    #[test]
    fn subscribe_and_unsubscribe_round_trip() {
        let mut s = ClientSession::new(SessionId::new(), Transport::Stdio, SystemTime::UNIX_EPOCH);
        assert!(s.subscribe("logs://recent"));
        assert!(!s.subscribe("logs://recent"));
        assert!(s.unsubscribe("logs://recent"));
        assert!(!s.unsubscribe("logs://recent"));
    }
}
