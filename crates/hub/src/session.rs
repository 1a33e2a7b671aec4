// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub session registry. The hub's stdio transport is a single ordered
//! stream, so in practice one connection is one session for the life of
//! the process, but the registry is keyed the same way the Instance
//! Server's is so the two crates read alike (spec.md §4.8, mirroring
//! `brummer_instance::session`).

use std::collections::HashMap;
use std::time::SystemTime;

use brummer_core::{InstanceId, SessionId};
use parking_lot::Mutex;

use crate::relay::RelayHandle;

struct Entry {
    bound_peer: Option<InstanceId>,
    created_at: SystemTime,
    /// Running SSE relay bridge for the currently bound peer, if any. Torn
    /// down on rebind or disconnect.
    relay: Option<RelayHandle>,
}

pub struct HubSessionRegistry {
    entries: Mutex<HashMap<SessionId, Entry>>,
}

impl HubSessionRegistry {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub fn create(&self, now: SystemTime) -> SessionId {
        let id = SessionId::new();
        self.entries.lock().insert(id, Entry { bound_peer: None, created_at: now, relay: None });
        id
    }

    pub fn exists(&self, id: SessionId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn bound_peer(&self, id: SessionId) -> Option<InstanceId> {
        self.entries.lock().get(&id).and_then(|e| e.bound_peer)
    }

    /// Bind `id` to `peer`, tearing down any previous peer's relay first
    /// (spec.md §4.7: "`instances/disconnect` releases the binding but not
    /// the peer session"; rebinding to a new peer implicitly disconnects
    /// the old one the same way).
    pub fn bind(&self, id: SessionId, peer: InstanceId, relay: Option<RelayHandle>) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&id) {
            entry.bound_peer = Some(peer);
            let old = std::mem::replace(&mut entry.relay, relay);
            if let Some(old) = old {
                old.stop();
            }
        }
    }

    pub fn unbind(&self, id: SessionId) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&id) {
            entry.bound_peer = None;
            if let Some(relay) = entry.relay.take() {
                relay.stop();
            }
        }
    }

    pub fn remove(&self, id: SessionId) {
        if let Some(entry) = self.entries.lock().remove(&id) {
            if let Some(relay) = entry.relay {
                relay.stop();
            }
        }
    }
}

impl Default for HubSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_bind_is_observable() {
        let registry = HubSessionRegistry::new();
        let id = registry.create(SystemTime::now());
        assert!(registry.exists(id));
        assert!(registry.bound_peer(id).is_none());

        let peer = InstanceId::new();
        registry.bind(id, peer, None);
        assert_eq!(registry.bound_peer(id), Some(peer));

        registry.unbind(id);
        assert!(registry.bound_peer(id).is_none());
    }

    #[test]
    fn remove_drops_the_session() {
        let registry = HubSessionRegistry::new();
        let id = registry.create(SystemTime::now());
        registry.remove(id);
        assert!(!registry.exists(id));
    }
}
