// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection Manager: one stateful connection per peer Instance Server,
//! discovered through the shared filesystem registry, health-pinged on a
//! fixed interval, and reconnected with exponential backoff until it's
//! declared `Dead` (spec.md §4.7).
//!
//! One background task owns the whole table: it polls the Discovery
//! watcher, drives every peer's health ping / reconnect schedule, and is
//! the only writer of [`PeerEntry`] state. Readers (`list`, `get`,
//! `ensure_session`) take the lock only to copy out a snapshot.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use brummer_core::{HubConfig, InstanceDescriptor, InstanceId, PeerConnection, PeerState};
use brummer_discovery::{DiscoveryWatcher, WatchEvent, WatcherConfig};
use brummer_wire::{Request, Response};
use parking_lot::Mutex;

use crate::client::PeerClient;
use crate::error::HubError;

struct PeerEntry {
    connection: PeerConnection,
    client: PeerClient,
    /// Session id this manager holds open with the peer, established by the
    /// most recent successful `initialize`. Reused across health pings and
    /// every `hub_*` proxy call bound to this peer (spec.md §4.7:
    /// "the peer session is reused for other bindings").
    session_id: Option<String>,
    /// Consecutive health-ping failures since the peer was last `Active`.
    /// Distinct from [`PeerConnection::consecutive_failures`], which counts
    /// failed *reconnect* attempts once already `Retrying`.
    ping_failures: u32,
    next_ping_at: SystemTime,
}

/// Shared, lock-protected table of every peer this hub currently knows
/// about.
pub struct ConnectionManager {
    config: HubConfig,
    peers: Mutex<HashMap<InstanceId, PeerEntry>>,
}

impl ConnectionManager {
    pub fn new(config: HubConfig) -> Arc<Self> {
        Arc::new(Self { config, peers: Mutex::new(HashMap::new()) })
    }

    /// Snapshot every known peer's connection state, for `instances/list`.
    pub fn list(&self) -> Vec<PeerConnection> {
        self.peers.lock().values().map(|e| e.connection.clone()).collect()
    }

    pub fn get(&self, id: InstanceId) -> Option<PeerConnection> {
        self.peers.lock().get(&id).map(|e| e.connection.clone())
    }

    fn client_for(&self, id: InstanceId) -> Option<PeerClient> {
        self.peers.lock().get(&id).map(|e| e.client.clone())
    }

    /// Resolve the session id to proxy a call against, failing with a
    /// structured error that names the peer's current state if it isn't
    /// `Active` (spec.md §4.7: "a proxied tool call against a non-active
    /// peer returns a structured error indicating the peer's state").
    fn bound_session(&self, id: InstanceId) -> Result<(PeerClient, String), HubError> {
        let peers = self.peers.lock();
        let entry = peers.get(&id).ok_or_else(|| HubError::UnknownPeer(id.to_string()))?;
        if entry.connection.state != PeerState::Active {
            return Err(HubError::PeerNotActive(id.to_string(), entry.connection.state.to_string()));
        }
        let session_id = entry.session_id.clone().ok_or_else(|| HubError::PeerNotActive(id.to_string(), "no session".into()))?;
        Ok((entry.client.clone(), session_id))
    }

    /// Proxy one JSON-RPC call to `id`'s bound peer session.
    pub async fn call_peer(&self, id: InstanceId, request: &Request) -> Result<Response, HubError> {
        let (client, session_id) = self.bound_session(id)?;
        client.call(&session_id, request).await
    }

    /// The session id currently bound to an active peer, for opening an SSE
    /// relay onto its stream.
    pub fn peer_session(&self, id: InstanceId) -> Result<(PeerClient, String), HubError> {
        self.bound_session(id)
    }

    fn upsert_descriptor(&self, descriptor: InstanceDescriptor, now: SystemTime) {
        let id = descriptor.id;
        let mut peers = self.peers.lock();
        match peers.get_mut(&id) {
            Some(entry) => entry.connection.descriptor = descriptor,
            None => {
                peers.insert(
                    id,
                    PeerEntry {
                        client: PeerClient::new(&descriptor),
                        connection: PeerConnection::new(descriptor),
                        session_id: None,
                        ping_failures: 0,
                        next_ping_at: now,
                    },
                );
            }
        }
    }

    /// Mark a peer `Dead` after its discovery file disappears (spec.md
    /// §4.7: "peer file removed -> dead"). The entry lingers in the table
    /// for observability rather than being dropped outright.
    fn mark_dead(&self, id: InstanceId) {
        let mut peers = self.peers.lock();
        if let Some(entry) = peers.get_mut(&id) {
            entry.connection.transition(PeerState::Dead);
        }
    }

    fn apply_watch_event(&self, event: WatchEvent, now: SystemTime) {
        match event {
            WatchEvent::Added(file) | WatchEvent::Changed(file) => {
                if let Ok(descriptor) = descriptor_from_file(&file) {
                    self.upsert_descriptor(descriptor, now);
                }
            }
            WatchEvent::Removed { id } => {
                self.mark_dead(InstanceId::from_string(&id));
            }
        }
    }

    /// One reconnect attempt: `Discovered`/`Retrying` -> `Connecting`, then
    /// `initialize` decides `Active` or back to `Retrying`/`Dead`.
    async fn attempt_connect(self: &Arc<Self>, id: InstanceId, now: SystemTime) {
        let Some(client) = self.client_for(id) else { return };
        {
            let mut peers = self.peers.lock();
            let Some(entry) = peers.get_mut(&id) else { return };
            if !entry.connection.transition(PeerState::Connecting) {
                return;
            }
        }

        match client.initialize().await {
            Ok(session_id) => {
                let mut peers = self.peers.lock();
                if let Some(entry) = peers.get_mut(&id) {
                    entry.session_id = Some(session_id);
                    entry.ping_failures = 0;
                    entry.next_ping_at = now + self.config.health_ping_interval();
                    entry.connection.transition(PeerState::Active);
                    tracing::info!(instance_id = %id, "peer connection established");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, instance_id = %id, "peer initialize failed");
                self.retry_or_kill(id, now);
            }
        }
    }

    /// Record one reconnect failure. Escalates to `Dead` once the peer has
    /// exhausted `max_retries` consecutive failed attempts since it was
    /// last `Active` (spec.md §4.7: "exceeded max retries within window ->
    /// dead").
    fn retry_or_kill(&self, id: InstanceId, now: SystemTime) {
        let mut peers = self.peers.lock();
        let Some(entry) = peers.get_mut(&id) else { return };
        if entry.connection.consecutive_failures + 1 >= self.config.max_retries {
            entry.connection.transition(PeerState::Dead);
            tracing::warn!(instance_id = %id, "peer exceeded max retries, declaring dead");
            return;
        }
        entry.connection.transition(PeerState::Retrying);
        let delay = entry.connection.backoff_delay(self.config.backoff_base(), self.config.backoff_cap());
        entry.connection.next_retry_at = Some(now + delay);
    }

    /// One health ping against every currently `Active` peer whose ping
    /// interval has elapsed; failures beyond the threshold demote the peer
    /// to `Retrying` (spec.md §4.7: "periodic ping failures beyond
    /// threshold N -> retrying").
    async fn run_health_pings(self: &Arc<Self>, now: SystemTime) {
        let due: Vec<(InstanceId, PeerClient, String)> = {
            let peers = self.peers.lock();
            peers
                .iter()
                .filter(|(_, e)| e.connection.state == PeerState::Active && e.next_ping_at <= now)
                .filter_map(|(id, e)| e.session_id.clone().map(|sid| (*id, e.client.clone(), sid)))
                .collect()
        };

        for (id, client, session_id) in due {
            let result = client.ping(&session_id).await;
            let mut peers = self.peers.lock();
            let Some(entry) = peers.get_mut(&id) else { continue };
            entry.next_ping_at = now + self.config.health_ping_interval();
            match result {
                Ok(()) => entry.ping_failures = 0,
                Err(e) => {
                    entry.ping_failures += 1;
                    tracing::debug!(error = %e, instance_id = %id, failures = entry.ping_failures, "health ping failed");
                    if entry.ping_failures >= self.config.ping_failure_threshold {
                        entry.ping_failures = 0;
                        entry.connection.transition(PeerState::Retrying);
                        let delay = entry.connection.backoff_delay(self.config.backoff_base(), self.config.backoff_cap());
                        entry.connection.next_retry_at = Some(now + delay);
                        tracing::warn!(instance_id = %id, "peer demoted to retrying after repeated ping failures");
                    }
                }
            }
        }
    }

    /// Attempt reconnects for every `Discovered` peer (first contact) or
    /// `Retrying` peer whose backoff deadline has passed.
    async fn run_reconnects(self: &Arc<Self>, now: SystemTime) {
        let due: Vec<InstanceId> = {
            let peers = self.peers.lock();
            peers
                .iter()
                .filter(|(_, e)| match e.connection.state {
                    PeerState::Discovered => true,
                    PeerState::Retrying => e.connection.next_retry_at.map_or(true, |at| at <= now),
                    _ => false,
                })
                .map(|(id, _)| *id)
                .collect()
        };
        for id in due {
            self.attempt_connect(id, now).await;
        }
    }

    /// Drive the manager forever: poll Discovery, run due health pings, run
    /// due reconnects. Intended to be spawned once as a background task
    /// alongside the hub's stdio transport. `instances_dir` is the registry
    /// directory to watch — callers pass [`default_instances_dir`] in
    /// production and a temporary directory in tests.
    pub async fn run(self: Arc<Self>, instances_dir: PathBuf) {
        let watcher_config = WatcherConfig {
            scan_interval: self.config.discovery_scan_interval(),
            staleness: self.config.discovery_staleness(),
        };
        let mut watcher = DiscoveryWatcher::new(instances_dir, watcher_config);
        let mut ticker = tokio::time::interval(tick_interval(&self.config));

        loop {
            ticker.tick().await;
            let now = SystemTime::now();
            for event in watcher.poll(now) {
                self.apply_watch_event(event, now);
            }
            self.run_health_pings(now).await;
            self.run_reconnects(now).await;
        }
    }
}

/// The tick cadence the manager's own loop runs at: fine enough that health
/// pings and reconnect backoff deadlines are observed promptly, without
/// busy-polling Discovery faster than its own scan interval warrants.
fn tick_interval(config: &HubConfig) -> Duration {
    config.health_ping_interval().min(Duration::from_secs(1)).max(Duration::from_millis(50))
}

fn descriptor_from_file(file: &brummer_discovery::InstanceFile) -> Result<InstanceDescriptor, HubError> {
    let addr = format!("127.0.0.1:{}", file.port)
        .parse()
        .map_err(|_| HubError::Protocol(format!("invalid instance file port: {}", file.port)))?;
    Ok(InstanceDescriptor::new(
        InstanceId::from_string(&file.id),
        file.name.clone(),
        file.directory.clone(),
        addr,
        file.pid,
        file.started_at.into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::path::PathBuf;

    fn descriptor() -> InstanceDescriptor {
        InstanceDescriptor::new(
            InstanceId::new(),
            "dev",
            PathBuf::from("/tmp"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7777),
            123,
            SystemTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn upsert_then_mark_dead_round_trips_through_list() {
        let manager = ConnectionManager::new(HubConfig::default());
        let d = descriptor();
        let id = d.id;
        manager.upsert_descriptor(d, SystemTime::UNIX_EPOCH);
        assert_eq!(manager.list().len(), 1);
        assert_eq!(manager.get(id).unwrap().state, PeerState::Discovered);

        manager.mark_dead(id);
        assert_eq!(manager.get(id).unwrap().state, PeerState::Dead);
    }

    #[test]
    fn unknown_peer_call_reports_unknown_peer() {
        let manager = ConnectionManager::new(HubConfig::default());
        let err = manager.bound_session(InstanceId::new()).unwrap_err();
        assert!(matches!(err, HubError::UnknownPeer(_)));
    }

    #[test]
    fn non_active_peer_call_reports_peer_not_active() {
        let manager = ConnectionManager::new(HubConfig::default());
        let d = descriptor();
        let id = d.id;
        manager.upsert_descriptor(d, SystemTime::UNIX_EPOCH);
        let err = manager.bound_session(id).unwrap_err();
        assert!(matches!(err, HubError::PeerNotActive(_, _)));
    }
}
