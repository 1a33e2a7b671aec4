// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: tracks every connected client (HTTP+SSE or stdio),
//! each with its own SSE frame queue and a per-session execution lock that
//! gives request processing FIFO order (spec.md §4.5, §5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use brummer_core::{ClientSession, SessionId, Transport};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

/// Bounded broadcast capacity for a session's SSE channel. Lagging
/// receivers drop the oldest frames rather than block the publisher
/// (spec.md §5: "bounded SSE frame queue per session, drop-oldest with a
/// dropped counter").
const SSE_QUEUE_CAPACITY: usize = 256;

/// One outgoing SSE frame: a JSON-RPC notification (or tool-streaming
/// progress frame) already serialized to its `data:` payload.
#[derive(Debug, Clone)]
pub struct SseFrame(pub String);

struct Entry {
    session: ClientSession,
    sse_tx: broadcast::Sender<SseFrame>,
    /// Held for the duration of one in-flight request so a second request
    /// on the same session queues behind it instead of interleaving.
    exec_lock: Arc<AsyncMutex<()>>,
    cancel: CancellationToken,
}

/// Shared, lock-protected table of live sessions.
pub struct SessionRegistry {
    entries: SyncMutex<HashMap<SessionId, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { entries: SyncMutex::new(HashMap::new()) }
    }

    pub fn create(&self, transport: Transport, now: SystemTime) -> SessionId {
        let id = SessionId::new();
        let (sse_tx, _rx) = broadcast::channel(SSE_QUEUE_CAPACITY);
        self.entries.lock().insert(
            id,
            Entry {
                session: ClientSession::new(id, transport, now),
                sse_tx,
                exec_lock: Arc::new(AsyncMutex::new(())),
                cancel: CancellationToken::new(),
            },
        );
        id
    }

    pub fn touch(&self, id: SessionId, now: SystemTime) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.session.touch(now);
        }
    }

    pub fn snapshot(&self, id: SessionId) -> Option<ClientSession> {
        self.entries.lock().get(&id).map(|e| e.session.clone())
    }

    pub fn subscribe(&self, id: SessionId, uri: &str) -> bool {
        self.entries.lock().get_mut(&id).map(|e| e.session.subscribe(uri)).unwrap_or(false)
    }

    pub fn unsubscribe(&self, id: SessionId, uri: &str) -> bool {
        self.entries.lock().get_mut(&id).map(|e| e.session.unsubscribe(uri)).unwrap_or(false)
    }

    pub fn bind_peer(&self, id: SessionId, peer: Option<brummer_core::InstanceId>) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.session.bound_peer = peer;
        }
    }

    /// Every session subscribed to `uri`, for fan-out on a resource update.
    pub fn subscribers_of(&self, uri: &str) -> Vec<SessionId> {
        self.entries.lock().iter().filter(|(_, e)| e.session.subscriptions.contains(uri)).map(|(id, _)| *id).collect()
    }

    pub fn all_ids(&self) -> Vec<SessionId> {
        self.entries.lock().keys().copied().collect()
    }

    /// Subscribe a new SSE receiver to a session's frame channel. `None` if
    /// the session doesn't exist.
    pub fn sse_receiver(&self, id: SessionId) -> Option<broadcast::Receiver<SseFrame>> {
        self.entries.lock().get(&id).map(|e| e.sse_tx.subscribe())
    }

    /// Broadcast a frame to a session's SSE channel. A no-op (not an error)
    /// if the session has no live SSE receiver yet — the frame is simply
    /// not seen by anyone, matching a best-effort notification stream.
    pub fn publish_frame(&self, id: SessionId, frame: SseFrame) {
        if let Some(entry) = self.entries.lock().get(&id) {
            let _ = entry.sse_tx.send(frame);
        }
    }

    pub fn broadcast_frame(&self, ids: &[SessionId], frame: SseFrame) {
        let entries = self.entries.lock();
        for id in ids {
            if let Some(entry) = entries.get(id) {
                let _ = entry.sse_tx.send(frame.clone());
            }
        }
    }

    /// Acquire the per-session execution lock, serializing request
    /// processing on this session.
    pub fn exec_lock(&self, id: SessionId) -> Option<Arc<AsyncMutex<()>>> {
        self.entries.lock().get(&id).map(|e| e.exec_lock.clone())
    }

    pub fn cancellation(&self, id: SessionId) -> Option<CancellationToken> {
        self.entries.lock().get(&id).map(|e| e.cancel.clone())
    }

    /// Tear down a session: cancel any in-flight streaming call and drop its
    /// SSE channel, closing the sink (spec.md §4.5: "destroying the session
    /// closes the sink and removes subscriptions").
    pub fn remove(&self, id: SessionId) {
        if let Some(entry) = self.entries.lock().remove(&id) {
            entry.cancel.cancel();
        }
    }

    pub fn idle_sessions(&self, now: SystemTime, timeout: std::time::Duration) -> Vec<SessionId> {
        self.entries.lock().iter().filter(|(_, e)| e.session.is_idle(now, timeout)).map(|(id, _)| *id).collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
