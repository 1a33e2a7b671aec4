// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE relay bridge: streams one peer's `/mcp` SSE output and republishes
//! each `data:` frame unchanged onto the hub's own outbound notification
//! channel (spec.md §4.7: "results and streaming frames are relayed
//! unchanged back to the hub client"). Grounded on the teacher's WebSocket
//! event-bridge task (`adapters/agent/docker/ws.rs`): a background task
//! with a shutdown channel, reading until the stream ends or is cancelled.

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};

use crate::client::PeerClient;
use crate::context::OutboundNotification;

/// Handle to a running relay bridge. Dropping it (or calling [`stop`])
/// tears the bridge down.
///
/// [`stop`]: RelayHandle::stop
pub struct RelayHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl RelayHandle {
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.task.abort();
    }
}

/// Spawn a background task that streams `session_id`'s SSE frames from the
/// peer reachable through `client` and forwards each one onto `out`.
pub fn spawn(client: PeerClient, session_id: String, out: mpsc::UnboundedSender<OutboundNotification>) -> RelayHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run(client, session_id, out, shutdown_rx));
    RelayHandle { shutdown_tx: Some(shutdown_tx), task }
}

async fn run(client: PeerClient, session_id: String, out: mpsc::UnboundedSender<OutboundNotification>, mut shutdown: oneshot::Receiver<()>) {
    let response = match client.open_sse(&session_id).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, %session_id, "failed to open peer SSE stream");
            return;
        }
    };

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(%session_id, "peer SSE relay shut down");
                return;
            }
            chunk = stream.next() => {
                let Some(chunk) = chunk else {
                    tracing::debug!(%session_id, "peer SSE stream ended");
                    return;
                };
                match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        drain_lines(&mut buffer, &out);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, %session_id, "peer SSE stream error");
                        return;
                    }
                }
            }
        }
    }
}

/// Extract complete `data: ...` lines from `buffer`, leaving any trailing
/// partial line for the next chunk.
fn drain_lines(buffer: &mut String, out: &mpsc::UnboundedSender<OutboundNotification>) {
    while let Some(pos) = buffer.find('\n') {
        let line: String = buffer.drain(..=pos).collect();
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(payload) = line.strip_prefix("data:") {
            let _ = out.send(OutboundNotification(payload.trim_start().to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_lines_extracts_data_payloads_and_keeps_partial_tail() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut buffer = String::from("data: {\"a\":1}\n\ndata: {\"b\":2}\npart");
        drain_lines(&mut buffer, &tx);
        drop(tx);

        assert_eq!(buffer, "part");
        assert_eq!(rx.try_recv().unwrap().0, "{\"a\":1}");
        assert_eq!(rx.try_recv().unwrap().0, "{\"b\":2}");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn drain_lines_ignores_non_data_lines() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut buffer = String::from("event: ping\nid: 1\ndata: hello\n");
        drain_lines(&mut buffer, &tx);
        assert_eq!(rx.try_recv().unwrap().0, "hello");
        assert!(rx.try_recv().is_err());
    }
}
