// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared hub context: the struct threaded through every request handler,
//! mirroring `brummer_instance::InstanceContext`.

use std::sync::Arc;

use brummer_core::HubConfig;
use tokio::sync::mpsc;

use crate::connection::ConnectionManager;
use crate::session::HubSessionRegistry;

/// One pre-serialized JSON-RPC notification line, ready to write to stdout.
/// Both locally-originated notifications and relayed peer frames flow
/// through the same channel, so the stdio transport has a single writer.
#[derive(Debug, Clone)]
pub struct OutboundNotification(pub String);

pub struct HubContext {
    pub config: HubConfig,
    pub connections: Arc<ConnectionManager>,
    pub sessions: HubSessionRegistry,
    pub notify_tx: mpsc::UnboundedSender<OutboundNotification>,
}

impl HubContext {
    pub fn new(config: HubConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundNotification>) {
        let connections = ConnectionManager::new(config.clone());
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let ctx = Self { config, connections, sessions: HubSessionRegistry::new(), notify_tx };
        (Arc::new(ctx), notify_rx)
    }
}
