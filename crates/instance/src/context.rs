// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared instance context: the struct handed to every request handler,
//! mirroring the listener context the teacher's daemon builds once per
//! process and threads through its command handlers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use brummer_core::{Config, InstanceDescriptor, InstanceId};
use brummer_eventbus::EventBus;
use brummer_logstore::LogStore;
use brummer_supervisor::Supervisor;

use crate::collaborators::ExternalCollaborators;
use crate::session::SessionRegistry;

/// Everything a request handler needs, shared across every transport and
/// every session.
pub struct InstanceContext {
    pub config: Config,
    pub instance_id: InstanceId,
    pub display_name: String,
    pub started_at: SystemTime,
    pub supervisor: Supervisor,
    pub log_store: LogStore,
    pub event_bus: EventBus,
    pub sessions: SessionRegistry,
    pub collaborators: Arc<dyn ExternalCollaborators>,
}

impl InstanceContext {
    pub fn new(
        config: Config,
        display_name: impl Into<String>,
        supervisor: Supervisor,
        log_store: LogStore,
        event_bus: EventBus,
        collaborators: Arc<dyn ExternalCollaborators>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            instance_id: InstanceId::new(),
            display_name: display_name.into(),
            started_at: SystemTime::now(),
            supervisor,
            log_store,
            event_bus,
            sessions: SessionRegistry::new(),
            collaborators,
        })
    }

    pub fn descriptor(&self, addr: SocketAddr, pid: u32) -> InstanceDescriptor {
        InstanceDescriptor::new(self.instance_id, self.display_name.clone(), self.config.working_dir.clone(), addr, pid, self.started_at)
    }
}
