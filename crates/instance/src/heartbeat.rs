// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background idle-session reaper. Runs for the life of the process,
//! sweeping sessions whose last activity exceeds the configured idle
//! timeout (spec.md §4.5: "sessions idle past the timeout are torn down").

use std::sync::Arc;
use std::time::SystemTime;

use crate::context::InstanceContext;

/// Sweep idle sessions once per `heartbeat_interval_secs` until cancelled.
/// Intended to be spawned as its own task alongside the transport servers.
pub async fn run(ctx: Arc<InstanceContext>) {
    let mut interval = tokio::time::interval(ctx.config.heartbeat_interval());
    loop {
        interval.tick().await;
        reap_once(&ctx, SystemTime::now());
    }
}

fn reap_once(ctx: &Arc<InstanceContext>, now: SystemTime) {
    let idle = ctx.sessions.idle_sessions(now, ctx.config.session_idle_timeout());
    for id in idle {
        tracing::debug!(session_id = %id, "reaping idle session");
        ctx.sessions.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brummer_core::Transport;
    use std::time::Duration;

    fn test_config(idle_timeout_secs: u64) -> brummer_core::Config {
        brummer_core::Config {
            working_dir: std::env::temp_dir(),
            bind_host: "127.0.0.1".into(),
            port: 0,
            log_ring_capacity: 100,
            max_line_bytes: 1024,
            session_idle_timeout_secs: idle_timeout_secs,
            error_cluster_gap_ms: 200,
            error_cluster_max_lines: 50,
            error_cluster_max_duration_ms: 5000,
            error_cluster_min_lines: 2,
            error_pattern_max_lines: 200,
            max_error_contexts: 100,
            heartbeat_interval_secs: 5,
            heartbeat_ttl_secs: 10,
            error_patterns_path: None,
        }
    }

    fn test_ctx(idle_timeout_secs: u64) -> Arc<InstanceContext> {
        let (bus, _h) = brummer_eventbus::EventBus::new(brummer_eventbus::EventBusConfig { queue_capacity: 8, worker_count: 1 });
        let config = test_config(idle_timeout_secs);
        let (log_store, _lh) = brummer_logstore::LogStore::new(config.clone(), bus.clone());
        let supervisor = brummer_supervisor::Supervisor::new(bus.clone(), log_store.clone());
        InstanceContext::new(config, "test", supervisor, log_store, bus, Arc::new(crate::collaborators::NullCollaborators))
    }

    #[test]
    fn reap_once_removes_only_sessions_past_timeout() {
        let ctx = test_ctx(300);
        let t0 = SystemTime::UNIX_EPOCH;
        let stale = ctx.sessions.create(Transport::HttpSse, t0);
        let fresh = ctx.sessions.create(Transport::HttpSse, t0);
        let t1 = t0 + Duration::from_secs(301);
        ctx.sessions.touch(fresh, t1 - Duration::from_secs(1));

        reap_once(&ctx, t1);

        assert!(ctx.sessions.snapshot(stale).is_none());
        assert!(ctx.sessions.snapshot(fresh).is_some());
    }
}
