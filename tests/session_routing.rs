// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end exercise of spec.md §8 scenario 4 ("session routing in hub"):
//! two real Instance Servers are bound on loopback ports, discovered by a
//! `ConnectionManager` watching a shared registry directory, and a hub
//! session is routed to the one it explicitly connected to — never the
//! other.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use brummer_core::{Config, HubConfig, InstanceId, PeerState};
use brummer_discovery::Registration;
use brummer_eventbus::{EventBus, EventBusConfig};
use brummer_hub::context::HubContext;
use brummer_hub::dispatch as hub_dispatch;
use brummer_instance::collaborators::NullCollaborators;
use brummer_instance::{transport, InstanceContext};
use brummer_logstore::LogStore;
use brummer_supervisor::Supervisor;
use brummer_wire::{methods, Request, RequestId, Response};

async fn spawn_instance(script_name: &str) -> (Arc<InstanceContext>, SocketAddr, tempfile::TempDir) {
    let project_dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        project_dir.path().join("package.json"),
        format!(r#"{{"scripts": {{"{script_name}": "echo hi"}}}}"#),
    )
    .expect("write package.json");

    let config = Config {
        working_dir: project_dir.path().to_path_buf(),
        bind_host: "127.0.0.1".to_string(),
        port: 0,
        log_ring_capacity: 1_000,
        max_line_bytes: 16 * 1024,
        session_idle_timeout_secs: 300,
        error_cluster_gap_ms: 200,
        error_cluster_max_lines: 50,
        error_cluster_max_duration_ms: 5_000,
        error_cluster_min_lines: 2,
        error_pattern_max_lines: 200,
        max_error_contexts: 1_000,
        heartbeat_interval_secs: 5,
        heartbeat_ttl_secs: 10,
        error_patterns_path: None,
    };

    let (event_bus, _bus_handle) = EventBus::new(EventBusConfig::default());
    let (log_store, _log_handle) = LogStore::new(config.clone(), event_bus.clone());
    let supervisor = Supervisor::new(event_bus.clone(), log_store.clone());
    let ctx = InstanceContext::new(config, "peer", supervisor, log_store, event_bus, Arc::new(NullCollaborators));

    let listener = tokio::net::TcpListener::bind((ctx.config.bind_host.as_str(), ctx.config.port))
        .await
        .expect("bind instance listener");
    let addr = listener.local_addr().expect("local addr");

    let app = transport::http::router(ctx.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (ctx, addr, project_dir)
}

async fn wait_for_active(connections: &brummer_hub::ConnectionManager, id: InstanceId, timeout: Duration) {
    let deadline = SystemTime::now() + timeout;
    loop {
        if let Some(conn) = connections.get(id) {
            if conn.state == PeerState::Active {
                return;
            }
        }
        assert!(SystemTime::now() < deadline, "peer {id} never became active");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn hub_routes_a_bound_session_to_its_connected_peer_only() {
    let (instance_a, addr_a, _dir_a) = spawn_instance("only-on-a").await;
    let (instance_b, addr_b, _dir_b) = spawn_instance("only-on-b").await;

    let registry_dir = tempfile::tempdir().expect("registry tempdir");
    let instances_dir: PathBuf = registry_dir.path().join("instances");

    let descriptor_a = instance_a.descriptor(addr_a, std::process::id());
    let descriptor_b = instance_b.descriptor(addr_b, std::process::id());
    let id_a = descriptor_a.id;
    let id_b = descriptor_b.id;

    let _registration_a = Registration::register(&instances_dir, &descriptor_a).expect("register a");
    let _registration_b = Registration::register(&instances_dir, &descriptor_b).expect("register b");

    let hub_config = HubConfig { health_ping_interval_secs: 1, ..HubConfig::default() };
    let (hub_ctx, _notify_rx) = HubContext::new(hub_config);
    let manager_task = tokio::spawn(hub_ctx.connections.clone().run(instances_dir));

    wait_for_active(&hub_ctx.connections, id_a, Duration::from_secs(10)).await;
    wait_for_active(&hub_ctx.connections, id_b, Duration::from_secs(10)).await;

    let (session_id, _init_result) = hub_dispatch::initialize(&hub_ctx, brummer_wire::session_protocol::InitializeParams { client_name: None, client_version: None });

    let connect_request = Request::call(
        RequestId::Number(1),
        methods::INSTANCES_CONNECT,
        Some(serde_json::json!({ "instance_id": id_a.to_string() })),
    );
    let connect_response = hub_dispatch::dispatch(&hub_ctx, session_id, connect_request).await.expect("connect response");
    assert!(!connect_response.is_error(), "instances/connect failed: {connect_response:?}");

    let call_request = Request::call(
        RequestId::Number(2),
        methods::TOOLS_CALL,
        Some(serde_json::json!({ "name": "hub_scripts/list", "arguments": {} })),
    );
    let call_response = hub_dispatch::dispatch(&hub_ctx, session_id, call_request).await.expect("tools/call response");

    let Response::Success { result, .. } = call_response else {
        panic!("expected a successful hub_scripts/list result, got {call_response:?}");
    };
    let result: brummer_wire::CallToolResult = serde_json::from_value(result).expect("CallToolResult");
    assert!(!result.is_error);
    let brummer_wire::ContentItem::Json { value } = &result.content[0] else {
        panic!("expected a json content item");
    };
    let scripts = value.get("scripts").and_then(|s| s.as_array()).expect("scripts array");
    let names: Vec<&str> = scripts.iter().filter_map(|s| s.as_str()).collect();

    assert!(names.contains(&"only-on-a"), "expected instance A's script in {names:?}");
    assert!(!names.contains(&"only-on-b"), "must not see instance B's script through A's binding: {names:?}");

    manager_task.abort();
}
