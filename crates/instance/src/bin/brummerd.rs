// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs one Instance Server in the foreground: an HTTP+SSE listener plus a
//! background idle-session reaper and a discovery registration that's
//! refreshed on the same cadence as the heartbeat TTL expects (spec.md
//! §4.5, §4.6).
//!
//! Configuration comes from environment variables rather than flags — a CLI
//! surface is out of scope for this binary. Proxy, browser, telemetry, and
//! REPL tools report themselves unconfigured; an embedder that wants those
//! wired up builds `brummer-instance` as a library with its own
//! `ExternalCollaborators` impl instead of running this binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use brummer_core::Config;
use brummer_discovery::{default_instances_dir, Registration};
use brummer_eventbus::{EventBus, EventBusConfig};
use brummer_instance::collaborators::NullCollaborators;
use brummer_instance::{heartbeat, notify, transport, InstanceContext};
use brummer_logstore::LogStore;
use brummer_supervisor::Supervisor;

fn env_config() -> Config {
    let working_dir = std::env::var("BRUMMER_WORKING_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    Config {
        working_dir,
        bind_host: std::env::var("BRUMMER_BIND_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        port: std::env::var("BRUMMER_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(0),
        log_ring_capacity: 10_000,
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
        error_patterns_path: std::env::var("BRUMMER_ERROR_PATTERNS_PATH").ok().map(PathBuf::from),
    }
}

fn display_name(config: &Config) -> String {
    std::env::var("BRUMMER_DISPLAY_NAME").unwrap_or_else(|_| {
        config
            .working_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "brummer".to_string())
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = env_config();
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }
    let name = display_name(&config);

    let (event_bus, _bus_handle) = EventBus::new(EventBusConfig::default());
    let (log_store, _log_handle) = LogStore::new(config.clone(), event_bus.clone());
    let supervisor = Supervisor::new(event_bus.clone(), log_store.clone());

    let ctx = InstanceContext::new(config.clone(), name, supervisor, log_store, event_bus, Arc::new(NullCollaborators));
    notify::install(ctx.clone());

    if std::env::var("BRUMMER_TRANSPORT").as_deref() == Ok("stdio") {
        // A parent process embedding this instance directly over stdio
        // manages its own discovery; skip HTTP bind and registration.
        tokio::spawn(heartbeat::run(ctx.clone()));
        transport::stdio::run(ctx.clone()).await;
        ctx.log_store.flush_parser();
        return;
    }

    let listener = match tokio::net::TcpListener::bind((config.bind_host.as_str(), config.port)).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, bind_host = %config.bind_host, port = config.port, "failed to bind HTTP+SSE listener");
            std::process::exit(1);
        }
    };
    let bound_addr: SocketAddr = match listener.local_addr() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(error = %e, "failed to read bound address");
            std::process::exit(1);
        }
    };

    let descriptor = ctx.descriptor(bound_addr, std::process::id());
    let registration = match Registration::register(&default_instances_dir(), &descriptor) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "failed to register with discovery");
            std::process::exit(1);
        }
    };

    tracing::info!(instance_id = %ctx.instance_id, addr = %bound_addr, "brummerd listening");

    tokio::spawn(heartbeat::run(ctx.clone()));
    tokio::spawn(refresh_registration(descriptor, registration, config.heartbeat_interval()));

    let app = transport::http::router(ctx.clone());
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        tracing::error!(error = %e, "HTTP server exited with error");
    }
    ctx.log_store.flush_parser();
}

/// Rewrite the instance's registry file with a fresh heartbeat on every
/// tick, for as long as the process lives. Stale entries past
/// `heartbeat_ttl_secs` are Discovery's signal that this instance is gone.
async fn refresh_registration(
    mut descriptor: brummer_core::InstanceDescriptor,
    mut registration: Registration,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        descriptor.heartbeat(SystemTime::now());
        if let Err(e) = registration.refresh(&descriptor) {
            tracing::warn!(error = %e, "failed to refresh discovery registration");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
