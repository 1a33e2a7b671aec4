// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs the Hub Server in the foreground: a single stdio JSON-RPC endpoint
//! federating every Instance Server discovered on the shared filesystem
//! registry (spec.md §4.6, §4.8).
//!
//! Configuration comes from environment variables rather than flags — a
//! CLI surface is out of scope for this binary, same as `brummerd`.

use brummer_core::HubConfig;
use brummer_discovery::default_instances_dir;
use brummer_hub::context::HubContext;
use brummer_hub::transport;

fn env_config() -> HubConfig {
    let mut config = HubConfig::default();
    if let Ok(v) = std::env::var("BRUMMER_HUB_PING_INTERVAL_SECS") {
        if let Ok(v) = v.parse() {
            config.health_ping_interval_secs = v;
        }
    }
    if let Ok(v) = std::env::var("BRUMMER_HUB_PING_FAILURE_THRESHOLD") {
        if let Ok(v) = v.parse() {
            config.ping_failure_threshold = v;
        }
    }
    if let Ok(v) = std::env::var("BRUMMER_HUB_MAX_RETRIES") {
        if let Ok(v) = v.parse() {
            config.max_retries = v;
        }
    }
    config
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = env_config();
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid hub configuration");
        std::process::exit(1);
    }

    let (ctx, notify_rx) = HubContext::new(config);
    tokio::spawn(ctx.connections.clone().run(default_instances_dir()));

    tracing::info!("brummer-hub listening on stdio");
    transport::run(ctx, notify_rx).await;
}
