// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource descriptors and snapshot reads (spec.md §4.5: "each resource is
//! read as a snapshot"). Resources backed by an external collaborator
//! (telemetry, proxy) return an empty snapshot plus an explanatory note
//! rather than an error, since listing them is still meaningful even when
//! no collaborator is wired.

use brummer_wire::ResourceDescriptor;

use crate::context::InstanceContext;

pub const LOGS_RECENT: &str = "logs://recent";
pub const LOGS_ERRORS: &str = "logs://errors";
pub const PROCESSES_ACTIVE: &str = "processes://active";
pub const TELEMETRY_SESSIONS: &str = "telemetry://sessions";
pub const TELEMETRY_ERRORS: &str = "telemetry://errors";
pub const TELEMETRY_CONSOLE_ERRORS: &str = "telemetry://console-errors";
pub const PROXY_REQUESTS: &str = "proxy://requests";
pub const PROXY_MAPPINGS: &str = "proxy://mappings";
pub const SCRIPTS_AVAILABLE: &str = "scripts://available";

const RECENT_LOG_LIMIT: usize = 200;

pub fn descriptors() -> Vec<ResourceDescriptor> {
    [
        (LOGS_RECENT, "Recent log lines across all supervised processes"),
        (LOGS_ERRORS, "Log lines classified at error severity or above"),
        (PROCESSES_ACTIVE, "Currently supervised processes and their state"),
        (TELEMETRY_SESSIONS, "Browser telemetry sessions (external collaborator)"),
        (TELEMETRY_ERRORS, "Browser-reported errors (external collaborator)"),
        (TELEMETRY_CONSOLE_ERRORS, "Browser console errors (external collaborator)"),
        (PROXY_REQUESTS, "Recent proxied HTTP requests (external collaborator)"),
        (PROXY_MAPPINGS, "Active proxy URL mappings (external collaborator)"),
        (SCRIPTS_AVAILABLE, "Package-manager scripts discoverable in the working directory"),
    ]
    .into_iter()
    .map(|(uri, description)| ResourceDescriptor {
        uri: uri.to_string(),
        name: uri.to_string(),
        description: Some(description.to_string()),
        mime_type: Some("application/json".to_string()),
    })
    .collect()
}

/// Read one resource's current snapshot. `None` means the uri is unknown.
pub fn read(ctx: &InstanceContext, uri: &str) -> Option<serde_json::Value> {
    match uri {
        LOGS_RECENT => {
            let mut entries = ctx.log_store.get_all();
            if entries.len() > RECENT_LOG_LIMIT {
                entries = entries.split_off(entries.len() - RECENT_LOG_LIMIT);
            }
            Some(serde_json::json!({ "entries": entries }))
        }
        LOGS_ERRORS => Some(serde_json::json!({ "entries": ctx.log_store.get_errors() })),
        PROCESSES_ACTIVE => Some(serde_json::json!({ "processes": ctx.supervisor.list() })),
        SCRIPTS_AVAILABLE => Some(serde_json::json!({ "scripts": available_scripts(ctx) })),
        TELEMETRY_SESSIONS | TELEMETRY_ERRORS | TELEMETRY_CONSOLE_ERRORS | PROXY_REQUESTS | PROXY_MAPPINGS => {
            Some(serde_json::json!({ "entries": [], "note": "external collaborator not wired" }))
        }
        _ => None,
    }
}

/// List script names from `package.json`'s `scripts` table in the working
/// directory, if present. Best-effort: a missing or malformed manifest
/// yields an empty list rather than an error, matching how `resources/read`
/// always returns a snapshot.
pub(crate) fn available_scripts(ctx: &InstanceContext) -> Vec<String> {
    let manifest_path = ctx.config.working_dir.join("package.json");
    let Ok(raw) = std::fs::read_to_string(manifest_path) else {
        return Vec::new();
    };
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&raw) else {
        return Vec::new();
    };
    parsed
        .get("scripts")
        .and_then(|s| s.as_object())
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_cover_every_named_resource() {
        let uris: Vec<_> = descriptors().into_iter().map(|d| d.uri).collect();
        for expected in [
            LOGS_RECENT,
            LOGS_ERRORS,
            PROCESSES_ACTIVE,
            TELEMETRY_SESSIONS,
            TELEMETRY_ERRORS,
            TELEMETRY_CONSOLE_ERRORS,
            PROXY_REQUESTS,
            PROXY_MAPPINGS,
            SCRIPTS_AVAILABLE,
        ] {
            assert!(uris.contains(&expected.to_string()), "missing resource descriptor for {expected}");
        }
    }

    #[test]
    fn available_scripts_reads_package_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"scripts": {"dev": "vite", "build": "vite build"}}"#).unwrap();
        let config = brummer_core::Config {
            working_dir: dir.path().to_path_buf(),
            bind_host: "127.0.0.1".into(),
            port: 0,
            log_ring_capacity: 100,
            max_line_bytes: 1024,
            session_idle_timeout_secs: 300,
            error_cluster_gap_ms: 200,
            error_cluster_max_lines: 50,
            error_cluster_max_duration_ms: 5000,
            error_cluster_min_lines: 2,
            error_pattern_max_lines: 200,
            max_error_contexts: 100,
            heartbeat_interval_secs: 5,
            heartbeat_ttl_secs: 10,
            error_patterns_path: None,
        };
        let (bus, _handle) = brummer_eventbus::EventBus::new(brummer_eventbus::EventBusConfig { queue_capacity: 8, worker_count: 1 });
        let (log_store, _log_handle) = brummer_logstore::LogStore::new(config.clone(), bus.clone());
        let supervisor = brummer_supervisor::Supervisor::new(bus.clone(), log_store.clone());
        let ctx = InstanceContext::new(config, "dev", supervisor, log_store, bus, std::sync::Arc::new(crate::collaborators::NullCollaborators));

        let mut scripts = available_scripts(&ctx);
        scripts.sort();
        assert_eq!(scripts, vec!["build".to_string(), "dev".to_string()]);
    }
}
