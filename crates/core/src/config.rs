// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration shared across the supervisor, log store, error
//! parser, and instance server.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_log_ring_capacity() -> usize {
    10_000
}

fn default_max_line_bytes() -> usize {
    16 * 1024
}

fn default_session_idle_timeout_secs() -> u64 {
    300
}

fn default_cluster_gap_ms() -> u64 {
    200
}

fn default_cluster_max_lines() -> usize {
    50
}

fn default_cluster_max_duration_ms() -> u64 {
    5_000
}

fn default_cluster_min_lines() -> usize {
    2
}

fn default_pattern_max_lines() -> usize {
    200
}

fn default_max_error_contexts() -> usize {
    1_000
}

fn default_heartbeat_interval_secs() -> u64 {
    5
}

fn default_heartbeat_ttl_secs() -> u64 {
    10
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

/// Top-level configuration, typically loaded from a TOML file plus
/// environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory the instance runs in; also the root package-manager
    /// detection walks from when a script doesn't specify its own `cwd`.
    pub working_dir: PathBuf,

    /// Host the Instance Server's HTTP+SSE transport binds to.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Port the Instance Server binds to; `0` means "pick any free port",
    /// recorded into the instance descriptor once bound.
    #[serde(default)]
    pub port: u16,

    #[serde(default = "default_log_ring_capacity")]
    pub log_ring_capacity: usize,

    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,

    #[serde(default = "default_cluster_gap_ms")]
    pub error_cluster_gap_ms: u64,

    /// Time-based clustering closes a cluster once it holds this many lines,
    /// even if the gap to the next line is still within `error_cluster_gap_ms`.
    #[serde(default = "default_cluster_max_lines")]
    pub error_cluster_max_lines: usize,

    /// Time-based clustering closes a cluster once its span from first to
    /// last line exceeds this duration.
    #[serde(default = "default_cluster_max_duration_ms")]
    pub error_cluster_max_duration_ms: u64,

    /// A finalized time-based cluster below this size is dropped rather
    /// than promoted to an `ErrorContext` (single stray error-level lines
    /// are noise, not a cluster).
    #[serde(default = "default_cluster_min_lines")]
    pub error_cluster_min_lines: usize,

    /// The pattern-driven state machine finalizes an open context once its
    /// line count (header + stack + context) reaches this cap, regardless
    /// of whether an `end` pattern has fired.
    #[serde(default = "default_pattern_max_lines")]
    pub error_pattern_max_lines: usize,

    #[serde(default = "default_max_error_contexts")]
    pub max_error_contexts: usize,

    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_heartbeat_ttl_secs")]
    pub heartbeat_ttl_secs: u64,

    /// Path to a TOML file overriding the embedded default error-pattern
    /// table. `None` uses the embedded defaults only.
    #[serde(default)]
    pub error_patterns_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("working_dir {0} does not exist")]
    WorkingDirMissing(PathBuf),
    #[error("log_ring_capacity must be at least 1")]
    RingCapacityZero,
    #[error("max_line_bytes must be at least 1")]
    MaxLineBytesZero,
    #[error("heartbeat_ttl_secs ({ttl}) must be greater than heartbeat_interval_secs ({interval})")]
    HeartbeatTtlTooLow { ttl: u64, interval: u64 },
    #[error("ping_failure_threshold must be at least 1")]
    PingThresholdZero,
    #[error("max_retries must be at least 1")]
    MaxRetriesZero,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.working_dir.exists() {
            return Err(ConfigError::WorkingDirMissing(self.working_dir.clone()));
        }
        if self.log_ring_capacity == 0 {
            return Err(ConfigError::RingCapacityZero);
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::MaxLineBytesZero);
        }
        if self.heartbeat_ttl_secs <= self.heartbeat_interval_secs {
            return Err(ConfigError::HeartbeatTtlTooLow {
                ttl: self.heartbeat_ttl_secs,
                interval: self.heartbeat_interval_secs,
            });
        }
        Ok(())
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn error_cluster_gap(&self) -> Duration {
        Duration::from_millis(self.error_cluster_gap_ms)
    }

    pub fn error_cluster_max_duration(&self) -> Duration {
        Duration::from_millis(self.error_cluster_max_duration_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs)
    }
}

fn default_health_ping_interval_secs() -> u64 {
    10
}

fn default_ping_failure_threshold() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_backoff_cap_secs() -> u64 {
    30
}

fn default_discovery_scan_interval_secs() -> u64 {
    5
}

fn default_discovery_staleness_secs() -> u64 {
    15
}

/// Configuration for the Hub's Connection Manager and Discovery polling
/// (spec.md §4.6, §4.7). Kept separate from [`Config`] since it governs a
/// process (the Hub) that never runs an Instance Server of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// How often a health `ping` is sent to each `Active` peer.
    #[serde(default = "default_health_ping_interval_secs")]
    pub health_ping_interval_secs: u64,

    /// Consecutive ping failures before an `Active` peer moves to `Retrying`.
    #[serde(default = "default_ping_failure_threshold")]
    pub ping_failure_threshold: u32,

    /// Reconnect attempts from `Retrying` before a peer is declared `Dead`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seed delay for the exponential reconnect backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound the backoff delay is capped at.
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,

    /// Upper bound on the Discovery watcher's periodic rescan interval.
    #[serde(default = "default_discovery_scan_interval_secs")]
    pub discovery_scan_interval_secs: u64,

    /// Age past which a discovery heartbeat is considered stale.
    #[serde(default = "default_discovery_staleness_secs")]
    pub discovery_staleness_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            health_ping_interval_secs: default_health_ping_interval_secs(),
            ping_failure_threshold: default_ping_failure_threshold(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_secs: default_backoff_cap_secs(),
            discovery_scan_interval_secs: default_discovery_scan_interval_secs(),
            discovery_staleness_secs: default_discovery_staleness_secs(),
        }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_failure_threshold == 0 {
            return Err(ConfigError::PingThresholdZero);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::MaxRetriesZero);
        }
        Ok(())
    }

    pub fn health_ping_interval(&self) -> Duration {
        Duration::from_secs(self.health_ping_interval_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }

    pub fn discovery_scan_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_scan_interval_secs)
    }

    pub fn discovery_staleness(&self) -> Duration {
        Duration::from_secs(self.discovery_staleness_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            working_dir: std::env::temp_dir(),
            bind_host: default_bind_host(),
            port: 0,
            log_ring_capacity: default_log_ring_capacity(),
            max_line_bytes: default_max_line_bytes(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
            error_cluster_gap_ms: default_cluster_gap_ms(),
            error_cluster_max_lines: default_cluster_max_lines(),
            error_cluster_max_duration_ms: default_cluster_max_duration_ms(),
            error_cluster_min_lines: default_cluster_min_lines(),
            error_pattern_max_lines: default_pattern_max_lines(),
            max_error_contexts: default_max_error_contexts(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_ttl_secs: default_heartbeat_ttl_secs(),
            error_patterns_path: None,
        }
    }

    #[test]
    fn defaults_validate() {
        base().validate().unwrap();
    }

    #[test]
    fn rejects_missing_working_dir() {
        let mut c = base();
        c.working_dir = PathBuf::from("/definitely/not/a/real/path/xyz");
        assert!(matches!(c.validate(), Err(ConfigError::WorkingDirMissing(_))));
    }

    #[test]
    fn rejects_ttl_not_exceeding_interval() {
        let mut c = base();
        c.heartbeat_interval_secs = 10;
        c.heartbeat_ttl_secs = 10;
        assert!(matches!(c.validate(), Err(ConfigError::HeartbeatTtlTooLow { .. })));
    }

    #[test]
    fn rejects_zero_ring_capacity() {
        let mut c = base();
        c.log_ring_capacity = 0;
        assert!(matches!(c.validate(), Err(ConfigError::RingCapacityZero)));
    }

    #[test]
    fn hub_config_defaults_validate() {
        HubConfig::default().validate().unwrap();
    }

    #[test]
    fn hub_config_rejects_zero_max_retries() {
        let mut c = HubConfig::default();
        c.max_retries = 0;
        assert!(matches!(c.validate(), Err(ConfigError::MaxRetriesZero)));
    }
}
