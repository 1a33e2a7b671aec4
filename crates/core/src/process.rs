// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process record: identity, state, and immutable spawn configuration for a
//! single supervised child command.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Opaque, stable identity for a supervised process.
    pub struct ProcessId("proc-");
}

/// Which package manager's argv convention a [`ProcessSpec`] should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
    Generic,
}

crate::simple_display! {
    PackageManager {
        Npm => "npm",
        Yarn => "yarn",
        Pnpm => "pnpm",
        Bun => "bun",
        Generic => "generic",
    }
}

impl PackageManager {
    /// Detect the package manager from lockfiles present in `dir`.
    ///
    /// Pure function of the filesystem: presence of lockfile/config files only,
    /// no process execution. Precedence when multiple lockfiles coexist
    /// (package-lock.json takes priority, since npm is the most common default
    /// and `npm install` always writes one even in mixed repos) is a decision
    /// recorded in DESIGN.md.
    pub fn detect(dir: &std::path::Path) -> Self {
        if dir.join("bun.lockb").exists() || dir.join("bun.lock").exists() {
            PackageManager::Bun
        } else if dir.join("pnpm-lock.yaml").exists() {
            PackageManager::Pnpm
        } else if dir.join("yarn.lock").exists() {
            PackageManager::Yarn
        } else if dir.join("package-lock.json").exists() {
            PackageManager::Npm
        } else if dir.join("package.json").exists() {
            PackageManager::Npm
        } else {
            PackageManager::Generic
        }
    }

    /// Build the argv prefix that runs `script` via this package manager.
    pub fn run_argv(self, script: &str, extra_args: &[String]) -> Vec<String> {
        let mut argv = match self {
            PackageManager::Npm => vec!["npm".to_string(), "run".to_string(), script.to_string()],
            PackageManager::Yarn => vec!["yarn".to_string(), "run".to_string(), script.to_string()],
            PackageManager::Pnpm => vec!["pnpm".to_string(), "run".to_string(), script.to_string()],
            PackageManager::Bun => vec!["bun".to_string(), "run".to_string(), script.to_string()],
            PackageManager::Generic => vec![script.to_string()],
        };
        if !extra_args.is_empty() {
            if matches!(self, PackageManager::Generic) {
                argv.extend(extra_args.iter().cloned());
            } else {
                argv.push("--".to_string());
                argv.extend(extra_args.iter().cloned());
            }
        }
        argv
    }
}

/// Immutable configuration a process was spawned with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub name: String,
    /// The raw script/command string (before package-manager argv construction).
    pub command: String,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub package_manager: PackageManager,
    /// Extra argv appended after the package-manager's own `run <script>`
    /// prefix (or, for `Generic`, after the raw command).
    #[serde(default)]
    pub args: Vec<String>,
    /// Maximum bytes of a single output line before it is split with
    /// continuation markers.
    pub max_line_bytes: usize,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>, cwd: PathBuf) -> Self {
        let package_manager = PackageManager::detect(&cwd);
        Self {
            name: name.into(),
            command: command.into(),
            cwd,
            env: HashMap::new(),
            package_manager,
            args: Vec::new(),
            max_line_bytes: 16 * 1024,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Lifecycle state of a supervised process.
///
/// Transitions form the DAG `Pending -> Running -> {Succeeded, Failed, Stopped}`.
/// Once terminal, no further transitions are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Stopped,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Succeeded | ProcessState::Failed | ProcessState::Stopped)
    }

    /// Whether `self -> next` is an allowed transition in the process DAG.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed) // spawn failure short-circuits straight to Failed
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Stopped)
        )
    }
}

crate::simple_display! {
    ProcessState {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Stopped => "stopped",
    }
}

/// How a terminated process stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Termination {
    /// Natural exit with the given exit code.
    Exited(i32),
    /// Killed by a signal (Unix signal number).
    Signaled(i32),
    /// The supervisor could not spawn the process at all.
    SpawnFailed(String),
}

/// A single supervised process's identity, state, and attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: ProcessId,
    pub spec: ProcessSpec,
    pub state: ProcessState,
    pub pid: Option<u32>,
    #[serde(with = "system_time_epoch_ms")]
    pub started_at: SystemTime,
    #[serde(with = "option_system_time_epoch_ms")]
    pub ended_at: Option<SystemTime>,
    pub termination: Option<Termination>,
}

impl ProcessRecord {
    pub fn new(id: ProcessId, spec: ProcessSpec, started_at: SystemTime) -> Self {
        Self { id, spec, state: ProcessState::Pending, pid: None, started_at, ended_at: None, termination: None }
    }

    /// Apply a state transition, returning `false` (no-op) if it violates the DAG.
    #[must_use]
    pub fn transition(&mut self, next: ProcessState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }
}

mod system_time_epoch_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let ms = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
        ms.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(UNIX_EPOCH + Duration::from_millis(ms))
    }
}

mod option_system_time_epoch_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(t: &Option<SystemTime>, s: S) -> Result<S::Ok, S::Error> {
        let ms = t.map(|t| t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64);
        ms.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SystemTime>, D::Error> {
        let ms = Option::<u64>::deserialize(d)?;
        Ok(ms.map(|ms| UNIX_EPOCH + Duration::from_millis(ms)))
    }
}
