// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem instance registry: one JSON file per running instance under
//! `<base>/instances/<instance-id>.json`, written atomically and held under
//! an advisory exclusive lock for the owning process's lifetime (spec.md §4.6, §6).

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use brummer_core::InstanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lock;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery directory {0} is unwritable")]
    DirUnwritable(PathBuf, #[source] std::io::Error),
    #[error("instance file {0} is held by another process")]
    AlreadyLocked(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("instance file {path} could not be parsed: {source}")]
    Parse { path: PathBuf, #[source] source: serde_json::Error },
}

/// The on-disk shape of one instance's registry file (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceFile {
    pub id: String,
    pub name: String,
    pub directory: PathBuf,
    pub port: u16,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub last_ping: DateTime<Utc>,
}

impl InstanceFile {
    pub fn from_descriptor(d: &brummer_core::InstanceDescriptor) -> Self {
        Self {
            id: d.id.to_string(),
            name: d.display_name.clone(),
            directory: d.working_dir.clone(),
            port: d.addr.port(),
            pid: d.pid,
            started_at: d.started_at.into(),
            last_ping: d.last_heartbeat.into(),
        }
    }

    fn last_ping_systemtime(&self) -> SystemTime {
        self.last_ping.into()
    }

    /// Whether this descriptor's heartbeat is older than `ttl` relative to `now`.
    pub fn is_heartbeat_stale(&self, now: SystemTime, ttl: std::time::Duration) -> bool {
        now.duration_since(self.last_ping_systemtime()).unwrap_or_default() >= ttl
    }
}

/// Resolve the per-user discovery base directory: XDG data dir on Unix,
/// `%APPDATA%` on Windows (spec.md §6), with an `instances/` subdirectory.
pub fn default_instances_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    base.join("brummer").join("instances")
}

pub fn instance_path(instances_dir: &Path, id: InstanceId) -> PathBuf {
    instances_dir.join(format!("{id}.json"))
}

/// A running instance's registration: owns the lock file for as long as it
/// lives. Dropping it without calling [`Registration::deregister`] leaves
/// the file behind for the next scan cycle to reap once the pid is gone —
/// a best-effort synchronous removal is still attempted from `Drop`.
pub struct Registration {
    path: PathBuf,
    file: Option<File>,
}

impl Registration {
    /// Atomically create (temp file + rename) and lock this instance's
    /// registry file.
    pub fn register(
        instances_dir: &Path,
        descriptor: &brummer_core::InstanceDescriptor,
    ) -> Result<Self, DiscoveryError> {
        std::fs::create_dir_all(instances_dir)
            .map_err(|e| DiscoveryError::DirUnwritable(instances_dir.to_path_buf(), e))?;

        let path = instance_path(instances_dir, descriptor.id);
        let tmp_path = instances_dir.join(format!(".{}.json.tmp", descriptor.id));

        let body = serde_json::to_vec_pretty(&InstanceFile::from_descriptor(descriptor))
            .expect("InstanceFile always serializes");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&body)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &path)?;

        let file = std::fs::OpenOptions::new().read(true).write(true).open(&path)?;
        if !lock::try_lock_exclusive(&file)? {
            return Err(DiscoveryError::AlreadyLocked(path));
        }

        Ok(Self { path, file: Some(file) })
    }

    /// Refresh `last_ping` in place. Rewrites the whole file (still under
    /// the same lock) rather than just touching mtime, so readers retrying
    /// on parse error always see a consistent heartbeat.
    pub fn refresh(&mut self, descriptor: &brummer_core::InstanceDescriptor) -> Result<(), DiscoveryError> {
        let body = serde_json::to_vec_pretty(&InstanceFile::from_descriptor(descriptor))
            .expect("InstanceFile always serializes");
        let file = self.file.as_mut().expect("registration file present until deregister");
        file.set_len(0)?;
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(0))?;
        file.write_all(&body)?;
        file.sync_all()?;
        Ok(())
    }

    /// Release the lock and remove the registry file — clean shutdown path.
    pub fn deregister(mut self) -> Result<(), DiscoveryError> {
        self.file.take();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// List every instance file currently in the registry directory, tolerating
/// partial writes by skipping files that fail to parse (spec.md §6:
/// "Readers MUST tolerate partial writes by retrying on JSON parse error").
pub fn scan(instances_dir: &Path) -> Vec<InstanceFile> {
    let Ok(read_dir) = std::fs::read_dir(instances_dir) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<InstanceFile>(&bytes) {
                Ok(descriptor) => out.push(descriptor),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unparseable instance file"),
            },
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable instance file"),
        }
    }
    out
}
