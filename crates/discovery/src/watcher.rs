// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery watcher: combines OS filesystem notifications with a periodic
//! scan to emit `added`/`changed`/`removed` events, and reaps stale instance
//! files (spec.md §4.6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, SystemTime};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::lock;
use crate::registry::{self, InstanceFile};

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(InstanceFile),
    Changed(InstanceFile),
    Removed { id: String },
}

/// Tunables for [`DiscoveryWatcher`].
#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    /// Upper bound on the periodic scan interval (spec.md: "<= 5s").
    pub scan_interval: Duration,
    /// A descriptor is stale once its heartbeat is this old (spec.md: "3x refresh").
    pub staleness: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { scan_interval: Duration::from_secs(5), staleness: Duration::from_secs(15) }
    }
}

/// Watches the instance registry directory. `poll` never blocks: it drains
/// whatever filesystem-notify events arrived plus, at most once per
/// `scan_interval`, a full directory rescan, diffs against the last known
/// set, and returns the resulting events.
pub struct DiscoveryWatcher {
    instances_dir: PathBuf,
    config: WatcherConfig,
    known: HashMap<String, InstanceFile>,
    last_scan: SystemTime,
    fs_rx: Option<std_mpsc::Receiver<notify::Result<notify::Event>>>,
    _fs_watcher: Option<RecommendedWatcher>,
}

impl DiscoveryWatcher {
    pub fn new(instances_dir: PathBuf, config: WatcherConfig) -> Self {
        let (tx, fs_rx) = std_mpsc::channel();
        let fs_watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .ok();

        let mut fs_watcher = fs_watcher;
        if let Some(watcher) = fs_watcher.as_mut() {
            if instances_dir.exists() {
                let _ = watcher.watch(&instances_dir, RecursiveMode::NonRecursive);
            }
        }

        Self {
            instances_dir,
            config,
            known: HashMap::new(),
            last_scan: SystemTime::UNIX_EPOCH,
            fs_rx: Some(fs_rx),
            _fs_watcher: fs_watcher,
        }
    }

    /// Drain pending filesystem notifications, and if `scan_interval` has
    /// elapsed since the last full scan, rescan and reconcile. Never blocks
    /// the caller; transient I/O errors are logged and simply retried on
    /// the next call (spec.md: "the watcher never blocks callers").
    pub fn poll(&mut self, now: SystemTime) -> Vec<WatchEvent> {
        let mut fs_touched = false;
        if let Some(rx) = &self.fs_rx {
            while let Ok(res) = rx.try_recv() {
                if res.is_ok() {
                    fs_touched = true;
                }
            }
        }

        let due = now.duration_since(self.last_scan).unwrap_or(Duration::MAX) >= self.config.scan_interval;
        if !fs_touched && !due {
            return Vec::new();
        }
        self.last_scan = now;
        self.reconcile(now)
    }

    fn reconcile(&mut self, now: SystemTime) -> Vec<WatchEvent> {
        let current = registry::scan(&self.instances_dir);
        let mut current_by_id: HashMap<String, InstanceFile> =
            current.into_iter().map(|f| (f.id.clone(), f)).collect();

        let mut events = Vec::new();

        for (id, file) in current_by_id.iter() {
            match self.known.get(id) {
                None => events.push(WatchEvent::Added(file.clone())),
                Some(prev) if prev != file => events.push(WatchEvent::Changed(file.clone())),
                Some(_) => {}
            }
        }

        let removed_ids: Vec<String> =
            self.known.keys().filter(|id| !current_by_id.contains_key(*id)).cloned().collect();
        for id in &removed_ids {
            events.push(WatchEvent::Removed { id: id.clone() });
        }

        let stale_ids: Vec<String> = current_by_id
            .iter()
            .filter(|(_, file)| is_reapable(&self.instances_dir, file, now, self.config.staleness))
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale_ids {
            let path = self.instances_dir.join(format!("{id}.json"));
            if std::fs::remove_file(&path).is_ok() {
                current_by_id.remove(&id);
                events.push(WatchEvent::Removed { id });
            }
        }

        self.known = current_by_id;
        events
    }
}

/// A descriptor is reapable when its lock is unheld AND (its pid is dead OR
/// its heartbeat is stale) — spec.md §4.6.
fn is_reapable(instances_dir: &Path, file: &InstanceFile, now: SystemTime, staleness: Duration) -> bool {
    let path = registry::instance_path(instances_dir, brummer_core::InstanceId::from_string(&file.id));
    let Ok(probe) = std::fs::OpenOptions::new().read(true).open(&path) else {
        return true;
    };
    if lock::probe_lock_status(&probe) == lock::LockStatus::Held {
        return false;
    }
    !is_pid_alive(file.pid) || file.is_heartbeat_stale(now, staleness)
}

#[cfg(unix)]
fn is_pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // EPERM means the process exists but we can't signal it — still alive.
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn is_pid_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registration;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn descriptor(name: &str, pid: u32) -> brummer_core::InstanceDescriptor {
        brummer_core::InstanceDescriptor::new(
            brummer_core::InstanceId::new(),
            name,
            std::env::temp_dir(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7777),
            pid,
            SystemTime::now(),
        )
    }

    #[test]
    fn poll_reports_added_then_removed() {
        let dir = tempfile::tempdir().unwrap();
        let instances_dir = dir.path().join("instances");
        let mut watcher =
            DiscoveryWatcher::new(instances_dir.clone(), WatcherConfig { scan_interval: Duration::ZERO, ..Default::default() });

        let d = descriptor("dev", std::process::id());
        let reg = Registration::register(&instances_dir, &d).unwrap();

        let events = watcher.poll(SystemTime::now());
        assert!(events.iter().any(|e| matches!(e, WatchEvent::Added(f) if f.id == d.id.to_string())));

        reg.deregister().unwrap();
        let events = watcher.poll(SystemTime::now());
        assert!(events.iter().any(|e| matches!(e, WatchEvent::Removed { id } if *id == d.id.to_string())));
    }

    #[test]
    fn stale_descriptor_with_dead_pid_is_reaped() {
        let dir = tempfile::tempdir().unwrap();
        let instances_dir = dir.path().join("instances");
        // An unused, almost-certainly-dead pid. Write the file directly
        // (bypassing `Registration`, which would remove it on drop) to
        // simulate a process that crashed without releasing anything.
        std::fs::create_dir_all(&instances_dir).unwrap();
        let d = descriptor("dev", 999_999);
        let body = serde_json::to_vec_pretty(&InstanceFile::from_descriptor(&d)).unwrap();
        std::fs::write(registry::instance_path(&instances_dir, d.id), body).unwrap();

        let files = registry::scan(&instances_dir);
        assert_eq!(files.len(), 1);
        assert!(is_reapable(&instances_dir, &files[0], SystemTime::now(), Duration::from_secs(15)));
    }
}
