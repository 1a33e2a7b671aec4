// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process registry and public control surface: start, stop, restart, and
//! query supervised processes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use brummer_core::{Event, ProcessId, ProcessRecord, ProcessSpec, ProcessState, Termination};
use brummer_eventbus::EventBus;
use brummer_logstore::LogStore;
use parking_lot::Mutex;
use thiserror::Error;

use crate::spawn::{self, SpawnOutcome};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("process {0:?} is not currently running")]
    NotRunning(ProcessId),
    #[error("process {0:?} is not known to this supervisor")]
    NotFound(ProcessId),
    #[error(transparent)]
    Signal(#[from] crate::signal::SignalError),
}

struct Inner {
    event_bus: EventBus,
    log_store: LogStore,
    records: Mutex<HashMap<ProcessId, ProcessRecord>>,
    pids: Mutex<HashMap<ProcessId, u32>>,
}

/// Supervises a set of long-running child commands, capturing their output
/// into the [`LogStore`] (which in turn publishes the canonical `LogLine`
/// event onto the shared [`EventBus`]) and exposing start/stop/restart
/// control.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(event_bus: EventBus, log_store: LogStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                event_bus,
                log_store,
                records: Mutex::new(HashMap::new()),
                pids: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start a process. Returns immediately with an id; spawn failures are
    /// reported asynchronously as a terminal `ProcessExited` event plus a
    /// `Failed` record, never as an `Err` from this call — the caller learns
    /// about spawn failure the same way it learns about any other exit.
    pub fn start(&self, spec: ProcessSpec) -> ProcessId {
        let id = ProcessId::new();
        let record = ProcessRecord::new(id, spec.clone(), SystemTime::now());
        self.inner.records.lock().insert(id, record);

        let inner = self.inner.clone();
        tokio::spawn(async move { run(inner, id, spec).await });
        id
    }

    pub fn get(&self, id: ProcessId) -> Option<ProcessRecord> {
        self.inner.records.lock().get(&id).cloned()
    }

    pub fn list(&self) -> Vec<ProcessRecord> {
        self.inner.records.lock().values().cloned().collect()
    }

    /// Send SIGTERM to the process group, wait up to `grace`, then SIGKILL
    /// if it hasn't exited.
    pub async fn stop(&self, id: ProcessId, grace: Duration) -> Result<(), SupervisorError> {
        let pid = self.inner.pids.lock().get(&id).copied().ok_or(SupervisorError::NotRunning(id))?;
        crate::signal::terminate(pid)?;
        tokio::time::sleep(grace).await;
        let still_running =
            self.inner.records.lock().get(&id).map(|r| !r.state.is_terminal()).unwrap_or(false);
        if still_running {
            crate::signal::kill(pid)?;
        }
        Ok(())
    }

    /// Stop the process (if running) and start a fresh one from the same
    /// spec, returning the new id.
    pub async fn restart(&self, id: ProcessId, grace: Duration) -> Result<ProcessId, SupervisorError> {
        let record = self.inner.records.lock().get(&id).cloned().ok_or(SupervisorError::NotFound(id))?;
        if !record.state.is_terminal() {
            self.stop(id, grace).await?;
        }
        Ok(self.start(record.spec))
    }
}

async fn run(inner: Arc<Inner>, id: ProcessId, spec: ProcessSpec) {
    if !spawn::cwd_exists(&spec.cwd) {
        fail(&inner, id, &spec, format!("working directory does not exist: {}", spec.cwd.display()));
        return;
    }

    match spawn::spawn(&spec) {
        SpawnOutcome::Failed(message) => fail(&inner, id, &spec, message),
        SpawnOutcome::Spawned { pid, mut child } => {
            inner.pids.lock().insert(id, pid);
            transition(&inner, id, ProcessState::Running);
            {
                let mut records = inner.records.lock();
                if let Some(r) = records.get_mut(&id) {
                    r.pid = Some(pid);
                }
            }
            inner.event_bus.publish(Event::ProcessStarted {
                process_id: id,
                process_name: spec.name.clone(),
                pid,
                cwd: spec.cwd.clone(),
            });

            let stdout = child.stdout.take();
            let stderr = child.stderr.take();
            let mut drains = Vec::new();
            if let Some(stdout) = stdout {
                drains.push(tokio::spawn(spawn::drain_stream(
                    stdout,
                    inner.log_store.clone(),
                    id,
                    spec.name.clone(),
                    spec.max_line_bytes,
                    false,
                )));
            }
            if let Some(stderr) = stderr {
                drains.push(tokio::spawn(spawn::drain_stream(
                    stderr,
                    inner.log_store.clone(),
                    id,
                    spec.name.clone(),
                    spec.max_line_bytes,
                    true,
                )));
            }

            let start = SystemTime::now();
            let wait_result = child.wait().await;
            for drain in drains {
                let _ = drain.await;
            }
            // Force-finalize any error cluster still open for this process
            // now that its streams are drained and it won't emit another
            // line (spec.md §4.4: finalize "on process exit").
            inner.log_store.flush_process(id);
            let duration_ms = SystemTime::now().duration_since(start).unwrap_or_default().as_millis() as u64;

            let (state, termination) = match wait_result {
                Ok(status) => {
                    #[cfg(unix)]
                    let signal = std::os::unix::process::ExitStatusExt::signal(&status);
                    #[cfg(not(unix))]
                    let signal: Option<i32> = None;
                    if let Some(sig) = signal {
                        (ProcessState::Stopped, Termination::Signaled(sig))
                    } else {
                        let code = status.code().unwrap_or(-1);
                        if code == 0 {
                            (ProcessState::Succeeded, Termination::Exited(code))
                        } else {
                            (ProcessState::Failed, Termination::Exited(code))
                        }
                    }
                }
                Err(e) => (ProcessState::Failed, Termination::SpawnFailed(e.to_string())),
            };

            transition(&inner, id, state);
            {
                let mut records = inner.records.lock();
                if let Some(r) = records.get_mut(&id) {
                    r.ended_at = Some(SystemTime::now());
                    r.termination = Some(clone_termination(&termination));
                }
            }
            inner.pids.lock().remove(&id);
            inner.event_bus.publish(Event::ProcessExited {
                process_id: id,
                process_name: spec.name.clone(),
                termination,
                duration_ms,
            });
        }
    }
}

fn fail(inner: &Arc<Inner>, id: ProcessId, spec: &ProcessSpec, message: String) {
    transition(inner, id, ProcessState::Failed);
    {
        let mut records = inner.records.lock();
        if let Some(r) = records.get_mut(&id) {
            r.ended_at = Some(SystemTime::now());
            r.termination = Some(Termination::SpawnFailed(message.clone()));
        }
    }
    inner.event_bus.publish(Event::ProcessExited {
        process_id: id,
        process_name: spec.name.clone(),
        termination: Termination::SpawnFailed(message),
        duration_ms: 0,
    });
}

fn transition(inner: &Arc<Inner>, id: ProcessId, next: ProcessState) {
    let mut records = inner.records.lock();
    if let Some(r) = records.get_mut(&id) {
        let _ = r.transition(next);
    }
}

fn clone_termination(t: &Termination) -> Termination {
    match t {
        Termination::Exited(c) => Termination::Exited(*c),
        Termination::Signaled(s) => Termination::Signaled(*s),
        Termination::SpawnFailed(m) => Termination::SpawnFailed(m.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brummer_eventbus::EventBusConfig;
    use std::collections::HashMap as StdHashMap;

    fn spec(command: &str, cwd: std::path::PathBuf) -> ProcessSpec {
        ProcessSpec {
            name: "test".into(),
            command: command.into(),
            cwd,
            env: StdHashMap::new(),
            package_manager: brummer_core::PackageManager::Generic,
            args: Vec::new(),
            max_line_bytes: 1024,
        }
    }

    fn test_config() -> brummer_core::Config {
        brummer_core::Config {
            working_dir: std::env::temp_dir(),
            bind_host: "127.0.0.1".into(),
            port: 0,
            log_ring_capacity: 1000,
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
        }
    }

    #[tokio::test]
    async fn start_runs_a_simple_command_to_completion() {
        let (bus, handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (log_store, log_handle) = LogStore::new(test_config(), bus.clone());
        let sup = Supervisor::new(bus, log_store);
        let id = sup.start(spec("echo hi", std::env::temp_dir()));

        for _ in 0..50 {
            if sup.get(id).map(|r| r.state.is_terminal()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let record = sup.get(id).unwrap();
        assert_eq!(record.state, ProcessState::Succeeded);
        handle.shutdown(Duration::from_secs(1)).await;
        log_handle.shutdown().await;
    }

    /// Real stdout from a supervised process must land in the Log Store,
    /// not merely get rebroadcast on the event bus (spec.md §2 data flow).
    #[tokio::test]
    async fn stdout_reaches_the_log_store() {
        let (bus, handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (log_store, log_handle) = LogStore::new(test_config(), bus.clone());
        let sup = Supervisor::new(bus, log_store.clone());
        let id = sup.start(spec("echo hello-from-child", std::env::temp_dir()));

        for _ in 0..50 {
            if sup.get(id).map(|r| r.state.is_terminal()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        // The worker ingests asynchronously; give it a beat after the
        // process exits.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let entries = log_store.get_by_process(id);
        assert!(entries.iter().any(|e| e.content.contains("hello-from-child")), "{entries:?}");
        assert!(entries.iter().all(|e| !e.is_error));

        handle.shutdown(Duration::from_secs(1)).await;
        log_handle.shutdown().await;
    }

    #[tokio::test]
    async fn missing_cwd_fails_immediately() {
        let (bus, handle) = EventBus::new(EventBusConfig { queue_capacity: 64, worker_count: 2 });
        let (log_store, log_handle) = LogStore::new(test_config(), bus.clone());
        let sup = Supervisor::new(bus, log_store);
        let id = sup.start(spec("echo hi", std::path::PathBuf::from("/no/such/dir/xyz")));

        for _ in 0..50 {
            if sup.get(id).map(|r| r.state.is_terminal()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let record = sup.get(id).unwrap();
        assert_eq!(record.state, ProcessState::Failed);
        handle.shutdown(Duration::from_secs(1)).await;
        log_handle.shutdown().await;
    }
}
