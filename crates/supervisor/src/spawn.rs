// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process spawning and output capture.

use std::path::PathBuf;
use std::process::Stdio;

use brummer_core::{ProcessId, ProcessSpec};
use brummer_logstore::LogStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::line_reader::{split_into_chunks, to_utf8_lossy};

/// Build the `tokio::process::Command` for a spec, without spawning it.
pub fn build_command(spec: &ProcessSpec) -> Command {
    let argv = spec.package_manager.run_argv(&spec.command, &spec.args);
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    cmd.current_dir(&spec.cwd);
    cmd.envs(&spec.env);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    cmd
}

pub enum SpawnOutcome {
    Spawned { pid: u32, child: Child },
    Failed(String),
}

pub fn spawn(spec: &ProcessSpec) -> SpawnOutcome {
    let mut cmd = build_command(spec);
    match cmd.spawn() {
        Ok(child) => {
            let Some(pid) = child.id() else {
                return SpawnOutcome::Failed("child exited before pid could be read".to_string());
            };
            SpawnOutcome::Spawned { pid, child }
        }
        Err(e) => SpawnOutcome::Failed(e.to_string()),
    }
}

/// Drain one stream (stdout or stderr) line by line, feeding each emitted
/// chunk (a long line may produce several) into the Log Store so it runs
/// through ingestion, URL extraction, and error parsing — the store is the
/// sole publisher of the canonical `LogLine` event once a chunk has been
/// classified and indexed (spec.md §2 data flow: "child process stdout/
/// stderr lines -> Supervisor -> ... -> Log Store").
pub async fn drain_stream<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    log_store: LogStore,
    process_id: ProcessId,
    process_name: String,
    max_line_bytes: usize,
    is_error: bool,
) {
    let mut lines = BufReader::new(reader);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match lines.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                while raw.last() == Some(&b'\n') || raw.last() == Some(&b'\r') {
                    raw.pop();
                }
                let content = to_utf8_lossy(&raw);
                for chunk in split_into_chunks(&content, max_line_bytes) {
                    log_store.add(process_id, process_name.clone(), chunk, is_error);
                }
            }
            Err(e) => {
                tracing::warn!(process = %process_name, error = %e, "stream read error");
                break;
            }
        }
    }
}

pub fn cwd_exists(cwd: &PathBuf) -> bool {
    cwd.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use brummer_core::PackageManager;
    use std::collections::HashMap;

    #[test]
    fn build_command_uses_package_manager_argv() {
        let spec = ProcessSpec {
            name: "dev".into(),
            command: "dev".into(),
            cwd: std::env::temp_dir(),
            env: HashMap::new(),
            package_manager: PackageManager::Npm,
            args: Vec::new(),
            max_line_bytes: 1024,
        };
        let cmd = build_command(&spec);
        assert_eq!(cmd.as_std().get_program(), "npm");
    }
}
