// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-group termination: SIGTERM, then SIGKILL if the group hasn't
//! exited within the grace period.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to signal process group {pgid}: {source}")]
    Send {
        pgid: i32,
        #[source]
        source: nix::errno::Errno,
    },
}

/// Send a signal to an entire process group. `pid` is the group leader's
/// pid, spawned with `process_group(0)` so pgid == pid.
pub fn signal_group(pid: u32, signal: Signal) -> Result<(), SignalError> {
    let pgid = pid as i32;
    match signal::kill(Pid::from_raw(-pgid), signal) {
        Ok(()) => Ok(()),
        // ESRCH: the group is already gone — not an error from the caller's
        // point of view, termination was already achieved.
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(source) => Err(SignalError::Send { pgid, source }),
    }
}

pub fn terminate(pid: u32) -> Result<(), SignalError> {
    signal_group(pid, Signal::SIGTERM)
}

pub fn kill(pid: u32) -> Result<(), SignalError> {
    signal_group(pid, Signal::SIGKILL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signalling_an_already_dead_group_is_not_an_error() {
        // pid 1 owned by init isn't ours, but a very large unused pid's
        // group reliably yields ESRCH, which we treat as success.
        let result = terminate(999_999);
        assert!(result.is_ok());
    }
}
