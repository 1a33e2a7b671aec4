// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory locking abstracted behind a trait so the registry doesn't care
//! which platform primitive backs it (spec.md §9: "Filesystem locks for
//! discovery ... abstract the locking primitive behind an interface with
//! platform implementations").

use std::fs::File;

/// Whether a held advisory lock is still exclusive, released, or the
/// platform can't tell us (in which case liveness falls back to pid check
/// plus heartbeat age alone, per spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Held,
    Released,
    Unknown,
}

/// Attempt to acquire an exclusive advisory lock on `file`, held for as
/// long as the returned guard lives.
pub fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
    #[cfg(any(unix, windows))]
    {
        use fs2::FileExt;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = file;
        Ok(true)
    }
}

/// Probe whether another process currently holds an exclusive lock on
/// `file`, without taking the lock ourselves. Used by the watcher to decide
/// whether a stale-looking descriptor's owner is actually gone.
pub fn probe_lock_status(file: &File) -> LockStatus {
    #[cfg(any(unix, windows))]
    {
        use fs2::FileExt;
        // Try a non-blocking shared lock: if we get it, nobody holds an
        // exclusive lock; release immediately since we were only probing.
        match file.try_lock_shared() {
            Ok(()) => {
                let _ = FileExt::unlock(file);
                LockStatus::Released
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => LockStatus::Held,
            Err(_) => LockStatus::Unknown,
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = file;
        LockStatus::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn exclusive_lock_is_detected_by_a_shared_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");
        let mut owner = std::fs::OpenOptions::new().write(true).create(true).open(&path).unwrap();
        writeln!(owner, "owner").unwrap();
        assert!(try_lock_exclusive(&owner).unwrap());

        let prober = std::fs::OpenOptions::new().read(true).open(&path).unwrap();
        assert_eq!(probe_lock_status(&prober), LockStatus::Held);
    }

    #[test]
    fn unlocked_file_probes_as_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");
        std::fs::write(&path, "x").unwrap();
        let prober = std::fs::OpenOptions::new().read(true).open(&path).unwrap();
        assert_eq!(probe_lock_status(&prober), LockStatus::Released);
    }
}
