// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer connection: the Hub's view of one discovered instance, tracked
//! through a small state machine as the Connection Manager establishes and
//! maintains a link to it.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::instance::{InstanceDescriptor, InstanceId};

/// Lifecycle state of a Hub's connection to a peer instance.
///
/// Transitions: `Discovered -> Connecting -> {Active, Retrying}`,
/// `Retrying -> {Connecting, Dead}`, `Active -> Retrying` (on health-ping
/// failure), any state `-> Dead` (on descriptor removal from Discovery).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerState {
    Discovered,
    Connecting,
    Active,
    Retrying,
    Dead,
}

crate::simple_display! {
    PeerState {
        Discovered => "discovered",
        Connecting => "connecting",
        Active => "active",
        Retrying => "retrying",
        Dead => "dead",
    }
}

impl PeerState {
    pub fn can_transition_to(self, next: PeerState) -> bool {
        use PeerState::*;
        if next == Dead {
            return self != Dead;
        }
        matches!(
            (self, next),
            (Discovered, Connecting)
                | (Connecting, Active)
                | (Connecting, Retrying)
                | (Active, Retrying)
                | (Retrying, Connecting)
        )
    }
}

/// A peer instance as tracked by the Hub's Connection Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConnection {
    pub instance_id: InstanceId,
    pub descriptor: InstanceDescriptor,
    pub state: PeerState,
    pub consecutive_failures: u32,
    pub last_attempt: Option<SystemTime>,
    pub next_retry_at: Option<SystemTime>,
}

impl PeerConnection {
    pub fn new(descriptor: InstanceDescriptor) -> Self {
        Self {
            instance_id: descriptor.id,
            descriptor,
            state: PeerState::Discovered,
            consecutive_failures: 0,
            last_attempt: None,
            next_retry_at: None,
        }
    }

    #[must_use]
    pub fn transition(&mut self, next: PeerState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        if next == PeerState::Active {
            self.consecutive_failures = 0;
            self.next_retry_at = None;
        }
        if next == PeerState::Retrying {
            self.consecutive_failures += 1;
        }
        self.state = next;
        true
    }

    /// Exponential backoff with a cap, seeded from `base` and doubled per
    /// consecutive failure.
    pub fn backoff_delay(&self, base: std::time::Duration, cap: std::time::Duration) -> std::time::Duration {
        let shift = self.consecutive_failures.min(10);
        base.checked_mul(1u32 << shift).unwrap_or(cap).min(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    fn descriptor() -> InstanceDescriptor {
        InstanceDescriptor::new(
            crate::instance::InstanceId::new(),
            "dev",
            PathBuf::from("/tmp"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7777),
            123,
            SystemTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn happy_path_transitions() {
        let mut p = PeerConnection::new(descriptor());
        assert!(p.transition(PeerState::Connecting));
        assert!(p.transition(PeerState::Active));
        assert_eq!(p.consecutive_failures, 0);
    }

    #[test]
    fn dead_is_reachable_from_any_non_dead_state() {
        for start in [PeerState::Discovered, PeerState::Connecting, PeerState::Active, PeerState::Retrying] {
            assert!(start.can_transition_to(PeerState::Dead), "{start:?} -> Dead must be allowed");
        }
        assert!(!PeerState::Dead.can_transition_to(PeerState::Dead));
    }

    #[test]
    fn retry_count_increments_and_backoff_grows() {
        let mut p = PeerConnection::new(descriptor());
        assert!(p.transition(PeerState::Connecting));
        assert!(p.transition(PeerState::Retrying));
        assert_eq!(p.consecutive_failures, 1);
        let d1 = p.backoff_delay(Duration::from_millis(100), Duration::from_secs(30));
        assert!(p.transition(PeerState::Connecting));
        assert!(p.transition(PeerState::Retrying));
        let d2 = p.backoff_delay(Duration::from_millis(100), Duration::from_secs(30));
        assert!(d2 > d1);
    }

    #[test]
    fn backoff_is_capped() {
        let mut p = PeerConnection::new(descriptor());
        p.consecutive_failures = 20;
        let d = p.backoff_delay(Duration::from_millis(100), Duration::from_secs(5));
        assert_eq!(d, Duration::from_secs(5));
    }
}
