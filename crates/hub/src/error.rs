// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced by the peer client and Connection Manager.

use brummer_wire::RpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("peer {0} is not known to this hub")]
    UnknownPeer(String),
    #[error("peer {0} is not in a state that accepts calls: {1}")]
    PeerNotActive(String, String),
    #[error("no peer session is bound for this call")]
    NoBoundPeer,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("malformed peer response: {0}")]
    Protocol(String),
    #[error("peer returned an error: {} ({})", .0.message, .0.code)]
    PeerError(RpcError),
    #[error(transparent)]
    Discovery(#[from] brummer_discovery::DiscoveryError),
}

impl HubError {
    /// Render as a structured JSON-RPC error for the caller, distinguishing
    /// peer-unreachable from the peer's own application error (spec.md
    /// §4.7: "a proxied tool call against a non-active peer returns a
    /// structured error indicating the peer's state").
    pub fn into_rpc(self, instance_id: &str) -> RpcError {
        match self {
            HubError::UnknownPeer(_) | HubError::PeerNotActive(..) | HubError::Transport(_) | HubError::NoBoundPeer => {
                RpcError::peer_unreachable(instance_id)
            }
            HubError::PeerError(e) => e,
            HubError::Protocol(message) => RpcError::internal_error(message),
            HubError::Discovery(e) => RpcError::internal_error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_variants_map_to_peer_unreachable_code() {
        let e = HubError::UnknownPeer("inst-xyz".into());
        let rpc = e.into_rpc("inst-xyz");
        assert_eq!(rpc.code, brummer_wire::error::PEER_UNREACHABLE);
    }

    #[test]
    fn peer_error_is_passed_through_unchanged() {
        let inner = RpcError::invalid_params("bad arguments");
        let e = HubError::PeerError(inner.clone());
        assert_eq!(e.into_rpc("inst-xyz"), inner);
    }
}
