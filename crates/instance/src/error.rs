// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance-level errors: things that abort a request before a JSON-RPC
//! [`RpcError`](brummer_wire::RpcError) can be synthesized from it, plus the
//! small amount of transport setup that can fail outright.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to bind {0}")]
    Bind(std::net::SocketAddr, #[source] std::io::Error),
    #[error("malformed JSON-RPC payload")]
    MalformedJson(#[source] serde_json::Error),
    #[error(transparent)]
    Discovery(#[from] brummer_discovery::DiscoveryError),
}
