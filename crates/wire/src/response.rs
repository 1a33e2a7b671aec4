// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;
use crate::request::RequestId;

const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC response: exactly one of `result` or `error` is present,
/// discriminated structurally rather than by a tag field (per the wire
/// format, which has no `type` discriminant on responses).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Success { jsonrpc: String, id: RequestId, result: Value },
    Error { jsonrpc: String, id: Option<RequestId>, error: RpcError },
}

impl Response {
    pub fn ok(id: RequestId, result: Value) -> Self {
        Response::Success { jsonrpc: JSONRPC_VERSION.to_string(), id, result }
    }

    pub fn err(id: Option<RequestId>, error: RpcError) -> Self {
        Response::Error { jsonrpc: JSONRPC_VERSION.to_string(), id, error }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Response::Success { id, .. } => Some(id),
            Response::Error { id, .. } => id.as_ref(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_round_trips() {
        let r = Response::ok(RequestId::Number(1), serde_json::json!({"ok": true}));
        let json = serde_json::to_string(&r).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(!back.is_error());
    }

    #[test]
    fn error_round_trips_with_no_id() {
        let r = Response::err(None, RpcError::parse_error("bad json"));
        let json = serde_json::to_string(&r).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(back.is_error());
        assert_eq!(back.id(), None);
    }
}
