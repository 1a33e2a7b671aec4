// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 error codes and the error object shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Implementation-defined codes, drawn from the reserved `-32000..-32099`
/// server-error range.
pub const PEER_UNREACHABLE: i64 = -32001;
pub const SESSION_UNKNOWN: i64 = -32002;
pub const SUBSCRIPTION_NOT_FOUND: i64 = -32003;
pub const TOOL_CANCELLED: i64 = -32004;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    pub fn peer_unreachable(instance_id: &str) -> Self {
        Self::new(PEER_UNREACHABLE, format!("peer unreachable: {instance_id}"))
    }

    pub fn session_unknown(session_id: &str) -> Self {
        Self::new(SESSION_UNKNOWN, format!("unknown session: {session_id}"))
    }

    pub fn subscription_not_found(uri: &str) -> Self {
        Self::new(SUBSCRIPTION_NOT_FOUND, format!("no subscription for: {uri}"))
    }

    pub fn tool_cancelled(call_id: &str) -> Self {
        Self::new(TOOL_CANCELLED, format!("tool call cancelled: {call_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_data_field_when_absent() {
        let err = RpcError::method_not_found("scripts/bogus");
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["code"], METHOD_NOT_FOUND);
    }

    #[test]
    fn with_data_round_trips() {
        let err = RpcError::invalid_params("missing name").with_data(serde_json::json!({"field": "name"}));
        let json = serde_json::to_string(&err).unwrap();
        let back: RpcError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
