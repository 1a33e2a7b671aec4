// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shapes exchanged during session establishment (`initialize`) and
//! resource subscriptions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerCapabilities {
    pub tools: bool,
    pub resources: bool,
    pub prompts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeParams {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeResult {
    pub session_id: String,
    pub capabilities: ServerCapabilities,
    pub server_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourcesSubscribeParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourcesReadParams {
    pub uri: String,
}

/// Resources are not dynamically federated through the Hub; it serves an
/// empty `resources/list` with this note attached.
pub const HUB_RESOURCES_NOTE: &str =
    "resources are not federated across instances in this version; connect to the instance directly";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_result_round_trips() {
        let r = InitializeResult {
            session_id: "sess-abc".into(),
            capabilities: ServerCapabilities { tools: true, resources: true, prompts: false },
            server_version: "0.2.0".into(),
        };
        let json = serde_json::to_string(&r).unwrap();
        let back: InitializeResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
