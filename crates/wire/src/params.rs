// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed argument shapes for each tool's `arguments` object. These are
//! deserialized from the `Value` carried in a `tools/call` request's
//! `params.arguments`, with unknown fields rejected at the boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScriptsRunParams {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScriptsStopParams {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScriptsStatusParams {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogsStreamParams {
    #[serde(default)]
    pub process_id: Option<String>,
    #[serde(default)]
    pub level: Option<brummer_core::LogLevel>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogsSearchParams {
    pub query: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub until: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProxyRequestsParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
    Png,
    Jpeg,
    Webp,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BrowserOpenParams {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BrowserNavigateParams {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BrowserScreenshotParams {
    #[serde(default)]
    pub format: Option<ScreenshotFormat>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReplExecuteParams {
    pub code: String,
    #[serde(default, rename = "async")]
    pub is_async: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InstancesConnectParams {
    pub instance_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_run_rejects_unknown_fields() {
        let raw = serde_json::json!({"name": "dev", "bogus": true});
        let result: Result<ScriptsRunParams, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }

    #[test]
    fn scripts_run_defaults_args_to_empty() {
        let raw = serde_json::json!({"name": "dev"});
        let parsed: ScriptsRunParams = serde_json::from_value(raw).unwrap();
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn repl_execute_maps_async_keyword_field() {
        let raw = serde_json::json!({"code": "1+1", "async": true});
        let parsed: ReplExecuteParams = serde_json::from_value(raw).unwrap();
        assert!(parsed.is_async);
    }
}
