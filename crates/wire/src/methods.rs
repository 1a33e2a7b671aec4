// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC method name constants, grouped the way they're grouped in the
//! tool namespace.

pub const INITIALIZE: &str = "initialize";
pub const SHUTDOWN: &str = "shutdown";
pub const PING: &str = "ping";

pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";

pub const RESOURCES_LIST: &str = "resources/list";
pub const RESOURCES_READ: &str = "resources/read";
pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";

pub const PROMPTS_LIST: &str = "prompts/list";
pub const PROMPTS_GET: &str = "prompts/get";

pub const SCRIPTS_LIST: &str = "scripts/list";
pub const SCRIPTS_RUN: &str = "scripts/run";
pub const SCRIPTS_STOP: &str = "scripts/stop";
pub const SCRIPTS_STATUS: &str = "scripts/status";

pub const LOGS_STREAM: &str = "logs/stream";
pub const LOGS_SEARCH: &str = "logs/search";

pub const PROXY_REQUESTS: &str = "proxy/requests";

pub const TELEMETRY_SESSIONS: &str = "telemetry/sessions";
pub const TELEMETRY_EVENTS: &str = "telemetry/events";

pub const BROWSER_OPEN: &str = "browser/open";
pub const BROWSER_REFRESH: &str = "browser/refresh";
pub const BROWSER_NAVIGATE: &str = "browser/navigate";
pub const BROWSER_SCREENSHOT: &str = "browser/screenshot";

pub const REPL_EXECUTE: &str = "repl/execute";

pub const INSTANCES_LIST: &str = "instances/list";
pub const INSTANCES_CONNECT: &str = "instances/connect";
pub const INSTANCES_DISCONNECT: &str = "instances/disconnect";

pub const NOTIFY_PROCESS_STARTED: &str = "notifications/process/started";
pub const NOTIFY_PROCESS_EXITED: &str = "notifications/process/exited";
pub const NOTIFY_LOGS_NEW: &str = "notifications/logs/new";
pub const NOTIFY_ERROR_DETECTED: &str = "notifications/error/detected";
pub const NOTIFY_RESOURCES_UPDATED: &str = "notifications/resources/updated";
/// Progress frame for an in-flight streaming `tools/call`, tagged by the
/// call's request id so a client can demultiplex several concurrent
/// streaming calls on one session's SSE channel.
pub const NOTIFY_TOOLS_PROGRESS: &str = "notifications/tools/progress";

/// Tools that are naturally long-lived and stream progress frames rather
/// than returning a single result.
pub const STREAMING_TOOLS: &[&str] = &[SCRIPTS_RUN, LOGS_STREAM, TELEMETRY_EVENTS];

pub fn is_streaming_tool(name: &str) -> bool {
    STREAMING_TOOLS.contains(&name)
}

/// Prefix a peer tool name for re-exposure through the Hub's own namespace.
pub fn hub_tool_name(peer_tool: &str) -> String {
    format!("hub_{peer_tool}")
}

/// Strip the `hub_` prefix added by [`hub_tool_name`], if present.
pub fn strip_hub_prefix(name: &str) -> Option<&str> {
    name.strip_prefix("hub_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_prefix_round_trips() {
        let prefixed = hub_tool_name("scripts/list");
        assert_eq!(prefixed, "hub_scripts/list");
        assert_eq!(strip_hub_prefix(&prefixed), Some("scripts/list"));
    }

    #[test]
    fn non_prefixed_name_has_no_strip() {
        assert_eq!(strip_hub_prefix("scripts/list"), None);
    }

    #[test]
    fn streaming_tools_are_exactly_the_long_lived_ones() {
        assert!(is_streaming_tool(SCRIPTS_RUN));
        assert!(is_streaming_tool(LOGS_STREAM));
        assert!(is_streaming_tool(TELEMETRY_EVENTS));
        assert!(!is_streaming_tool(SCRIPTS_STATUS));
    }
}
