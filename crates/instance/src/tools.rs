// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool descriptors and `tools/call` dispatch (spec.md §4.5, §6).
//!
//! Non-streaming tools run to completion and return one [`CallToolResult`].
//! Streaming tools (`scripts/run`, `logs/stream`, `telemetry/events`) hold
//! the request open, relaying progress as SSE notifications tagged with the
//! call id on the session's channel, and only return their `CallToolResult`
//! once the underlying activity reaches a terminal state — a process exit
//! for `scripts/run`, an external collaborator's own completion for
//! `telemetry/events`, or, for all of them, caller cancellation (spec.md
//! §4.5: "the final result closes the call"; §5: "every tool handler
//! receives a cancellation token tied to the session and the request").

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use brummer_core::{Event, EventKind, LogLevel, PackageManager, ProcessId, ProcessSpec, SessionId};
use brummer_wire::params::{
    LogsSearchParams, LogsStreamParams, ScriptsRunParams, ScriptsStatusParams, ScriptsStopParams,
};
use brummer_wire::{CallToolResult, RpcError, ToolDescriptor};
use serde_json::json;

use crate::context::InstanceContext;
use crate::session::SseFrame;

pub fn descriptors() -> Vec<ToolDescriptor> {
    let mut out = vec![
        tool(
            brummer_wire::methods::SCRIPTS_LIST,
            "List package-manager scripts discoverable in the working directory; see the scripts/list about tool",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
            false,
        ),
        tool(
            brummer_wire::methods::SCRIPTS_RUN,
            "Run a package-manager script, streaming its output; see the scripts/run about tool",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "args": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["name"],
                "additionalProperties": false,
            }),
            true,
        ),
        tool(
            brummer_wire::methods::SCRIPTS_STOP,
            "Stop a running script by process id; see the scripts/stop about tool",
            json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"],
                "additionalProperties": false,
            }),
            false,
        ),
        tool(
            brummer_wire::methods::SCRIPTS_STATUS,
            "Report the state of one or all supervised processes; see the scripts/status about tool",
            json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "additionalProperties": false,
            }),
            false,
        ),
        tool(
            brummer_wire::methods::LOGS_STREAM,
            "Stream matching log lines as they are captured; see the logs/stream about tool",
            json!({
                "type": "object",
                "properties": {
                    "process_id": {"type": "string"},
                    "level": {"type": "string", "enum": ["debug", "info", "warn", "error", "critical"]},
                    "pattern": {"type": "string"},
                },
                "additionalProperties": false,
            }),
            true,
        ),
        tool(
            brummer_wire::methods::LOGS_SEARCH,
            "Search captured log lines; see the logs/search about tool",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "regex": {"type": "boolean"},
                    "since": {"type": "string", "format": "date-time"},
                    "until": {"type": "string", "format": "date-time"},
                    "limit": {"type": "integer"},
                },
                "required": ["query"],
                "additionalProperties": false,
            }),
            false,
        ),
        tool(
            brummer_wire::methods::PROXY_REQUESTS,
            "List recent proxied HTTP requests (external collaborator); see the proxy/requests about tool",
            json!({
                "type": "object",
                "properties": {"limit": {"type": "integer"}},
                "additionalProperties": false,
            }),
            false,
        ),
        tool(
            brummer_wire::methods::TELEMETRY_SESSIONS,
            "List browser telemetry sessions (external collaborator); see the telemetry/sessions about tool",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
            false,
        ),
        tool(
            brummer_wire::methods::TELEMETRY_EVENTS,
            "Stream browser telemetry events (external collaborator); see the telemetry/events about tool",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
            true,
        ),
        tool(
            brummer_wire::methods::BROWSER_OPEN,
            "Open a URL in the managed browser (external collaborator); see the browser/open about tool",
            json!({
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"],
                "additionalProperties": false,
            }),
            false,
        ),
        tool(
            brummer_wire::methods::BROWSER_REFRESH,
            "Refresh the managed browser (external collaborator); see the browser/refresh about tool",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
            false,
        ),
        tool(
            brummer_wire::methods::BROWSER_NAVIGATE,
            "Navigate the managed browser to a URL (external collaborator); see the browser/navigate about tool",
            json!({
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"],
                "additionalProperties": false,
            }),
            false,
        ),
        tool(
            brummer_wire::methods::BROWSER_SCREENSHOT,
            "Capture a screenshot of the managed browser (external collaborator); see the browser/screenshot about tool",
            json!({
                "type": "object",
                "properties": {"format": {"type": "string", "enum": ["png", "jpeg", "webp"]}},
                "additionalProperties": false,
            }),
            false,
        ),
        tool(
            brummer_wire::methods::REPL_EXECUTE,
            "Execute a snippet in the embedded REPL (external collaborator); see the repl/execute about tool",
            json!({
                "type": "object",
                "properties": {"code": {"type": "string"}, "async": {"type": "boolean"}},
                "required": ["code"],
                "additionalProperties": false,
            }),
            false,
        ),
    ];
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

fn tool(name: &str, description: &str, input_schema: serde_json::Value, streaming: bool) -> ToolDescriptor {
    ToolDescriptor { name: name.to_string(), description: description.to_string(), input_schema, streaming }
}

fn parse<T: serde::de::DeserializeOwned>(arguments: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(arguments).map_err(|e| RpcError::invalid_params(e.to_string()))
}

/// Dispatch one `tools/call`. `call_id` tags every SSE progress frame a
/// streaming tool emits while this call is in flight.
pub async fn call(
    ctx: &Arc<InstanceContext>,
    session_id: SessionId,
    call_id: &str,
    name: &str,
    arguments: serde_json::Value,
) -> Result<CallToolResult, RpcError> {
    match name {
        brummer_wire::methods::SCRIPTS_LIST => {
            Ok(CallToolResult::ok_json(json!({ "scripts": crate::resources::available_scripts(ctx) })))
        }
        brummer_wire::methods::SCRIPTS_RUN => {
            let params: ScriptsRunParams = parse(arguments)?;
            scripts_run(ctx, session_id, call_id, params).await
        }
        brummer_wire::methods::SCRIPTS_STOP => {
            let params: ScriptsStopParams = parse(arguments)?;
            scripts_stop(ctx, params).await
        }
        brummer_wire::methods::SCRIPTS_STATUS => {
            let params: ScriptsStatusParams = parse(arguments)?;
            Ok(scripts_status(ctx, params))
        }
        brummer_wire::methods::LOGS_STREAM => {
            let params: LogsStreamParams = parse(arguments)?;
            logs_stream(ctx, session_id, call_id, params).await
        }
        brummer_wire::methods::LOGS_SEARCH => {
            let params: LogsSearchParams = parse(arguments)?;
            logs_search(ctx, params)
        }
        brummer_wire::methods::PROXY_REQUESTS => {
            let params = parse(arguments)?;
            Ok(ctx.collaborators.proxy_requests(params).await)
        }
        brummer_wire::methods::TELEMETRY_SESSIONS => Ok(ctx.collaborators.telemetry_sessions().await),
        brummer_wire::methods::TELEMETRY_EVENTS => Ok(ctx.collaborators.telemetry_events().await),
        brummer_wire::methods::BROWSER_OPEN => {
            let params = parse(arguments)?;
            Ok(ctx.collaborators.browser_open(params).await)
        }
        brummer_wire::methods::BROWSER_REFRESH => Ok(ctx.collaborators.browser_refresh().await),
        brummer_wire::methods::BROWSER_NAVIGATE => {
            let params = parse(arguments)?;
            Ok(ctx.collaborators.browser_navigate(params).await)
        }
        brummer_wire::methods::BROWSER_SCREENSHOT => {
            let params = arguments;
            let parsed = if params.is_null() { Default::default() } else { parse(params)? };
            Ok(ctx.collaborators.browser_screenshot(parsed).await)
        }
        brummer_wire::methods::REPL_EXECUTE => {
            let params = parse(arguments)?;
            Ok(ctx.collaborators.repl_execute(params).await)
        }
        other => Err(RpcError::method_not_found(other)),
    }
}

async fn scripts_stop(ctx: &Arc<InstanceContext>, params: ScriptsStopParams) -> Result<CallToolResult, RpcError> {
    let id = ProcessId::from_string(&params.id);
    match ctx.supervisor.stop(id, Duration::from_secs(5)).await {
        Ok(()) => Ok(CallToolResult::ok_json(json!({ "id": params.id, "stopped": true }))),
        Err(e) => Ok(CallToolResult::error(e.to_string())),
    }
}

fn scripts_status(ctx: &Arc<InstanceContext>, params: ScriptsStatusParams) -> CallToolResult {
    match params.id {
        Some(id) => match ctx.supervisor.get(ProcessId::from_string(&id)) {
            Some(record) => match serde_json::to_value(record) {
                Ok(value) => CallToolResult::ok_json(value),
                Err(e) => CallToolResult::error(e.to_string()),
            },
            None => CallToolResult::error(format!("no such process: {id}")),
        },
        None => CallToolResult::ok_json(json!({ "processes": ctx.supervisor.list() })),
    }
}

fn logs_search(ctx: &Arc<InstanceContext>, params: LogsSearchParams) -> Result<CallToolResult, RpcError> {
    let re = if params.regex {
        Some(regex::Regex::new(&params.query).map_err(|e| RpcError::invalid_params(e.to_string()))?)
    } else {
        None
    };
    let since = parse_rfc3339(&params.since)?;
    let until = parse_rfc3339(&params.until)?;
    let needle = params.query.to_ascii_lowercase();

    let mut matches: Vec<_> = ctx
        .log_store
        .get_all()
        .into_iter()
        .filter(|entry| match &re {
            Some(re) => re.is_match(&entry.content),
            None => entry.content.to_ascii_lowercase().contains(&needle),
        })
        .filter(|entry| since.map(|s| entry.timestamp >= s).unwrap_or(true))
        .filter(|entry| until.map(|u| entry.timestamp <= u).unwrap_or(true))
        .collect();

    if let Some(limit) = params.limit {
        if matches.len() > limit {
            matches = matches.split_off(matches.len() - limit);
        }
    }
    Ok(CallToolResult::ok_json(json!({ "entries": matches })))
}

fn parse_rfc3339(value: &Option<String>) -> Result<Option<SystemTime>, RpcError> {
    match value {
        None => Ok(None),
        Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(SystemTime::from(dt)))
            .map_err(|e| RpcError::invalid_params(format!("invalid RFC3339 timestamp {raw:?}: {e}"))),
    }
}

/// Events relayed from the EventBus into the streaming-tool task, decoupled
/// from the bus's synchronous `Fn(&Event)` handler signature.
enum Progress {
    Log { content: String, is_error: bool, level: LogLevel },
    ProcessExited { termination: brummer_core::Termination, duration_ms: u64 },
}

async fn scripts_run(
    ctx: &Arc<InstanceContext>,
    session_id: SessionId,
    call_id: &str,
    params: ScriptsRunParams,
) -> Result<CallToolResult, RpcError> {
    let cwd = ctx.config.working_dir.clone();
    let package_manager = PackageManager::detect(&cwd);
    let spec = ProcessSpec {
        name: params.name.clone(),
        command: params.name.clone(),
        cwd,
        env: std::collections::HashMap::new(),
        package_manager,
        args: params.args,
        max_line_bytes: ctx.config.max_line_bytes,
    };
    let process_id = ctx.supervisor.start(spec);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Progress>();

    let log_tx = tx.clone();
    let log_sub = ctx.event_bus.subscribe(EventKind::LogLine, move |event| {
        if let Event::LogLine { process_id: pid, content, is_error, level, .. } = event {
            if *pid == process_id {
                let _ = log_tx.send(Progress::Log { content: content.clone(), is_error: *is_error, level: *level });
            }
        }
    });
    let exit_sub = ctx.event_bus.subscribe(EventKind::ProcessExited, move |event| {
        if let Event::ProcessExited { process_id: pid, termination, duration_ms, .. } = event {
            if *pid == process_id {
                let _ = tx.send(Progress::ProcessExited { termination: termination.clone(), duration_ms: *duration_ms });
            }
        }
    });

    let result = drive_progress(ctx, session_id, call_id, &mut rx, |progress| match progress {
        Progress::Log { content, is_error, level } => {
            emit_progress(ctx, session_id, call_id, json!({ "content": content, "is_error": is_error, "level": level }));
            None
        }
        Progress::ProcessExited { termination, duration_ms } => Some(CallToolResult::ok_json(json!({
            "process_id": process_id,
            "termination": termination,
            "duration_ms": duration_ms,
        }))),
    })
    .await;

    ctx.event_bus.unsubscribe(log_sub);
    ctx.event_bus.unsubscribe(exit_sub);
    result.ok_or_else(|| RpcError::tool_cancelled(call_id))
}

async fn logs_stream(
    ctx: &Arc<InstanceContext>,
    session_id: SessionId,
    call_id: &str,
    params: LogsStreamParams,
) -> Result<CallToolResult, RpcError> {
    let filter_process = params.process_id.map(|p| ProcessId::from_string(&p));
    let filter_level = params.level;
    let filter_pattern = params.pattern;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Progress>();
    let sub = ctx.event_bus.subscribe(EventKind::LogLine, move |event| {
        if let Event::LogLine { process_id, content, is_error, level, .. } = event {
            if filter_process.is_some_and(|want| want != *process_id) {
                return;
            }
            if filter_level.is_some_and(|want| want != *level) {
                return;
            }
            if let Some(pattern) = &filter_pattern {
                if !content.contains(pattern.as_str()) {
                    return;
                }
            }
            let _ = tx.send(Progress::Log { content: content.clone(), is_error: *is_error, level: *level });
        }
    });

    // logs/stream has no natural completion: it runs until the caller
    // cancels (disconnect, shutdown, or idle timeout), always resolving
    // through the cancellation path below.
    let result = drive_progress(ctx, session_id, call_id, &mut rx, |progress| match progress {
        Progress::Log { content, is_error, level } => {
            emit_progress(ctx, session_id, call_id, json!({ "content": content, "is_error": is_error, "level": level }));
            None
        }
        Progress::ProcessExited { .. } => None,
    })
    .await;

    ctx.event_bus.unsubscribe(sub);
    result.ok_or_else(|| RpcError::tool_cancelled(call_id))
}

/// Drain `rx`, calling `on_progress` for each item until it returns
/// `Some(result)` or the session's cancellation token fires first.
async fn drive_progress<F>(
    ctx: &Arc<InstanceContext>,
    session_id: SessionId,
    _call_id: &str,
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<Progress>,
    mut on_progress: F,
) -> Option<CallToolResult>
where
    F: FnMut(Progress) -> Option<CallToolResult>,
{
    let cancel = ctx.sessions.cancellation(session_id).unwrap_or_default();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            maybe = rx.recv() => {
                match maybe {
                    Some(progress) => {
                        if let Some(result) = on_progress(progress) {
                            return Some(result);
                        }
                    }
                    None => return None,
                }
            }
        }
    }
}

fn emit_progress(ctx: &Arc<InstanceContext>, session_id: SessionId, call_id: &str, data: serde_json::Value) {
    let notification = brummer_wire::Request::notification(
        brummer_wire::methods::NOTIFY_TOOLS_PROGRESS,
        Some(json!({ "call_id": call_id, "data": data })),
    );
    if let Ok(frame) = serde_json::to_string(&notification) {
        ctx.sessions.publish_frame(session_id, SseFrame(frame));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_are_sorted_and_flag_streaming_tools_correctly() {
        let descs = descriptors();
        let mut names: Vec<_> = descs.iter().map(|d| d.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        names.clear();

        for d in &descs {
            assert_eq!(d.streaming, brummer_wire::methods::is_streaming_tool(&d.name), "{}", d.name);
        }
    }
}
