// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the [`EventBus`](brummer_eventbus::EventBus) to every connected
//! session's SSE channel. `process/*`, `logs/new`, and `error/detected`
//! notifications go out to every session unconditionally (spec.md §4.5:
//! "notifications emitted without subscription"); `resources/updated`
//! fires only to sessions that subscribed to the matching URI.

use std::sync::Arc;

use brummer_core::{Event, EventKind};
use brummer_wire::methods;
use brummer_wire::Request;

use crate::context::InstanceContext;
use crate::resources;
use crate::session::SseFrame;

fn frame_for(method: &str, params: serde_json::Value) -> SseFrame {
    let notification = Request::notification(method, Some(params));
    SseFrame(serde_json::to_string(&notification).unwrap_or_default())
}

fn broadcast_to_all(ctx: &Arc<InstanceContext>, frame: SseFrame) {
    let ids = ctx.sessions.all_ids();
    ctx.sessions.broadcast_frame(&ids, frame);
}

/// Subscribe the context's session registry to every event kind it forwards
/// as a notification. Call once, after the context and its sessions are
/// constructed.
pub fn install(ctx: Arc<InstanceContext>) {
    let log_ctx = ctx.clone();
    ctx.event_bus.subscribe(EventKind::LogLine, move |event| {
        if let Event::LogLine { process_id, process_name, content, is_error, level, .. } = event {
            let frame = frame_for(
                methods::NOTIFY_LOGS_NEW,
                serde_json::json!({
                    "process_id": process_id,
                    "process_name": process_name,
                    "content": content,
                    "is_error": is_error,
                    "level": level,
                }),
            );
            broadcast_to_all(&log_ctx, frame);
            touch_resources(&log_ctx, EventKind::LogLine);
        }
    });

    let start_ctx = ctx.clone();
    ctx.event_bus.subscribe(EventKind::ProcessStarted, move |event| {
        if let Event::ProcessStarted { process_id, process_name, pid, cwd } = event {
            let frame = frame_for(
                methods::NOTIFY_PROCESS_STARTED,
                serde_json::json!({
                    "process_id": process_id,
                    "process_name": process_name,
                    "pid": pid,
                    "cwd": cwd,
                }),
            );
            broadcast_to_all(&start_ctx, frame);
            touch_resources(&start_ctx, EventKind::ProcessStarted);
        }
    });

    let exit_ctx = ctx.clone();
    ctx.event_bus.subscribe(EventKind::ProcessExited, move |event| {
        if let Event::ProcessExited { process_id, process_name, termination, duration_ms } = event {
            let frame = frame_for(
                methods::NOTIFY_PROCESS_EXITED,
                serde_json::json!({
                    "process_id": process_id,
                    "process_name": process_name,
                    "termination": termination,
                    "duration_ms": duration_ms,
                }),
            );
            broadcast_to_all(&exit_ctx, frame);
            touch_resources(&exit_ctx, EventKind::ProcessExited);
        }
    });

    let error_ctx = ctx.clone();
    ctx.event_bus.subscribe(EventKind::ErrorDetected, move |event| {
        if let Event::ErrorDetected { context } = event {
            let frame = frame_for(methods::NOTIFY_ERROR_DETECTED, serde_json::json!({ "context": context }));
            broadcast_to_all(&error_ctx, frame);
            touch_resources(&error_ctx, EventKind::ErrorDetected);
        }
    });

    let resource_ctx = ctx;
    resource_ctx.event_bus.clone().subscribe(EventKind::ResourceUpdated, move |event| {
        if let Event::ResourceUpdated { uri } = event {
            let subscribers = resource_ctx.sessions.subscribers_of(uri);
            if subscribers.is_empty() {
                return;
            }
            let frame = frame_for(methods::NOTIFY_RESOURCES_UPDATED, serde_json::json!({ "uri": uri }));
            resource_ctx.sessions.broadcast_frame(&subscribers, frame);
        }
    });
}

/// Resource URIs whose backing data changes when an event of `kind` fires,
/// so subscribers get notified without every resource needing its own
/// bespoke subscription wiring.
fn resource_uris_touched_by(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::LogLine => &[resources::LOGS_RECENT],
        EventKind::ErrorDetected => &[resources::LOGS_ERRORS],
        EventKind::ProcessStarted | EventKind::ProcessExited => &[resources::PROCESSES_ACTIVE],
        _ => &[],
    }
}

fn touch_resources(ctx: &Arc<InstanceContext>, kind: EventKind) {
    for uri in resource_uris_touched_by(kind) {
        ctx.event_bus.publish(Event::ResourceUpdated { uri: (*uri).to_string() });
    }
}
