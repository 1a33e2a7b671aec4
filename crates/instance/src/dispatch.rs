// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-request JSON-RPC method router (spec.md §4.5). One [`dispatch`]
//! call handles exactly one `Request`; `initialize` is split out since it is
//! the only method allowed before a session exists.

use std::sync::Arc;
use std::time::SystemTime;

use brummer_core::{SessionId, Transport};
use brummer_wire::session_protocol::{
    InitializeParams, InitializeResult, ResourcesReadParams, ResourcesSubscribeParams, ServerCapabilities,
};
use brummer_wire::{methods, PromptDescriptor, Request, RequestId, Response, RpcError};
use serde_json::json;

use crate::context::InstanceContext;
use crate::{resources, tools};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Establish a new session. The only call permitted without an existing
/// session id.
pub fn initialize(ctx: &Arc<InstanceContext>, transport: Transport, _params: InitializeParams) -> (SessionId, InitializeResult) {
    let session_id = ctx.sessions.create(transport, SystemTime::now());
    let result = InitializeResult {
        session_id: session_id.to_string(),
        capabilities: ServerCapabilities { tools: true, resources: true, prompts: true },
        server_version: SERVER_VERSION.to_string(),
    };
    (session_id, result)
}

/// Dispatch one request against an already-established session. Returns
/// `None` for notifications (no response is ever sent for those, per
/// JSON-RPC). Acquires the session's execution lock for the duration of the
/// call, giving per-session FIFO ordering (spec.md §4.5, §5).
pub async fn dispatch(ctx: &Arc<InstanceContext>, session_id: SessionId, request: Request) -> Option<Response> {
    let id = request.id.clone();
    let is_notification = request.is_notification();

    let Some(exec_lock) = ctx.sessions.exec_lock(session_id) else {
        return response_for(id, is_notification, Err(RpcError::session_unknown(&session_id.to_string())));
    };
    let _guard = exec_lock.lock().await;
    ctx.sessions.touch(session_id, SystemTime::now());

    let result = route(ctx, session_id, &request).await;
    response_for(id, is_notification, result)
}

fn response_for(id: Option<RequestId>, is_notification: bool, result: Result<serde_json::Value, RpcError>) -> Option<Response> {
    if is_notification {
        return None;
    }
    let id = id?;
    Some(match result {
        Ok(value) => Response::ok(id, value),
        Err(e) => Response::err(Some(id), e),
    })
}

async fn route(ctx: &Arc<InstanceContext>, session_id: SessionId, request: &Request) -> Result<serde_json::Value, RpcError> {
    let params = request.params.clone().unwrap_or(serde_json::Value::Null);

    match request.method.as_str() {
        methods::INITIALIZE => Err(RpcError::invalid_request("session already established")),
        methods::SHUTDOWN => {
            ctx.sessions.remove(session_id);
            Ok(json!({}))
        }
        methods::PING => Ok(json!({})),

        methods::TOOLS_LIST => Ok(json!({ "tools": tools::descriptors() })),
        methods::TOOLS_CALL => {
            let call: ToolsCallParams = parse(params)?;
            let call_id = call.call_id_or(request.id.as_ref());
            let result = tools::call(ctx, session_id, &call_id, &call.name, call.arguments).await?;
            Ok(serde_json::to_value(result).map_err(|e| RpcError::internal_error(e.to_string()))?)
        }

        methods::RESOURCES_LIST => Ok(json!({ "resources": resources::descriptors() })),
        methods::RESOURCES_READ => {
            let p: ResourcesReadParams = parse(params)?;
            match resources::read(ctx, &p.uri) {
                Some(value) => Ok(json!({ "uri": p.uri, "contents": value })),
                None => Err(RpcError::invalid_params(format!("unknown resource uri: {}", p.uri))),
            }
        }
        methods::RESOURCES_SUBSCRIBE => {
            let p: ResourcesSubscribeParams = parse(params)?;
            if ctx.sessions.subscribe(session_id, &p.uri) {
                Ok(json!({ "uri": p.uri, "subscribed": true }))
            } else {
                Err(RpcError::session_unknown(&session_id.to_string()))
            }
        }
        methods::RESOURCES_UNSUBSCRIBE => {
            let p: ResourcesSubscribeParams = parse(params)?;
            if ctx.sessions.unsubscribe(session_id, &p.uri) {
                Ok(json!({ "uri": p.uri, "subscribed": false }))
            } else {
                Err(RpcError::subscription_not_found(&p.uri))
            }
        }

        methods::PROMPTS_LIST => Ok(json!({ "prompts": Vec::<PromptDescriptor>::new() })),
        methods::PROMPTS_GET => Err(RpcError::invalid_params("no prompts are registered on this instance")),

        other => Err(RpcError::method_not_found(other)),
    }
}

#[derive(Debug, serde::Deserialize)]
struct ToolsCallParams {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
    #[serde(default)]
    call_id: Option<String>,
}

impl ToolsCallParams {
    /// The streaming-progress tag for this call: the caller's own `call_id`
    /// if it supplied one, else the request id, else a session-scoped
    /// synthetic tag (requests with no id are notifications and cannot
    /// reach here in practice, since `tools/call` always expects a reply).
    fn call_id_or(&self, request_id: Option<&RequestId>) -> String {
        if let Some(id) = &self.call_id {
            return id.clone();
        }
        match request_id {
            Some(id) => id.to_string(),
            None => "anonymous".to_string(),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|e| RpcError::invalid_params(e.to_string()))
}
