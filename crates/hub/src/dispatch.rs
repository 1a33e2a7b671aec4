// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hub's JSON-RPC method router (spec.md §4.8). Handles `initialize`,
//! its own `instances/*` tool namespace, and proxies every `hub_`-prefixed
//! tool call to whichever peer the session is currently bound to.

use std::sync::Arc;
use std::time::SystemTime;

use brummer_core::{InstanceId, SessionId};
use brummer_wire::session_protocol::{InitializeParams, InitializeResult, ServerCapabilities};
use brummer_wire::{methods, CallToolResult, PromptDescriptor, Request, RequestId, Response, ResourceDescriptor, RpcError, ToolDescriptor};
use serde_json::json;

use crate::context::HubContext;
use crate::error::HubError;
use crate::relay;

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn initialize(ctx: &Arc<HubContext>, _params: InitializeParams) -> (SessionId, InitializeResult) {
    let session_id = ctx.sessions.create(SystemTime::now());
    let result = InitializeResult {
        session_id: session_id.to_string(),
        capabilities: ServerCapabilities { tools: true, resources: true, prompts: true },
        server_version: SERVER_VERSION.to_string(),
    };
    (session_id, result)
}

/// Dispatch one request against an already-established session. Returns
/// `None` for notifications, matching JSON-RPC semantics.
pub async fn dispatch(ctx: &Arc<HubContext>, session_id: SessionId, request: Request) -> Option<Response> {
    let id = request.id.clone();
    let is_notification = request.is_notification();

    if !ctx.sessions.exists(session_id) {
        return response_for(id, is_notification, Err(RpcError::session_unknown(&session_id.to_string())));
    }

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

async fn route(ctx: &Arc<HubContext>, session_id: SessionId, request: &Request) -> Result<serde_json::Value, RpcError> {
    let params = request.params.clone().unwrap_or(serde_json::Value::Null);

    match request.method.as_str() {
        methods::INITIALIZE => Err(RpcError::invalid_request("session already established")),
        methods::SHUTDOWN => {
            ctx.sessions.remove(session_id);
            Ok(json!({}))
        }
        methods::PING => Ok(json!({})),

        methods::TOOLS_LIST => tools_list(ctx, session_id).await,
        methods::TOOLS_CALL => tools_call(ctx, session_id, params).await,

        methods::RESOURCES_LIST => Ok(json!({ "resources": Vec::<ResourceDescriptor>::new(), "note": brummer_wire::session_protocol::HUB_RESOURCES_NOTE })),
        methods::RESOURCES_READ | methods::RESOURCES_SUBSCRIBE | methods::RESOURCES_UNSUBSCRIBE => {
            Err(RpcError::invalid_params(brummer_wire::session_protocol::HUB_RESOURCES_NOTE))
        }

        methods::PROMPTS_LIST => Ok(json!({ "prompts": Vec::<PromptDescriptor>::new() })),
        methods::PROMPTS_GET => Err(RpcError::invalid_params("no prompts are registered on this hub")),

        methods::INSTANCES_LIST => Ok(json!({ "instances": ctx.connections.list() })),
        methods::INSTANCES_CONNECT => instances_connect(ctx, session_id, params).await,
        methods::INSTANCES_DISCONNECT => {
            ctx.sessions.unbind(session_id);
            Ok(json!({ "disconnected": true }))
        }

        other => Err(RpcError::method_not_found(other)),
    }
}

#[derive(Debug, serde::Deserialize)]
struct ToolsCallParams {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

async fn tools_list(ctx: &Arc<HubContext>, session_id: SessionId) -> Result<serde_json::Value, RpcError> {
    let mut tools = vec![
        tool(methods::INSTANCES_LIST, "List every peer instance discovered so far and its connection state", json!({"type": "object", "properties": {}, "additionalProperties": false})),
        tool(
            methods::INSTANCES_CONNECT,
            "Bind this session to a peer instance so its tools can be invoked through the hub_ namespace",
            json!({"type": "object", "properties": {"instance_id": {"type": "string"}}, "required": ["instance_id"], "additionalProperties": false}),
        ),
        tool(methods::INSTANCES_DISCONNECT, "Release this session's peer binding", json!({"type": "object", "properties": {}, "additionalProperties": false})),
    ];

    if let Some(peer_id) = ctx.sessions.bound_peer(session_id) {
        match peer_tools_list(ctx, peer_id).await {
            Ok(peer_tools) => {
                for t in peer_tools {
                    tools.push(ToolDescriptor {
                        name: methods::hub_tool_name(&t.name),
                        description: t.description,
                        input_schema: t.input_schema,
                        streaming: t.streaming,
                    });
                }
            }
            Err(e) => tracing::debug!(error = %e, instance_id = %peer_id, "could not fetch bound peer's tools/list"),
        }
    }

    Ok(json!({ "tools": tools }))
}

fn tool(name: &str, description: &str, input_schema: serde_json::Value) -> ToolDescriptor {
    ToolDescriptor { name: name.to_string(), description: description.to_string(), input_schema, streaming: false }
}

async fn peer_tools_list(ctx: &Arc<HubContext>, peer_id: InstanceId) -> Result<Vec<ToolDescriptor>, HubError> {
    let request = Request::call(RequestId::Number(0), methods::TOOLS_LIST, None);
    let response = ctx.connections.call_peer(peer_id, &request).await?;
    match response {
        Response::Success { result, .. } => {
            #[derive(serde::Deserialize)]
            struct ToolsListResult {
                tools: Vec<ToolDescriptor>,
            }
            let parsed: ToolsListResult = serde_json::from_value(result).map_err(|e| HubError::Protocol(e.to_string()))?;
            Ok(parsed.tools)
        }
        Response::Error { error, .. } => Err(HubError::PeerError(error)),
    }
}

async fn tools_call(ctx: &Arc<HubContext>, session_id: SessionId, params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let call: ToolsCallParams = parse(params)?;

    let Some(peer_tool) = methods::strip_hub_prefix(&call.name) else {
        return Err(RpcError::method_not_found(&call.name));
    };

    let peer_id = ctx.sessions.bound_peer(session_id).ok_or(HubError::NoBoundPeer).map_err(|e| e.into_rpc("none"))?;

    let request = Request::call(RequestId::Number(1), methods::TOOLS_CALL, Some(json!({ "name": peer_tool, "arguments": call.arguments })));
    let response = ctx.connections.call_peer(peer_id, &request).await.map_err(|e| e.into_rpc(&peer_id.to_string()))?;

    match response {
        Response::Success { result, .. } => {
            let parsed: CallToolResult = serde_json::from_value(result).map_err(|e| RpcError::internal_error(e.to_string()))?;
            serde_json::to_value(parsed).map_err(|e| RpcError::internal_error(e.to_string()))
        }
        Response::Error { error, .. } => Err(error),
    }
}

async fn instances_connect(ctx: &Arc<HubContext>, session_id: SessionId, params: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    #[derive(serde::Deserialize)]
    struct Params {
        instance_id: String,
    }
    let parsed: Params = parse(params)?;
    let peer_id = InstanceId::from_string(&parsed.instance_id);

    let (client, peer_session_id) = ctx.connections.peer_session(peer_id).map_err(|e| e.into_rpc(&parsed.instance_id))?;

    let relay_handle = relay::spawn(client, peer_session_id, ctx.notify_tx.clone());
    ctx.sessions.bind(session_id, peer_id, Some(relay_handle));

    Ok(json!({ "instance_id": parsed.instance_id, "connected": true }))
}

fn parse<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|e| RpcError::invalid_params(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brummer_core::HubConfig;

    fn test_ctx() -> Arc<HubContext> {
        let (ctx, _rx) = HubContext::new(HubConfig::default());
        ctx
    }

    #[tokio::test]
    async fn initialize_then_ping_round_trips() {
        let ctx = test_ctx();
        let (session_id, result) = initialize(&ctx, InitializeParams { client_name: None, client_version: None });
        assert_eq!(result.session_id, session_id.to_string());

        let req = Request::call(RequestId::Number(1), methods::PING, None);
        let resp = dispatch(&ctx, session_id, req).await.unwrap();
        assert!(!resp.is_error());
    }

    #[tokio::test]
    async fn tools_list_includes_instances_namespace_only_when_unbound() {
        let ctx = test_ctx();
        let (session_id, _) = initialize(&ctx, InitializeParams { client_name: None, client_version: None });
        let req = Request::call(RequestId::Number(1), methods::TOOLS_LIST, None);
        let resp = dispatch(&ctx, session_id, req).await.unwrap();
        let Response::Success { result, .. } = resp else { panic!("expected success") };
        let tools = result["tools"].as_array().unwrap();
        let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(names.contains(&methods::INSTANCES_LIST));
        assert!(!names.iter().any(|n| n.starts_with("hub_")));
    }

    #[tokio::test]
    async fn hub_prefixed_call_without_binding_reports_no_bound_peer() {
        let ctx = test_ctx();
        let (session_id, _) = initialize(&ctx, InitializeParams { client_name: None, client_version: None });
        let req = Request::call(
            RequestId::Number(1),
            methods::TOOLS_CALL,
            Some(json!({ "name": "hub_scripts/list", "arguments": {} })),
        );
        let resp = dispatch(&ctx, session_id, req).await.unwrap();
        assert!(resp.is_error());
    }

    #[tokio::test]
    async fn connecting_to_unknown_instance_reports_peer_unreachable() {
        let ctx = test_ctx();
        let (session_id, _) = initialize(&ctx, InitializeParams { client_name: None, client_version: None });
        let req = Request::call(
            RequestId::Number(1),
            methods::INSTANCES_CONNECT,
            Some(json!({ "instance_id": "inst-doesnotexist00000" })),
        );
        let resp = dispatch(&ctx, session_id, req).await.unwrap();
        assert!(resp.is_error());
    }

    #[tokio::test]
    async fn resources_are_not_federated() {
        let ctx = test_ctx();
        let (session_id, _) = initialize(&ctx, InitializeParams { client_name: None, client_version: None });
        let req = Request::call(RequestId::Number(1), methods::RESOURCES_LIST, None);
        let resp = dispatch(&ctx, session_id, req).await.unwrap();
        let Response::Success { result, .. } = resp else { panic!("expected success") };
        assert_eq!(result["resources"].as_array().unwrap().len(), 0);
    }
}
