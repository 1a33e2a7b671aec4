// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP+SSE transport: `POST /mcp` carries one request or a batch, `GET
//! /mcp` upgrades to an SSE stream of the session's notification and
//! tool-progress frames (spec.md §4.5, §5).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::headers::{Error as HeaderError, Header};
use axum_extra::TypedHeader;
use brummer_core::{SessionId, Transport};
use brummer_wire::session_protocol::InitializeParams;
use brummer_wire::{methods, Request, RequestId, Response, RpcError};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::InstanceContext;
use crate::dispatch;

static SESSION_HEADER_NAME: HeaderName = HeaderName::from_static("mcp-session-id");

/// Typed view of the `Mcp-Session-Id` header, present on every request after
/// the first `initialize` call.
struct McpSessionId(String);

impl Header for McpSessionId {
    fn name() -> &'static HeaderName {
        &SESSION_HEADER_NAME
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, HeaderError>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(HeaderError::invalid)?;
        let s = value.to_str().map_err(|_| HeaderError::invalid())?;
        Ok(McpSessionId(s.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

/// A POST body is either one request or a JSON-RPC batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Batch(Vec<Request>),
    Single(Request),
}

pub fn router(ctx: Arc<InstanceContext>) -> Router {
    Router::new()
        .route("/mcp", post(handle_post))
        .route("/mcp", get(handle_sse))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn handle_post(
    State(ctx): State<Arc<InstanceContext>>,
    session_header: Option<TypedHeader<McpSessionId>>,
    Json(payload): Json<Payload>,
) -> AxumResponse {
    let requests = match payload {
        Payload::Batch(reqs) => reqs,
        Payload::Single(req) => vec![req],
    };
    if requests.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({
            "error": RpcError::invalid_request("empty batch"),
        })))
            .into_response();
    }

    let mut session_id = session_header.map(|h| SessionId::from_string(&h.0 .0));
    let mut responses = Vec::new();

    for request in requests {
        if request.method == methods::INITIALIZE {
            let params: InitializeParams = match request.params.clone() {
                Some(v) => match serde_json::from_value(v) {
                    Ok(p) => p,
                    Err(e) => {
                        push_error(&mut responses, request.id.clone(), RpcError::invalid_params(e.to_string()));
                        continue;
                    }
                },
                None => InitializeParams { client_name: None, client_version: None },
            };
            let (new_id, result) = dispatch::initialize(&ctx, Transport::HttpSse, params);
            session_id = Some(new_id);
            if let Some(id) = request.id.clone() {
                match serde_json::to_value(result) {
                    Ok(value) => responses.push(Response::ok(id, value)),
                    Err(e) => push_error(&mut responses, Some(id), RpcError::internal_error(e.to_string())),
                }
            }
            continue;
        }

        let Some(sid) = session_id else {
            push_error(&mut responses, request.id.clone(), RpcError::session_unknown("no Mcp-Session-Id header"));
            continue;
        };
        if let Some(response) = dispatch::dispatch(&ctx, sid, request).await {
            responses.push(response);
        }
    }

    let mut http_response = if responses.is_empty() {
        StatusCode::NO_CONTENT.into_response()
    } else if responses.len() == 1 {
        let value = responses
            .into_iter()
            .next()
            .map(|r| serde_json::to_value(r).unwrap_or(serde_json::Value::Null))
            .unwrap_or(serde_json::Value::Null);
        Json(value).into_response()
    } else {
        Json(responses.into_iter().map(|r| serde_json::to_value(r).unwrap_or(serde_json::Value::Null)).collect::<Vec<_>>())
            .into_response()
    };

    if let Some(sid) = session_id {
        if let Ok(value) = HeaderValue::from_str(&sid.to_string()) {
            http_response.headers_mut().insert(SESSION_HEADER_NAME.clone(), value);
        }
    }
    http_response
}

fn push_error(responses: &mut Vec<Response>, id: Option<RequestId>, error: RpcError) {
    responses.push(Response::err(id, error));
}

async fn handle_sse(
    State(ctx): State<Arc<InstanceContext>>,
    TypedHeader(session_header): TypedHeader<McpSessionId>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<SseEvent, Infallible>>>, StatusCode> {
    let session_id = SessionId::from_string(&session_header.0);
    let rx = ctx.sessions.sse_receiver(session_id).ok_or(StatusCode::NOT_FOUND)?;

    let stream = BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(frame) => Some(Ok(SseEvent::default().data(frame.0))),
            Err(_lagged) => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive")))
}
