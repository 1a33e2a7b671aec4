// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP+SSE client the Connection Manager uses to reach one peer Instance
//! Server. One [`PeerClient`] is built per discovered peer and reused
//! across `initialize`, health pings, and proxied `tools/call`s for as
//! long as that peer stays known to the hub.

use std::time::Duration;

use brummer_core::InstanceDescriptor;
use brummer_wire::session_protocol::{InitializeParams, InitializeResult};
use brummer_wire::{methods, Request, RequestId, Response};
use serde_json::Value;

use crate::error::HubError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A thin JSON-RPC-over-HTTP client bound to one peer's `/mcp` endpoint.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    base_url: String,
}

impl PeerClient {
    pub fn new(descriptor: &InstanceDescriptor) -> Self {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default();
        Self { http, base_url: format!("http://{}/mcp", descriptor.addr) }
    }

    /// Call `initialize` on the peer, returning its freshly minted session id.
    pub async fn initialize(&self) -> Result<String, HubError> {
        let params = InitializeParams {
            client_name: Some("brummer-hub".to_string()),
            client_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        };
        let request = Request::call(
            RequestId::Number(1),
            methods::INITIALIZE,
            Some(serde_json::to_value(params).map_err(|e| HubError::Protocol(e.to_string()))?),
        );
        let response = self.post(None, &request).await?;
        let result: InitializeResult = result_of(response)?;
        Ok(result.session_id)
    }

    /// Send one JSON-RPC `ping`, treating any transport failure or error
    /// response as a failed health check (spec.md §4.7: "Health pings are
    /// JSON-RPC ping over the peer's HTTP transport").
    pub async fn ping(&self, session_id: &str) -> Result<(), HubError> {
        let request = Request::call(RequestId::Number(1), methods::PING, None);
        self.post(Some(session_id), &request).await.map(|_| ())
    }

    /// Forward one JSON-RPC call to the peer under `session_id`, returning
    /// its raw response envelope.
    pub async fn call(&self, session_id: &str, request: &Request) -> Result<Response, HubError> {
        self.post(Some(session_id), request).await
    }

    /// Open the peer's `/mcp` SSE stream for `session_id`. The caller reads
    /// the response body itself; see [`crate::relay`].
    pub async fn open_sse(&self, session_id: &str) -> Result<reqwest::Response, HubError> {
        let response = self
            .http
            .get(&self.base_url)
            .header("Mcp-Session-Id", session_id)
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        Ok(response)
    }

    async fn post(&self, session_id: Option<&str>, request: &Request) -> Result<Response, HubError> {
        let mut builder = self.http.post(&self.base_url).json(request);
        if let Some(sid) = session_id {
            builder = builder.header("Mcp-Session-Id", sid);
        }
        let http_response = builder.send().await?.error_for_status()?;
        if http_response.status() == reqwest::StatusCode::NO_CONTENT {
            return Err(HubError::Protocol("peer returned no content for a call expecting a response".to_string()));
        }
        let body: Value = http_response.json().await?;
        serde_json::from_value(body).map_err(|e| HubError::Protocol(e.to_string()))
    }
}

fn result_of<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, HubError> {
    match response {
        Response::Success { result, .. } => serde_json::from_value(result).map_err(|e| HubError::Protocol(e.to_string())),
        Response::Error { error, .. } => Err(HubError::PeerError(error)),
    }
}
