// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited JSON-RPC over stdio: the hub's only transport (spec.md
//! §4.8). One stdio connection is one session, created on the first
//! `initialize` and torn down when the stream closes. Relayed peer SSE
//! frames and locally-originated notifications share the same outbound
//! channel, so they interleave with responses on a single writer —
//! mirroring `brummer_instance::transport::stdio`, generalized with a
//! `tokio::select!` over that channel alongside stdin.

use std::sync::Arc;

use brummer_core::SessionId;
use brummer_wire::session_protocol::InitializeParams;
use brummer_wire::{methods, Request, Response, RpcError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::context::{HubContext, OutboundNotification};
use crate::dispatch;

/// Run the stdio loop to completion (stdin EOF, or a fatal read error).
pub async fn run(ctx: Arc<HubContext>, mut notify_rx: tokio::sync::mpsc::UnboundedReceiver<OutboundNotification>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut session_id: Option<SessionId> = None;

    loop {
        tokio::select! {
            biased;

            notification = notify_rx.recv() => {
                let Some(notification) = notification else { continue };
                write_raw(&mut stdout, &notification.0).await;
            }

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdio transport read error");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let request: Request = match serde_json::from_str(&line) {
                    Ok(r) => r,
                    Err(e) => {
                        write_response(&mut stdout, &Response::err(None, RpcError::parse_error(e.to_string()))).await;
                        continue;
                    }
                };

                if request.method == methods::INITIALIZE {
                    handle_initialize(&ctx, &mut stdout, &request, &mut session_id).await;
                    continue;
                }

                let Some(sid) = session_id else {
                    if let Some(rid) = request.id.clone() {
                        write_response(&mut stdout, &Response::err(Some(rid), RpcError::invalid_request("session not established"))).await;
                    }
                    continue;
                };

                if let Some(response) = dispatch::dispatch(&ctx, sid, request).await {
                    write_response(&mut stdout, &response).await;
                }
            }
        }
    }

    if let Some(sid) = session_id {
        ctx.sessions.remove(sid);
    }
}

async fn handle_initialize(
    ctx: &Arc<HubContext>,
    stdout: &mut tokio::io::Stdout,
    request: &Request,
    session_id: &mut Option<SessionId>,
) {
    let params: InitializeParams = match request.params.clone() {
        Some(v) => match serde_json::from_value(v) {
            Ok(p) => p,
            Err(e) => {
                if let Some(rid) = request.id.clone() {
                    write_response(stdout, &Response::err(Some(rid), RpcError::invalid_params(e.to_string()))).await;
                }
                return;
            }
        },
        None => InitializeParams { client_name: None, client_version: None },
    };

    let (id, result) = dispatch::initialize(ctx, params);
    *session_id = Some(id);

    let Some(rid) = request.id.clone() else { return };
    match serde_json::to_value(result) {
        Ok(value) => write_response(stdout, &Response::ok(rid, value)).await,
        Err(e) => write_response(stdout, &Response::err(Some(rid), RpcError::internal_error(e.to_string()))).await,
    }
}

async fn write_response(stdout: &mut tokio::io::Stdout, response: &Response) {
    let Ok(line) = serde_json::to_string(response) else {
        return;
    };
    write_raw(stdout, &line).await;
}

async fn write_raw(stdout: &mut tokio::io::Stdout, payload: &str) {
    let mut line = payload.to_string();
    line.push('\n');
    if let Err(e) = stdout.write_all(line.as_bytes()).await {
        tracing::warn!(error = %e, "stdio transport write error");
        return;
    }
    let _ = stdout.flush().await;
}
