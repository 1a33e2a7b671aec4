// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The proxy, browser, telemetry, and REPL tools name collaborators that
//! live outside this crate entirely (spec.md §1: "treated as external
//! collaborators invoked through named interfaces only"). This trait is
//! that interface: the instance still advertises and routes the tools, but
//! executing one without a registered collaborator returns a structured
//! error rather than a compile-time dependency on code this crate doesn't
//! own.

use async_trait::async_trait;
use brummer_wire::params::{BrowserNavigateParams, BrowserOpenParams, BrowserScreenshotParams, ProxyRequestsParams, ReplExecuteParams};
use brummer_wire::CallToolResult;

#[async_trait]
pub trait ExternalCollaborators: Send + Sync {
    async fn proxy_requests(&self, _params: ProxyRequestsParams) -> CallToolResult {
        not_configured("proxy")
    }

    async fn telemetry_sessions(&self) -> CallToolResult {
        not_configured("telemetry")
    }

    async fn telemetry_events(&self) -> CallToolResult {
        not_configured("telemetry")
    }

    async fn browser_open(&self, _params: BrowserOpenParams) -> CallToolResult {
        not_configured("browser")
    }

    async fn browser_refresh(&self) -> CallToolResult {
        not_configured("browser")
    }

    async fn browser_navigate(&self, _params: BrowserNavigateParams) -> CallToolResult {
        not_configured("browser")
    }

    async fn browser_screenshot(&self, _params: BrowserScreenshotParams) -> CallToolResult {
        not_configured("browser")
    }

    async fn repl_execute(&self, _params: ReplExecuteParams) -> CallToolResult {
        not_configured("repl")
    }
}

fn not_configured(collaborator: &str) -> CallToolResult {
    CallToolResult::error(format!("{collaborator} collaborator is not wired into this instance"))
}

/// Default collaborator set: every tool reports itself unconfigured. An
/// embedder that wires in a real proxy/browser/telemetry/REPL integration
/// supplies its own [`ExternalCollaborators`] impl instead.
pub struct NullCollaborators;

impl ExternalCollaborators for NullCollaborators {}
