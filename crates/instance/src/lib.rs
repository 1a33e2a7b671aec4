// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! brummer-instance: the per-project JSON-RPC server. Supervises processes,
//! ingests their logs, classifies errors, and exposes all of it as MCP-style
//! tools and resources over HTTP+SSE or stdio (spec.md §4.5).

pub mod collaborators;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod notify;
pub mod resources;
pub mod session;
pub mod tools;
pub mod transport;

pub use context::InstanceContext;
pub use error::ProtocolError;
