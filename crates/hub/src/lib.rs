// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! brummer-hub: federates several Instance Servers behind one stdio
//! JSON-RPC front end. Discovers peers over the shared filesystem registry,
//! holds a stateful connection to each with health pings and reconnect
//! backoff, and proxies `hub_`-prefixed tool calls through to whichever
//! peer the caller's session is bound to (spec.md §4.7, §4.8).

pub mod client;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod relay;
pub mod session;
pub mod transport;

pub use client::PeerClient;
pub use connection::ConnectionManager;
pub use context::HubContext;
pub use error::HubError;
