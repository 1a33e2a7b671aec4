// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The two front ends onto the dispatch router: HTTP+SSE for networked
//! clients, newline-delimited JSON-RPC over stdio for a parent process that
//! spawned the instance directly.

pub mod http;
pub mod stdio;
