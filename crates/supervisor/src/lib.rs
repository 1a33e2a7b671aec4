// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! brummer-supervisor: spawns, signals, and reaps child processes, capturing
//! stdout/stderr onto the [`brummer_eventbus::EventBus`] as `LogLine` events
//! and the process lifecycle as `ProcessStarted`/`ProcessExited` events.

mod line_reader;
mod signal;
mod spawn;
mod supervisor;

pub use signal::SignalError;
pub use supervisor::{Supervisor, SupervisorError};
