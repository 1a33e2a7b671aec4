// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! brummer-eventbus: bounded worker-pool dispatch for [`brummer_core::Event`].

mod bus;

pub use bus::{EventBus, EventBusConfig, EventBusHandle, Handler, SubscriptionId};
