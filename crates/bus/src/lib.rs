// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-bus: named, FIFO work queues with per-queue workers.
//!
//! A job is enqueued onto a named queue and runs on one of that queue's
//! worker loops. The caller gets an opaque [`TaskHandle`] it can wait on or
//! revoke. Revoking a pending task completes it as `Revoked` without it ever
//! running; revoking a running task with `terminate` trips the task's
//! cancellation token (the in-process equivalent of delivering the graceful
//! stop signal) and the task completes as `Revoked` when its handler
//! returns.
//!
//! Ordering: FIFO per queue, no ordering across queues. A queue served with
//! concurrency 1 is a serialisation point; the `state` queue relies on this
//! so all mutations for one scan apply in enqueue order.

mod bus;
mod error;
mod task;

pub use bus::TaskBus;
pub use error::BusError;
pub use task::{RevokeOptions, Task, TaskHandle, TaskHandler, TaskId, TaskResult};
