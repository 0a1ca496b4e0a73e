// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Task bus errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("no worker serves queue: {0}")]
    QueueNotServed(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("task failed: {0}")]
    Task(String),
}
