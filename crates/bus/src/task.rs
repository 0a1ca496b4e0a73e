// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identities, handles, results, and the handler trait.

use crate::error::BusError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Unique identifier for an enqueued task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for TaskId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque handle returned by `enqueue`, good for waiting and revocation.
/// The id alone is enough to revoke from another process once persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: TaskId,
    pub queue: String,
}

/// Terminal outcome of a task as observed by a waiter.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Completed(serde_json::Value),
    Revoked,
    Failed(String),
}

/// Options for [`crate::TaskBus::revoke`].
///
/// `terminate: false` only prevents a pending task from starting;
/// `terminate: true` additionally cancels a running task's token, which the
/// plugin runner materialises as the graceful stop signal to its child.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevokeOptions {
    pub terminate: bool,
}

/// One dequeued unit of work, as seen by a handler.
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub payload: serde_json::Value,
    /// Tripped when the task is revoked with `terminate`.
    pub cancel: CancellationToken,
}

/// Work executed by a queue's workers.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn run(&self, task: Task) -> Result<serde_json::Value, BusError>;
}
