// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-process task bus.

use crate::error::BusError;
use crate::task::{RevokeOptions, Task, TaskHandle, TaskHandler, TaskId, TaskResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

struct Envelope {
    id: TaskId,
    name: String,
    payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Pending,
    Running,
    Done(TaskResult),
}

struct EntryState {
    status: Status,
    revoked: bool,
}

struct TaskEntry {
    state: Mutex<EntryState>,
    notify: Notify,
    cancel: CancellationToken,
}

impl TaskEntry {
    fn new() -> Self {
        Self {
            state: Mutex::new(EntryState { status: Status::Pending, revoked: false }),
            notify: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    fn complete(&self, result: TaskResult) {
        {
            let mut state = self.state.lock();
            if matches!(state.status, Status::Done(_)) {
                return;
            }
            state.status = Status::Done(result);
        }
        self.notify.notify_waiters();
    }
}

#[derive(Default)]
struct BusInner {
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<Envelope>>>,
    tasks: Mutex<HashMap<String, Arc<TaskEntry>>>,
}

/// Named, durable-in-process work queues with per-queue worker loops.
#[derive(Clone, Default)]
pub struct TaskBus {
    inner: Arc<BusInner>,
}

impl TaskBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `concurrency` worker loops consuming the named queue.
    ///
    /// Workers run on the current tokio runtime and exit when the bus is
    /// dropped. Serving the same queue twice replaces the consumer for
    /// tasks enqueued afterwards.
    pub fn serve(&self, queue: &str, concurrency: usize, handler: Arc<dyn TaskHandler>) {
        let (tx, rx) = mpsc::unbounded_channel::<Envelope>();
        self.inner.queues.lock().insert(queue.to_string(), tx);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        for worker in 0..concurrency.max(1) {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let inner = Arc::clone(&self.inner);
            let queue = queue.to_string();
            tokio::spawn(async move {
                loop {
                    let envelope = { rx.lock().await.recv().await };
                    let Some(envelope) = envelope else {
                        break;
                    };
                    run_one(&inner, &handler, envelope, &queue, worker).await;
                }
            });
        }
    }

    /// Enqueue a task; returns a handle for waiting and revocation.
    pub fn enqueue(
        &self,
        queue: &str,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<TaskHandle, BusError> {
        let id = TaskId::generate();
        let entry = Arc::new(TaskEntry::new());
        self.inner.tasks.lock().insert(id.to_string(), entry);

        let sent = {
            let queues = self.inner.queues.lock();
            match queues.get(queue) {
                Some(tx) => {
                    let envelope =
                        Envelope { id: id.clone(), name: name.to_string(), payload };
                    tx.send(envelope).is_ok()
                }
                None => false,
            }
        };
        if !sent {
            self.inner.tasks.lock().remove(id.as_str());
            return Err(BusError::QueueNotServed(queue.to_string()));
        }
        Ok(TaskHandle { id, queue: queue.to_string() })
    }

    /// Block until the task completes or is revoked.
    pub async fn wait(&self, id: &TaskId) -> Result<TaskResult, BusError> {
        let entry = self.entry(id)?;
        loop {
            // Register interest before checking so a completion landing
            // between the check and the await cannot be missed
            let notified = entry.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Status::Done(result) = &entry.state.lock().status {
                return Ok(result.clone());
            }
            notified.await;
        }
    }

    /// Best-effort cancel. Pending tasks complete as `Revoked` without ever
    /// running. A running task's waiters observe `Revoked` promptly; with
    /// `terminate` set its cancellation token is tripped as well, so the
    /// handler can wind the work down gracefully. Revoking a finished or
    /// unknown task is a no-op.
    pub fn revoke(&self, id: &TaskId, options: RevokeOptions) {
        let Ok(entry) = self.entry(id) else {
            tracing::debug!(task_id = %id, "revoke for unknown task");
            return;
        };
        let running = {
            let mut state = entry.state.lock();
            match state.status {
                Status::Done(_) => return,
                Status::Pending => {
                    state.revoked = true;
                    false
                }
                Status::Running => {
                    state.revoked = true;
                    true
                }
            }
        };
        if running && options.terminate {
            entry.cancel.cancel();
        }
        entry.complete(TaskResult::Revoked);
        tracing::debug!(task_id = %id, terminate = options.terminate, "task revoked");
    }

    fn entry(&self, id: &TaskId) -> Result<Arc<TaskEntry>, BusError> {
        self.inner
            .tasks
            .lock()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| BusError::UnknownTask(id.to_string()))
    }
}

async fn run_one(
    inner: &Arc<BusInner>,
    handler: &Arc<dyn TaskHandler>,
    envelope: Envelope,
    queue: &str,
    worker: usize,
) {
    let entry = {
        let tasks = inner.tasks.lock();
        match tasks.get(envelope.id.as_str()) {
            Some(entry) => Arc::clone(entry),
            None => return,
        }
    };

    {
        let mut state = entry.state.lock();
        match state.status {
            // Revoked while pending: already completed as Revoked
            Status::Done(_) => return,
            _ => state.status = Status::Running,
        }
    }

    tracing::debug!(queue, worker, task = %envelope.id, name = %envelope.name, "task started");
    let task = Task {
        id: envelope.id.clone(),
        name: envelope.name,
        payload: envelope.payload,
        cancel: entry.cancel.clone(),
    };
    let outcome = handler.run(task).await;

    let revoked = entry.state.lock().revoked;
    let result = if revoked {
        TaskResult::Revoked
    } else {
        match outcome {
            Ok(value) => TaskResult::Completed(value),
            Err(err) => {
                tracing::warn!(queue, task = %envelope.id, error = %err, "task failed");
                TaskResult::Failed(err.to_string())
            }
        }
    };
    entry.complete(result);
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
