// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The state writer: single consumer of the `state` queue.
//!
//! Every scan and session mutation flows through here, so writes for one
//! scan are observed in enqueue order. Op failures are bookkeeping
//! failures: logged, never re-raised past the task boundary.
//!
//! Terminal-write discipline: a session or scan state that is already
//! terminal is never overwritten, with one deliberate exception. A session
//! patched `STOPPED` by a stop request may still be refined by the runner's
//! authoritative finish report (e.g. a plugin that ignored the graceful
//! signal ends `FAILED`, not `STOPPED`).

use crate::callback::CallbackClient;
use crate::correlator::Correlator;
use crate::error::EngineError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use warden_bus::{BusError, RevokeOptions, Task, TaskBus, TaskHandler, TaskResult};
use warden_core::{Failure, Scan, ScanId, ScanState, SessionId, SessionState, StateOp};
use warden_storage::{Repository, ScanPatch, SessionPatch};

/// Enqueue-and-wait client for the `state` queue, used by the workflow and
/// the plugin runner to apply mutations in order.
#[derive(Clone)]
pub struct StateClient {
    bus: TaskBus,
    queue: String,
}

impl StateClient {
    pub fn new(bus: TaskBus, queue: impl Into<String>) -> Self {
        Self { bus, queue: queue.into() }
    }

    /// Ship the op to the state queue and wait for it to be applied.
    pub async fn apply(&self, op: StateOp) -> Result<(), EngineError> {
        let payload = serde_json::to_value(&op)?;
        let handle = self.bus.enqueue(&self.queue, op.name(), payload)?;
        match self.bus.wait(&handle.id).await? {
            TaskResult::Completed(_) => Ok(()),
            TaskResult::Revoked => {
                tracing::warn!(op = op.name(), "state op revoked before it was applied");
                Ok(())
            }
            TaskResult::Failed(message) => Err(EngineError::Bus(BusError::Task(message))),
        }
    }
}

/// Applies [`StateOp`]s to the repository.
pub struct StateWriter {
    repo: Arc<dyn Repository>,
    bus: TaskBus,
    correlator: Correlator,
    callback: CallbackClient,
}

impl StateWriter {
    pub fn new(repo: Arc<dyn Repository>, bus: TaskBus, callback: CallbackClient) -> Self {
        let correlator = Correlator::new(Arc::clone(&repo));
        Self { repo, bus, correlator, callback }
    }

    pub async fn apply(&self, op: StateOp) -> Result<(), EngineError> {
        match op {
            StateOp::ScanStart { scan, at } => self.scan_start(&scan, at).await,
            StateOp::ScanFinish { scan, state, at, failure } => {
                self.scan_finish(&scan, state, at, failure).await
            }
            StateOp::ScanStop { scan, at } => self.scan_stop(&scan, at).await,
            StateOp::SessionQueue { scan, session, at } => {
                self.session_transition(&scan, &session, SessionState::Queued, at).await
            }
            StateOp::SessionStart { scan, session, at } => {
                self.session_transition(&scan, &session, SessionState::Started, at).await
            }
            StateOp::SessionSetTask { scan, session, task } => {
                self.session_set_task(&scan, &session, task).await
            }
            StateOp::SessionReportIssue { scan, session, issue } => {
                let issue_id = issue.id.clone();
                self.repo.upsert_issue(issue).await?;
                self.repo.push_session_issue(&scan, &session, &issue_id).await?;
                Ok(())
            }
            StateOp::SessionReportArtifact { scan, session, artifact } => {
                self.repo.push_session_artifact(&scan, &session, artifact).await?;
                Ok(())
            }
            StateOp::SessionFinish { scan, session, state, at, failure } => {
                self.session_finish(&scan, &session, state, at, failure).await
            }
            StateOp::CorrelateIssues { scan } => {
                if let Err(err) = self.correlator.correlate(&scan).await {
                    tracing::warn!(scan_id = %scan, error = %err, "(ignored) correlation failed");
                }
                Ok(())
            }
        }
    }

    async fn scan_start(&self, scan: &ScanId, at: DateTime<Utc>) -> Result<(), EngineError> {
        let Some(doc) = self.load(scan).await? else {
            return Ok(());
        };
        if doc.state.is_terminal() {
            tracing::debug!(scan_id = %scan, state = %doc.state, "ignoring start of terminal scan");
            return Ok(());
        }
        self.repo
            .update_scan(scan, ScanPatch::new().state(ScanState::Started).started(at))
            .await?;
        Ok(())
    }

    /// Terminal transition. Applies the state exactly once; the cancel
    /// sweep over still-`CREATED` sessions runs even on replays so a stop
    /// and a late finish cannot strand a session in `CREATED`.
    async fn scan_finish(
        &self,
        scan: &ScanId,
        state: ScanState,
        at: DateTime<Utc>,
        failure: Option<Failure>,
    ) -> Result<(), EngineError> {
        let Some(doc) = self.load(scan).await? else {
            return Ok(());
        };

        if doc.state.is_terminal() {
            tracing::debug!(
                scan_id = %scan,
                state = %doc.state,
                requested = %state,
                "scan already terminal, running cancel sweep only"
            );
            self.cancel_created_sessions(&doc, at).await?;
            return Ok(());
        }

        let outcome: Result<(), EngineError> = async {
            let mut patch = ScanPatch::new().state(state).finished(at);
            if let Some(failure) = failure {
                patch = patch.failure(failure);
            }
            self.repo.update_scan(scan, patch).await?;
            self.cancel_created_sessions(&doc, at).await?;
            Ok(())
        }
        .await;

        if let Err(err) = outcome {
            tracing::error!(scan_id = %scan, error = %err, "error finishing scan, marking it FAILED");
            let fallback = ScanPatch::new().state(ScanState::Failed).finished(at);
            if let Err(err) = self.repo.update_scan(scan, fallback).await {
                tracing::error!(scan_id = %scan, error = %err, "error marking scan FAILED");
            }
            return Ok(());
        }

        self.notify_callback(&doc, state).await;

        // Correlation happens exactly once, on the clean-completion states.
        // Aborted and stopped scans ran no (or partial) plugins and must not
        // relabel issue history.
        if matches!(state, ScanState::Finished | ScanState::Failed) {
            if let Err(err) = self.correlator.correlate(scan).await {
                tracing::warn!(scan_id = %scan, error = %err, "(ignored) correlation failed");
            }
        }
        Ok(())
    }

    /// External stop: terminal-patch the scan, stop live sessions, cancel
    /// unstarted ones, and revoke every persisted task handle.
    async fn scan_stop(&self, scan: &ScanId, at: DateTime<Utc>) -> Result<(), EngineError> {
        let Some(doc) = self.load(scan).await? else {
            return Ok(());
        };
        if doc.state.is_terminal() {
            tracing::debug!(scan_id = %scan, state = %doc.state, "stop of terminal scan is a no-op");
            return Ok(());
        }

        let outcome: Result<(), EngineError> = async {
            self.repo
                .update_scan(scan, ScanPatch::new().state(ScanState::Stopped).finished(at))
                .await?;
            for session in &doc.sessions {
                match session.state {
                    SessionState::Queued | SessionState::Started => {
                        self.repo
                            .update_session(
                                scan,
                                &session.id,
                                SessionPatch::new().state(SessionState::Stopped).finished(at),
                            )
                            .await?;
                    }
                    SessionState::Created => {
                        self.repo
                            .update_session(
                                scan,
                                &session.id,
                                SessionPatch::new().state(SessionState::Cancelled).finished(at),
                            )
                            .await?;
                    }
                    _ => {}
                }
                if let Some(task) = &session.task {
                    self.bus.revoke(&task.as_str().into(), RevokeOptions { terminate: true });
                }
            }
            Ok(())
        }
        .await;

        if let Err(err) = outcome {
            tracing::error!(scan_id = %scan, error = %err, "error stopping scan, marking it FAILED");
            let fallback = ScanPatch::new().state(ScanState::Failed).finished(at);
            if let Err(err) = self.repo.update_scan(scan, fallback).await {
                tracing::error!(scan_id = %scan, error = %err, "error marking scan FAILED");
            }
            return Ok(());
        }

        self.notify_callback(&doc, ScanState::Stopped).await;
        Ok(())
    }

    async fn session_transition(
        &self,
        scan: &ScanId,
        session: &SessionId,
        state: SessionState,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let Some(doc) = self.load(scan).await? else {
            return Ok(());
        };
        if doc.state.refuses_work() {
            tracing::debug!(
                scan_id = %scan,
                session_id = %session,
                scan_state = %doc.state,
                "scan accepts no more work, dropping session transition"
            );
            return Ok(());
        }
        let Some(current) = doc.session(session) else {
            tracing::warn!(scan_id = %scan, session_id = %session, "session transition for unknown session");
            return Ok(());
        };
        if current.state.is_terminal() {
            tracing::debug!(
                scan_id = %scan,
                session_id = %session,
                state = %current.state,
                "ignoring transition of terminal session"
            );
            return Ok(());
        }
        let patch = match state {
            SessionState::Queued => SessionPatch::new().state(state).queued(at),
            _ => SessionPatch::new().state(state).started(at),
        };
        self.repo.update_session(scan, session, patch).await?;
        Ok(())
    }

    async fn session_set_task(
        &self,
        scan: &ScanId,
        session: &SessionId,
        task: String,
    ) -> Result<(), EngineError> {
        let Some(doc) = self.load(scan).await? else {
            return Ok(());
        };
        let Some(current) = doc.session(session) else {
            tracing::warn!(scan_id = %scan, session_id = %session, "task handle for unknown session");
            return Ok(());
        };
        // The handle is set exactly once and never cleared
        if current.task.is_some() {
            tracing::warn!(scan_id = %scan, session_id = %session, "session already has a task handle");
            return Ok(());
        }
        self.repo.update_session(scan, session, SessionPatch::new().task(task)).await?;
        Ok(())
    }

    async fn session_finish(
        &self,
        scan: &ScanId,
        session: &SessionId,
        state: SessionState,
        at: DateTime<Utc>,
        failure: Option<Failure>,
    ) -> Result<(), EngineError> {
        let Some(doc) = self.load(scan).await? else {
            return Ok(());
        };
        let Some(current) = doc.session(session) else {
            tracing::warn!(scan_id = %scan, session_id = %session, "finish for unknown session");
            return Ok(());
        };
        // Stop-patched STOPPED may be refined by the runner's report; any
        // other terminal state is final.
        if current.state.is_terminal() && current.state != SessionState::Stopped {
            tracing::debug!(
                scan_id = %scan,
                session_id = %session,
                state = %current.state,
                requested = %state,
                "session already terminal, dropping finish"
            );
            return Ok(());
        }
        let mut patch = SessionPatch::new().state(state).finished(at);
        if let Some(failure) = failure {
            patch = patch.failure(failure);
        }
        self.repo.update_session(scan, session, patch).await?;
        Ok(())
    }

    async fn cancel_created_sessions(
        &self,
        doc: &Scan,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        for session in doc.unstarted_sessions() {
            self.repo
                .update_session(
                    &doc.id,
                    &session.id,
                    SessionPatch::new().state(SessionState::Cancelled).finished(at),
                )
                .await?;
        }
        Ok(())
    }

    async fn notify_callback(&self, doc: &Scan, state: ScanState) {
        if let Some(callback) = &doc.configuration.callback {
            self.callback.scan_state(&callback.url, &doc.id, state).await;
        }
    }

    async fn load(&self, scan: &ScanId) -> Result<Option<Scan>, EngineError> {
        let doc = self.repo.scan(scan).await?;
        if doc.is_none() {
            tracing::warn!(scan_id = %scan, "state op for unknown scan");
        }
        Ok(doc)
    }
}

#[async_trait]
impl TaskHandler for StateWriter {
    async fn run(&self, task: Task) -> Result<serde_json::Value, BusError> {
        let op: StateOp = match serde_json::from_value(task.payload) {
            Ok(op) => op,
            Err(err) => {
                tracing::error!(task = %task.id, error = %err, "undecodable state op");
                return Ok(serde_json::Value::Null);
            }
        };
        // Bookkeeping failures are logged, never re-raised
        if let Err(err) = self.apply(op).await {
            tracing::error!(task = %task.id, name = %task.name, error = %err, "state op failed");
        }
        Ok(serde_json::Value::Null)
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
