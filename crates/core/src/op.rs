// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-mutation operations.
//!
//! Every scan and session field mutation is expressed as a [`StateOp`] and
//! shipped over the `state` queue, so all writes for one scan serialise
//! through a single consumer. Ops are idempotent: replaying them in enqueue
//! order reproduces the final persisted state.

use crate::failure::Failure;
use crate::issue::Issue;
use crate::scan::{ScanId, ScanState};
use crate::session::{SessionId, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StateOp {
    /// Scan moved to `STARTED` by the workflow.
    ScanStart { scan: ScanId, at: DateTime<Utc> },
    /// Scan reached a terminal state. Triggers the cancel sweep over
    /// still-`CREATED` sessions, the callback webhook, and correlation.
    ScanFinish {
        scan: ScanId,
        state: ScanState,
        at: DateTime<Utc>,
        failure: Option<Failure>,
    },
    /// External stop request: patch the scan and its live sessions to
    /// `STOPPED` and revoke every persisted session task handle.
    ScanStop { scan: ScanId, at: DateTime<Utc> },
    /// Session enqueued by the workflow.
    SessionQueue { scan: ScanId, session: SessionId, at: DateTime<Utc> },
    /// Session picked up by a plugin worker.
    SessionStart { scan: ScanId, session: SessionId, at: DateTime<Utc> },
    /// Task-bus handle persisted for stop-time revocation. Must land before
    /// the workflow starts waiting on the handle.
    SessionSetTask { scan: ScanId, session: SessionId, task: String },
    /// Plugin reported a finding: upsert the issue document and append its
    /// id to the session, in emission order.
    SessionReportIssue { scan: ScanId, session: SessionId, issue: Issue },
    /// Plugin produced an artifact; stored verbatim.
    SessionReportArtifact {
        scan: ScanId,
        session: SessionId,
        artifact: serde_json::Value,
    },
    /// Session reached a terminal state.
    SessionFinish {
        scan: ScanId,
        session: SessionId,
        state: SessionState,
        at: DateTime<Utc>,
        failure: Option<Failure>,
    },
    /// Re-run issue correlation for a finished scan.
    CorrelateIssues { scan: ScanId },
}

impl StateOp {
    /// Shard key: all ops for one scan must land on the same state consumer.
    pub fn scan_id(&self) -> &ScanId {
        match self {
            StateOp::ScanStart { scan, .. }
            | StateOp::ScanFinish { scan, .. }
            | StateOp::ScanStop { scan, .. }
            | StateOp::SessionQueue { scan, .. }
            | StateOp::SessionStart { scan, .. }
            | StateOp::SessionSetTask { scan, .. }
            | StateOp::SessionReportIssue { scan, .. }
            | StateOp::SessionReportArtifact { scan, .. }
            | StateOp::SessionFinish { scan, .. }
            | StateOp::CorrelateIssues { scan } => scan,
        }
    }

    /// Task name on the state queue, mirroring the persisted job log.
    pub fn name(&self) -> &'static str {
        match self {
            StateOp::ScanStart { .. } => "scan_start",
            StateOp::ScanFinish { .. } => "scan_finish",
            StateOp::ScanStop { .. } => "scan_stop",
            StateOp::SessionQueue { .. } => "session_queue",
            StateOp::SessionStart { .. } => "session_start",
            StateOp::SessionSetTask { .. } => "session_set_task_id",
            StateOp::SessionReportIssue { .. } => "session_report_issue",
            StateOp::SessionReportArtifact { .. } => "session_report_artifact",
            StateOp::SessionFinish { .. } => "session_finish",
            StateOp::CorrelateIssues { .. } => "set_status_issues",
        }
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
