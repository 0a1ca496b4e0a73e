// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed sub-document patches.
//!
//! A patch only touches the fields it carries; set fields overwrite whatever
//! the document holds. State-machine legality is the state writer's concern,
//! not the patch's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{Failure, Scan, ScanState, Session, SessionState};

/// Field-level patch for a scan document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ScanState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl ScanPatch {
    pub fn new() -> Self {
        Self::default()
    }

    warden_core::setters! {
        option {
            state: ScanState,
            queued: DateTime<Utc>,
            started: DateTime<Utc>,
            finished: DateTime<Utc>,
            failure: Failure,
        }
    }

    pub fn apply(self, scan: &mut Scan) {
        if let Some(state) = self.state {
            scan.state = state;
        }
        if let Some(queued) = self.queued {
            scan.queued = Some(queued);
        }
        if let Some(started) = self.started {
            scan.started = Some(started);
        }
        if let Some(finished) = self.finished {
            scan.finished = Some(finished);
        }
        if let Some(failure) = self.failure {
            scan.failure = Some(failure);
        }
    }
}

/// Field-level patch for a session embedded in a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    warden_core::setters! {
        option {
            state: SessionState,
            queued: DateTime<Utc>,
            started: DateTime<Utc>,
            finished: DateTime<Utc>,
            failure: Failure,
            task: String,
        }
    }

    pub fn apply(self, session: &mut Session) {
        if let Some(state) = self.state {
            session.state = state;
        }
        if let Some(queued) = self.queued {
            session.queued = Some(queued);
        }
        if let Some(started) = self.started {
            session.started = Some(started);
        }
        if let Some(finished) = self.finished {
            session.finished = Some(finished);
        }
        if let Some(failure) = self.failure {
            session.failure = Some(failure);
        }
        if let Some(task) = self.task {
            session.task = Some(task);
        }
    }
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
