// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan: the root aggregate, one execution of a plan against a target.

use crate::clock::Clock;
use crate::failure::Failure;
use crate::plan::{Plan, PluginRegistry};
use crate::session::{Session, SessionId, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanId(pub String);

impl ScanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random scan id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ScanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ScanId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for ScanId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ScanId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for ScanId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Scan lifecycle states.
///
/// `STOPPING` is written by the stop control between `STARTED` and `STOPPED`
/// to signal intent; workers treat it like `STOPPED` and refuse further work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanState {
    Created,
    Queued,
    Started,
    Stopping,
    Finished,
    Failed,
    Stopped,
    Aborted,
}

impl ScanState {
    /// Terminal states permit no further transitions (except the correlator
    /// re-attaching fixed-issue references to sessions).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanState::Finished | ScanState::Failed | ScanState::Stopped | ScanState::Aborted
        )
    }

    /// A scan in this state accepts no more plugin work.
    pub fn refuses_work(self) -> bool {
        self.is_terminal() || self == ScanState::Stopping
    }
}

crate::simple_display! {
    ScanState {
        Created => "CREATED",
        Queued => "QUEUED",
        Started => "STARTED",
        Stopping => "STOPPING",
        Finished => "FINISHED",
        Failed => "FAILED",
        Stopped => "STOPPED",
        Aborted => "ABORTED",
    }
}

/// Webhook target notified when the scan reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callback {
    pub url: String,
}

/// User-supplied scan configuration. `target` is the only required field;
/// everything else is forwarded verbatim into each session's merged
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<Callback>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScanConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            callback: None,
            tags: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Top-level merge of a plan step's configuration with this scan
    /// configuration. Scan fields win on conflicts.
    pub fn merged_with(
        &self,
        step: &serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut merged = step.clone();
        if let Ok(serde_json::Value::Object(own)) = serde_json::to_value(self) {
            for (key, value) in own {
                merged.insert(key, value);
            }
        }
        merged
    }
}

/// Who requested the scan, plus free-form labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScanMeta {
    pub user: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Reference to the plan a scan executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRef {
    pub name: String,
    #[serde(default)]
    pub revision: u32,
}

/// The root aggregate: one execution of a plan against a target.
///
/// Once `state` is terminal the document is immutable, except for the
/// correlator attaching fixed-issue references to its sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    pub state: ScanState,
    pub created: Option<DateTime<Utc>>,
    pub queued: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub plan: PlanRef,
    pub configuration: ScanConfig,
    pub sessions: Vec<Session>,
    pub meta: ScanMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl Scan {
    /// Assemble a `CREATED` scan from a plan: fresh ids, one session per
    /// workflow step with the step configuration merged under the scan
    /// configuration, all timestamps except `created` unset.
    ///
    /// Fails when a step names a plugin the registry does not know.
    pub fn assemble(
        plan: &Plan,
        configuration: ScanConfig,
        meta: ScanMeta,
        plugins: &PluginRegistry,
        clock: &impl Clock,
    ) -> Result<Self, UnknownPlugin> {
        let now = clock.now_utc();
        let mut sessions = Vec::with_capacity(plan.workflow.len());
        for step in &plan.workflow {
            let descriptor = plugins
                .descriptor(&step.plugin_name)
                .ok_or_else(|| UnknownPlugin(step.plugin_name.clone()))?;
            sessions.push(Session::new(
                descriptor.clone(),
                configuration.merged_with(&step.configuration),
                step.description.clone(),
                now,
            ));
        }
        Ok(Self {
            id: ScanId::generate(),
            state: ScanState::Created,
            created: Some(now),
            queued: None,
            started: None,
            finished: None,
            plan: PlanRef { name: plan.name.clone(), revision: plan.revision },
            configuration,
            sessions,
            meta,
            failure: None,
        })
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == *id)
    }

    pub fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == *id)
    }

    /// First session running the named plugin, used by the correlator to
    /// line sessions up across scans of the same plan.
    pub fn session_for_plugin(&self, plugin_name: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.plugin.name == plugin_name)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Sessions still `CREATED`, the ones a terminal transition cancels.
    pub fn unstarted_sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(|s| s.state == SessionState::Created)
    }
}

/// A plan step referenced a plugin missing from the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plugin: {0}")]
pub struct UnknownPlugin(pub String);

crate::builder! {
    pub struct ScanBuilder => Scan {
        into {
            id: ScanId = "scan-1",
        }
        set {
            state: ScanState = ScanState::Created,
            plan: PlanRef = PlanRef { name: "baseline".to_string(), revision: 0 },
            configuration: ScanConfig = ScanConfig::new("http://127.0.0.1"),
            sessions: Vec<Session> = Vec::new(),
            meta: ScanMeta = ScanMeta::default(),
        }
        option {
            created: DateTime<Utc> = None,
            queued: DateTime<Utc> = None,
            started: DateTime<Utc> = None,
            finished: DateTime<Utc> = None,
            failure: Failure = None,
        }
    }
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
