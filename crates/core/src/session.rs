// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin session: one plugin's execution within a scan.

use crate::failure::Failure;
use crate::issue::IssueId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a plugin session within a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new SessionId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Session lifecycle states.
///
/// `CREATED → QUEUED → STARTED → terminal`, with two shortcuts:
/// `CREATED → CANCELLED` when the scan ends before the session is enqueued,
/// and `QUEUED → STOPPED` when a stop arrives before the plugin starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Created,
    Queued,
    Started,
    Finished,
    Failed,
    Stopped,
    Terminated,
    Timeout,
    Aborted,
    Cancelled,
}

impl SessionState {
    /// Terminal states permit no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Created | SessionState::Queued | SessionState::Started)
    }

    /// Whether `to` is a legal next state from `self`.
    pub fn permits(self, to: SessionState) -> bool {
        match self {
            SessionState::Created => {
                matches!(to, SessionState::Queued | SessionState::Cancelled)
            }
            SessionState::Queued => to == SessionState::Started || to.is_terminal(),
            SessionState::Started => to.is_terminal(),
            _ => false,
        }
    }
}

crate::simple_display! {
    SessionState {
        Created => "CREATED",
        Queued => "QUEUED",
        Started => "STARTED",
        Finished => "FINISHED",
        Failed => "FAILED",
        Stopped => "STOPPED",
        Terminated => "TERMINATED",
        Timeout => "TIMEOUT",
        Aborted => "ABORTED",
        Cancelled => "CANCELLED",
    }
}

/// Queue weight class of a plugin, used to route its session to a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightClass {
    Heavy,
    Light,
    /// Anything else routes to the shared plugin queue.
    #[default]
    Unspecified,
}

impl<'de> Deserialize<'de> for WeightClass {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Plugins may declare weights this revision does not route on;
        // anything unknown falls back to the shared queue.
        let weight = String::deserialize(deserializer)?;
        Ok(match weight.as_str() {
            "heavy" => WeightClass::Heavy,
            "light" => WeightClass::Light,
            _ => WeightClass::Unspecified,
        })
    }
}

crate::simple_display! {
    WeightClass {
        Heavy => "heavy",
        Light => "light",
        Unspecified => "unspecified",
    }
}

/// Descriptor of the plugin a session runs: fully-qualified class for the
/// child process, stable name for cross-scan correlation, and weight class
/// for queue routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub class: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub weight: WeightClass,
}

/// One plugin execution embedded in a scan, ordered by workflow position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub plugin: PluginDescriptor,
    /// Merged configuration: plan step configuration updated with the scan
    /// configuration (scan wins on conflicts, top-level merge).
    pub configuration: serde_json::Map<String, serde_json::Value>,
    pub description: String,
    pub issues: Vec<IssueId>,
    pub artifacts: Vec<serde_json::Value>,
    pub created: Option<DateTime<Utc>>,
    pub queued: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    /// Reserved: progress messages are accepted but not recorded in this revision.
    #[serde(default)]
    pub progress: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    /// Task-bus handle assigned when the session is enqueued. Required for
    /// stop-time revocation; set exactly once and never cleared.
    #[serde(rename = "_task", default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

impl Session {
    /// Create a `CREATED` session for one workflow step.
    pub fn new(
        plugin: PluginDescriptor,
        configuration: serde_json::Map<String, serde_json::Value>,
        description: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            state: SessionState::Created,
            plugin,
            configuration,
            description: description.into(),
            issues: Vec::new(),
            artifacts: Vec::new(),
            created: Some(created),
            queued: None,
            started: None,
            finished: None,
            progress: None,
            failure: None,
            task: None,
        }
    }
}

crate::builder! {
    pub struct SessionBuilder => Session {
        into {
            id: SessionId = "session-1",
            description: String = "",
        }
        set {
            state: SessionState = SessionState::Created,
            plugin: PluginDescriptor = PluginDescriptor {
                class: "plugins.Basic".to_string(),
                name: "basic".to_string(),
                version: "0.1".to_string(),
                weight: WeightClass::Light,
            },
            configuration: serde_json::Map<String, serde_json::Value> = serde_json::Map::new(),
            issues: Vec<IssueId> = Vec::new(),
            artifacts: Vec<serde_json::Value> = Vec::new(),
        }
        option {
            created: DateTime<Utc> = None,
            queued: DateTime<Utc> = None,
            started: DateTime<Utc> = None,
            finished: DateTime<Utc> = None,
            progress: serde_json::Value = None,
            failure: Failure = None,
            task: String = None,
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
