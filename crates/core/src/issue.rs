// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Findings (issues): structured security observations reported by plugins.
//!
//! Issues are global documents keyed by a stable, content-derived `Id` the
//! plugin computes; sessions reference them by id. Field names on the wire
//! are the capitalised names of the plugin protocol (`Id`, `Code`, ...).

use crate::scan::ScanId;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Stable, plugin-supplied identifier of a finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueId(pub String);

impl IssueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IssueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IssueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for IssueId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for IssueId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for IssueId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Severity scale reported by plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

crate::simple_display! {
    Severity {
        Info => "Info",
        Low => "Low",
        Medium => "Medium",
        High => "High",
    }
}

/// Correlation status of a finding relative to the previous scan of the same
/// target and plan. `Unset` serialises as the `"-"` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IssueStatus {
    Current,
    Fixed,
    FalsePositive,
    Ignored,
    #[default]
    #[serde(rename = "-")]
    Unset,
}

crate::simple_display! {
    IssueStatus {
        Current => "Current",
        Fixed => "Fixed",
        FalsePositive => "FalsePositive",
        Ignored => "Ignored",
        Unset => "-",
    }
}

/// A finding document.
///
/// At most one document exists per `Id`. Re-reports only update `Severity`;
/// `Status`/`OldStatus` are owned by the correlator (and user tagging, which
/// lives outside the core).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "Id")]
    pub id: IssueId,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Severity")]
    pub severity: Severity,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Status", default)]
    pub status: IssueStatus,
    #[serde(rename = "OldStatus", default)]
    pub old_status: IssueStatus,
    /// Scan this issue was last correlated for. Lets a re-run of the
    /// correlator recognise work it already did, including references it
    /// attached itself, which keeps correlation idempotent.
    #[serde(rename = "Correlated", default, skip_serializing_if = "Option::is_none")]
    pub correlated: Option<ScanId>,
    /// Plugin-supplied details (URLs, evidence, descriptions, ...), stored verbatim.
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

crate::builder! {
    pub struct IssueBuilder => Issue {
        into {
            id: IssueId = "issue-1",
            code: String = "XS-0",
            summary: String = "Cross-site scripting",
        }
        set {
            severity: Severity = Severity::Medium,
            status: IssueStatus = IssueStatus::Unset,
            old_status: IssueStatus = IssueStatus::Unset,
            details: serde_json::Map<String, serde_json::Value> = serde_json::Map::new(),
        }
        option {
            correlated: ScanId = None,
        }
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
