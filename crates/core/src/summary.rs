// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan summaries: the reporting view of a scan without full issue bodies.

use crate::issue::{Issue, IssueId, IssueStatus, Severity};
use crate::scan::{PlanRef, Scan, ScanConfig, ScanId, ScanMeta, ScanState};
use crate::session::{PluginDescriptor, SessionId, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-severity counts of live findings. Findings tagged `FalsePositive`,
/// `Ignored`, or `Fixed` do not count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// One row per session: which plugin ran and how it ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub plugin: PluginDescriptor,
    pub state: SessionState,
}

/// Basic info about a scan plus issue counts; no issue bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub id: ScanId,
    pub state: ScanState,
    pub meta: ScanMeta,
    pub configuration: ScanConfig,
    pub plan: PlanRef,
    pub sessions: Vec<SessionSummary>,
    pub created: Option<DateTime<Utc>>,
    pub queued: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub issues: SeverityCounts,
}

impl ScanSummary {
    /// Build a summary from a scan and a resolver for its referenced issues.
    /// Unresolvable references are skipped.
    pub fn build<F>(scan: &Scan, resolve: F) -> Self
    where
        F: Fn(&IssueId) -> Option<Issue>,
    {
        let mut counts = SeverityCounts::default();
        for session in &scan.sessions {
            for issue_id in &session.issues {
                let Some(issue) = resolve(issue_id) else {
                    continue;
                };
                if matches!(
                    issue.status,
                    IssueStatus::FalsePositive | IssueStatus::Ignored | IssueStatus::Fixed
                ) {
                    continue;
                }
                counts.record(issue.severity);
            }
        }
        Self {
            id: scan.id.clone(),
            state: scan.state,
            meta: scan.meta.clone(),
            configuration: scan.configuration.clone(),
            plan: scan.plan.clone(),
            sessions: scan
                .sessions
                .iter()
                .map(|s| SessionSummary {
                    id: s.id.clone(),
                    plugin: s.plugin.clone(),
                    state: s.state,
                })
                .collect(),
            created: scan.created,
            queued: scan.queued,
            finished: scan.finished,
            issues: counts,
        }
    }
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
