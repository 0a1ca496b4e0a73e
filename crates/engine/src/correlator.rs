// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue correlation.
//!
//! After a scan finishes, its findings are labelled against the previous
//! scan of the same (target, plan): new findings become `Current` with
//! `OldStatus = "-"`, recurring ones become `Current` carrying their
//! previous status, and findings the previous scan had but the new one
//! lacks are re-attached to the matching session and labelled `Fixed`.
//! The `Fixed` label only applies when that session finished cleanly; a
//! dirty scan cannot assert a fix.
//!
//! Every status write stamps the issue with the scan it was correlated
//! for, so re-running the pass is a fixpoint: stamped issues are left
//! alone and already-attached references are not attached twice.

use crate::error::EngineError;
use std::sync::Arc;
use warden_core::{IssueStatus, Scan, ScanId, SessionState};
use warden_storage::Repository;

#[derive(Clone)]
pub struct Correlator {
    repo: Arc<dyn Repository>,
}

impl Correlator {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Correlate the most recent finished scan of `scan_id`'s (target,
    /// plan) pair against its predecessor. Idempotent.
    pub async fn correlate(&self, scan_id: &ScanId) -> Result<(), EngineError> {
        let scan = self
            .repo
            .scan(scan_id)
            .await?
            .ok_or_else(|| EngineError::ScanNotFound(scan_id.clone()))?;

        let mut history = self
            .repo
            .scans_for(&scan.configuration.target, &scan.plan.name)
            .await?;
        if history.is_empty() {
            return Ok(());
        }
        let latest = history.remove(0);
        let prior = history.into_iter().next();

        match prior {
            None => self.mark_first_scan(&latest).await,
            Some(prior) => {
                self.classify_latest(&latest, &prior).await?;
                self.detect_fixes(&latest, &prior).await
            }
        }
    }

    /// First scan of this (target, plan): every finding is new.
    async fn mark_first_scan(&self, latest: &Scan) -> Result<(), EngineError> {
        for session in &latest.sessions {
            for issue_id in &session.issues {
                self.set_status(latest, issue_id, IssueStatus::Current, IssueStatus::Unset)
                    .await?;
            }
        }
        Ok(())
    }

    /// Pass 1: label every finding the latest scan references.
    async fn classify_latest(&self, latest: &Scan, prior: &Scan) -> Result<(), EngineError> {
        for session in &latest.sessions {
            for issue_id in &session.issues {
                let Some(issue) = self.repo.issue(issue_id).await? else {
                    tracing::warn!(issue_id = %issue_id, "referenced issue has no document");
                    continue;
                };
                // Already correlated for this scan (re-run, or a reference
                // this correlator attached itself): leave it be.
                if issue.correlated.as_ref() == Some(&latest.id) {
                    continue;
                }
                let in_prior = prior.sessions.iter().any(|p| p.issues.contains(issue_id));
                let old_status = if in_prior { issue.status } else { IssueStatus::Unset };
                self.set_status(latest, issue_id, IssueStatus::Current, old_status).await?;
            }
        }
        Ok(())
    }

    /// Pass 2: findings of the prior scan that the matching session of the
    /// latest scan no longer reports. Re-attach them so the timeline stays
    /// navigable from the latest scan, and label them `Fixed` iff that
    /// session finished cleanly.
    async fn detect_fixes(&self, latest: &Scan, prior: &Scan) -> Result<(), EngineError> {
        for prior_session in &prior.sessions {
            let Some(current) = latest.session_for_plugin(&prior_session.plugin.name) else {
                continue;
            };
            for issue_id in &prior_session.issues {
                if current.issues.contains(issue_id) {
                    continue;
                }
                let Some(issue) = self.repo.issue(issue_id).await? else {
                    tracing::warn!(issue_id = %issue_id, "referenced issue has no document");
                    continue;
                };
                if issue.correlated.as_ref() == Some(&latest.id) {
                    continue;
                }
                self.repo.push_session_issue(&latest.id, &current.id, issue_id).await?;
                let status = if current.state == SessionState::Finished {
                    IssueStatus::Fixed
                } else {
                    issue.status
                };
                self.set_status(latest, issue_id, status, issue.status).await?;
            }
        }
        Ok(())
    }

    async fn set_status(
        &self,
        latest: &Scan,
        issue_id: &warden_core::IssueId,
        status: IssueStatus,
        old_status: IssueStatus,
    ) -> Result<(), EngineError> {
        match self.repo.set_issue_status(issue_id, status, old_status, &latest.id).await {
            Ok(()) => Ok(()),
            Err(warden_storage::StorageError::IssueNotFound(id)) => {
                tracing::warn!(issue_id = %id, "skipping status write for missing issue");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
#[path = "correlator_tests.rs"]
mod tests;
