// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The repository contract consumed by the orchestration core.

use crate::error::StorageError;
use crate::patch::{ScanPatch, SessionPatch};
use async_trait::async_trait;
use warden_core::{Issue, IssueId, IssueStatus, Plan, Scan, ScanId, SessionId, Site};

/// Narrow storage interface over the scan, issue, plan, and site collections.
///
/// Implementations must make each operation atomic with respect to
/// concurrent readers. Linearisation of writes to one scan is provided by
/// the state queue, not by the repository.
#[async_trait]
pub trait Repository: Send + Sync {
    // Scans
    async fn insert_scan(&self, scan: Scan) -> Result<(), StorageError>;
    async fn scan(&self, id: &ScanId) -> Result<Option<Scan>, StorageError>;
    async fn update_scan(&self, id: &ScanId, patch: ScanPatch) -> Result<(), StorageError>;
    async fn update_session(
        &self,
        scan: &ScanId,
        session: &SessionId,
        patch: SessionPatch,
    ) -> Result<(), StorageError>;
    /// Append an issue reference to a session, preserving emission order.
    async fn push_session_issue(
        &self,
        scan: &ScanId,
        session: &SessionId,
        issue: &IssueId,
    ) -> Result<(), StorageError>;
    async fn push_session_artifact(
        &self,
        scan: &ScanId,
        session: &SessionId,
        artifact: serde_json::Value,
    ) -> Result<(), StorageError>;
    /// Scans for the same (target, plan name), most recent `created` first.
    async fn scans_for(&self, target: &str, plan_name: &str)
        -> Result<Vec<Scan>, StorageError>;

    // Issues
    /// Insert the issue if its `Id` is unseen; otherwise update `Severity`
    /// only. Status fields are never touched by an upsert.
    async fn upsert_issue(&self, issue: Issue) -> Result<(), StorageError>;
    async fn issue(&self, id: &IssueId) -> Result<Option<Issue>, StorageError>;
    /// Correlator-only write of the status pair, stamping the scan the
    /// correlation ran for.
    async fn set_issue_status(
        &self,
        id: &IssueId,
        status: IssueStatus,
        old_status: IssueStatus,
        correlated: &ScanId,
    ) -> Result<(), StorageError>;

    // Sites
    async fn insert_site(&self, site: Site) -> Result<(), StorageError>;
    async fn site(&self, url: &str) -> Result<Option<Site>, StorageError>;

    // Plans
    async fn insert_plan(&self, plan: Plan) -> Result<(), StorageError>;
    async fn plan(&self, name: &str) -> Result<Option<Plan>, StorageError>;
}
