// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory repository backing tests and single-node deployments.

use crate::error::StorageError;
use crate::patch::{ScanPatch, SessionPatch};
use crate::repository::Repository;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use warden_core::{Issue, IssueId, IssueStatus, Plan, Scan, ScanId, SessionId, Site};

#[derive(Default)]
struct Collections {
    scans: HashMap<String, Scan>,
    issues: HashMap<String, Issue>,
    sites: HashMap<String, Site>,
    plans: HashMap<String, Plan>,
}

/// Document store held entirely in memory behind one lock, giving every
/// operation the per-call atomicity the contract requires.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    collections: Arc<Mutex<Collections>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_scan(&self, scan: Scan) -> Result<(), StorageError> {
        let mut c = self.collections.lock();
        if c.scans.contains_key(scan.id.as_str()) {
            return Err(StorageError::Duplicate(scan.id.to_string()));
        }
        c.scans.insert(scan.id.to_string(), scan);
        Ok(())
    }

    async fn scan(&self, id: &ScanId) -> Result<Option<Scan>, StorageError> {
        Ok(self.collections.lock().scans.get(id.as_str()).cloned())
    }

    async fn update_scan(&self, id: &ScanId, patch: ScanPatch) -> Result<(), StorageError> {
        let mut c = self.collections.lock();
        let scan = c
            .scans
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::ScanNotFound(id.clone()))?;
        patch.apply(scan);
        Ok(())
    }

    async fn update_session(
        &self,
        scan: &ScanId,
        session: &SessionId,
        patch: SessionPatch,
    ) -> Result<(), StorageError> {
        let mut c = self.collections.lock();
        let doc = c
            .scans
            .get_mut(scan.as_str())
            .ok_or_else(|| StorageError::ScanNotFound(scan.clone()))?;
        let target = doc
            .session_mut(session)
            .ok_or_else(|| StorageError::SessionNotFound(scan.clone(), session.clone()))?;
        patch.apply(target);
        Ok(())
    }

    async fn push_session_issue(
        &self,
        scan: &ScanId,
        session: &SessionId,
        issue: &IssueId,
    ) -> Result<(), StorageError> {
        let mut c = self.collections.lock();
        let doc = c
            .scans
            .get_mut(scan.as_str())
            .ok_or_else(|| StorageError::ScanNotFound(scan.clone()))?;
        let target = doc
            .session_mut(session)
            .ok_or_else(|| StorageError::SessionNotFound(scan.clone(), session.clone()))?;
        target.issues.push(issue.clone());
        Ok(())
    }

    async fn push_session_artifact(
        &self,
        scan: &ScanId,
        session: &SessionId,
        artifact: serde_json::Value,
    ) -> Result<(), StorageError> {
        let mut c = self.collections.lock();
        let doc = c
            .scans
            .get_mut(scan.as_str())
            .ok_or_else(|| StorageError::ScanNotFound(scan.clone()))?;
        let target = doc
            .session_mut(session)
            .ok_or_else(|| StorageError::SessionNotFound(scan.clone(), session.clone()))?;
        target.artifacts.push(artifact);
        Ok(())
    }

    async fn scans_for(
        &self,
        target: &str,
        plan_name: &str,
    ) -> Result<Vec<Scan>, StorageError> {
        let c = self.collections.lock();
        let mut matches: Vec<Scan> = c
            .scans
            .values()
            .filter(|s| s.configuration.target == target && s.plan.name == plan_name)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(matches)
    }

    async fn upsert_issue(&self, issue: Issue) -> Result<(), StorageError> {
        let mut c = self.collections.lock();
        match c.issues.get_mut(issue.id.as_str()) {
            Some(existing) => {
                tracing::debug!(issue_id = %issue.id, "issue already known, updating severity");
                existing.severity = issue.severity;
            }
            None => {
                c.issues.insert(issue.id.to_string(), issue);
            }
        }
        Ok(())
    }

    async fn issue(&self, id: &IssueId) -> Result<Option<Issue>, StorageError> {
        Ok(self.collections.lock().issues.get(id.as_str()).cloned())
    }

    async fn set_issue_status(
        &self,
        id: &IssueId,
        status: IssueStatus,
        old_status: IssueStatus,
        correlated: &ScanId,
    ) -> Result<(), StorageError> {
        let mut c = self.collections.lock();
        let issue = c
            .issues
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::IssueNotFound(id.clone()))?;
        issue.status = status;
        issue.old_status = old_status;
        issue.correlated = Some(correlated.clone());
        Ok(())
    }

    async fn insert_site(&self, site: Site) -> Result<(), StorageError> {
        let mut c = self.collections.lock();
        c.sites.insert(site.url.clone(), site);
        Ok(())
    }

    async fn site(&self, url: &str) -> Result<Option<Site>, StorageError> {
        Ok(self.collections.lock().sites.get(url).cloned())
    }

    async fn insert_plan(&self, plan: Plan) -> Result<(), StorageError> {
        let mut c = self.collections.lock();
        c.plans.insert(plan.name.clone(), plan);
        Ok(())
    }

    async fn plan(&self, name: &str) -> Result<Option<Plan>, StorageError> {
        Ok(self.collections.lock().plans.get(name).cloned())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
