// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scan workflow: drives one scan end to end.
//!
//! Admission (deny lists, site registration, ownership) gates the scan;
//! sessions then run strictly in plan order, one plugin task at a time.
//! A revoked plugin task reads as a user stop. Terminal classification
//! applies the precedence `ABORTED > STOPPED > FAILED > FINISHED`.

use crate::config::EngineConfig;
use crate::diagnostics;
use crate::error::EngineError;
use crate::ownership::OwnershipVerifier;
use crate::runner::PluginJob;
use crate::writer::StateClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use warden_bus::{BusError, Task, TaskBus, TaskHandler, TaskResult};
use warden_core::{Clock, Failure, ScanId, ScanState, SessionState, StateOp};
use warden_storage::Repository;

/// Payload of a `scan` task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub scan: ScanId,
}

#[derive(Clone)]
pub struct ScanWorkflow<C: Clock> {
    repo: Arc<dyn Repository>,
    bus: TaskBus,
    state: StateClient,
    config: Arc<EngineConfig>,
    verifier: Arc<dyn OwnershipVerifier>,
    clock: C,
}

impl<C: Clock> ScanWorkflow<C> {
    pub fn new(
        repo: Arc<dyn Repository>,
        bus: TaskBus,
        state: StateClient,
        config: Arc<EngineConfig>,
        verifier: Arc<dyn OwnershipVerifier>,
        clock: C,
    ) -> Self {
        Self { repo, bus, state, config, verifier, clock }
    }

    /// Drive the scan. Only a `QUEUED` scan is accepted; anything else is
    /// logged and left untouched. Unexpected errors terminate the scan
    /// `FAILED` and never propagate.
    pub async fn run(&self, scan_id: &ScanId) {
        if let Err(err) = self.execute(scan_id).await {
            tracing::error!(scan_id = %scan_id, error = %err, "scan errored, marking it FAILED");
            let failure = diagnostics::failure_for_error(&err).reason("backend-exception");
            let finish = StateOp::ScanFinish {
                scan: scan_id.clone(),
                state: ScanState::Failed,
                at: self.clock.now_utc(),
                failure: Some(failure),
            };
            if let Err(err) = self.state.apply(finish).await {
                tracing::error!(scan_id = %scan_id, error = %err, "error marking scan FAILED");
            }
        }
    }

    async fn execute(&self, scan_id: &ScanId) -> Result<(), EngineError> {
        let Some(scan) = self.repo.scan(scan_id).await? else {
            tracing::error!(scan_id = %scan_id, "cannot load scan");
            return Ok(());
        };
        if scan.state != ScanState::Queued {
            tracing::error!(
                scan_id = %scan_id,
                state = %scan.state,
                "scan has invalid state, expected QUEUED"
            );
            return Ok(());
        }

        self.state
            .apply(StateOp::ScanStart { scan: scan_id.clone(), at: self.clock.now_utc() })
            .await?;

        let target = scan.configuration.target.clone();

        // Admission: every resolved IPv4 address must clear the lists
        let addrs = target_addrs(&target).await;
        if !self.config.access.permits_all(addrs) {
            tracing::warn!(scan_id = %scan_id, target = %target, "target failed admission");
            let failure = diagnostics::admission_failure(
                "target-blacklisted",
                "The target cannot be scanned because its (IPv4) address is deny-listed.",
            );
            return self.finish(scan_id, ScanState::Aborted, Some(failure)).await;
        }

        // Ownership verification for registered sites that require it
        let Some(site) = self.repo.site(&target).await? else {
            let failure = diagnostics::admission_failure(
                "no-such-site",
                "The target is not a registered site.",
            );
            return self.finish(scan_id, ScanState::Aborted, Some(failure)).await;
        };
        if site.verification.enabled {
            let token = site.verification.value.clone().unwrap_or_default();
            if !self.verifier.verify(&target, &token).await {
                let failure = diagnostics::admission_failure(
                    "target-ownership-verification-failed",
                    "The target cannot be scanned because the ownership verification failed.",
                );
                return self.finish(scan_id, ScanState::Aborted, Some(failure)).await;
            }
        }

        // Sessions run strictly in plan order
        let mut any_failed = false;
        for session in &scan.sessions {
            self.state
                .apply(StateOp::SessionQueue {
                    scan: scan_id.clone(),
                    session: session.id.clone(),
                    at: self.clock.now_utc(),
                })
                .await?;

            let queue = self.config.queues.for_weight(session.plugin.weight);
            let payload = serde_json::to_value(PluginJob {
                scan: scan_id.clone(),
                session: session.id.clone(),
            })?;
            let handle = self.bus.enqueue(queue, "run_plugin", payload)?;

            // The handle must be persisted before we wait so a concurrent
            // stop always finds something to revoke.
            self.state
                .apply(StateOp::SessionSetTask {
                    scan: scan_id.clone(),
                    session: session.id.clone(),
                    task: handle.id.to_string(),
                })
                .await?;

            tracing::info!(
                scan_id = %scan_id,
                session_id = %session.id,
                plugin = %session.plugin.class,
                queue,
                "running plugin session"
            );

            let outcome = match self.bus.wait(&handle.id).await? {
                TaskResult::Revoked => Some(SessionState::Stopped),
                TaskResult::Completed(value) => decode_outcome(scan_id, value),
                TaskResult::Failed(message) => return Err(BusError::Task(message).into()),
            };

            match outcome {
                Some(SessionState::Aborted) => {
                    return self.finish(scan_id, ScanState::Aborted, None).await;
                }
                Some(SessionState::Stopped) => {
                    return self.finish(scan_id, ScanState::Stopped, None).await;
                }
                Some(SessionState::Failed) => any_failed = true,
                _ => {}
            }
        }

        let state = if any_failed { ScanState::Failed } else { ScanState::Finished };
        self.finish(scan_id, state, None).await
    }

    async fn finish(
        &self,
        scan_id: &ScanId,
        state: ScanState,
        failure: Option<Failure>,
    ) -> Result<(), EngineError> {
        self.state
            .apply(StateOp::ScanFinish {
                scan: scan_id.clone(),
                state,
                at: self.clock.now_utc(),
                failure,
            })
            .await
    }
}

fn decode_outcome(scan_id: &ScanId, value: serde_json::Value) -> Option<SessionState> {
    match serde_json::from_value(value) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(scan_id = %scan_id, error = %err, "undecodable plugin outcome");
            None
        }
    }
}

/// IPv4 addresses of a target URL: the literal host, or every A record the
/// resolver returns. Unparseable and IPv6-only targets resolve to nothing,
/// which admission treats as not scannable.
async fn target_addrs(target: &str) -> Vec<Ipv4Addr> {
    let Ok(url) = url::Url::parse(target) else {
        return Vec::new();
    };
    match url.host() {
        Some(url::Host::Ipv4(ip)) => vec![ip],
        Some(url::Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(80);
            match tokio::net::lookup_host((domain, port)).await {
                Ok(addrs) => addrs
                    .filter_map(|addr| match addr.ip() {
                        IpAddr::V4(v4) => Some(v4),
                        IpAddr::V6(_) => None,
                    })
                    .collect(),
                Err(err) => {
                    tracing::warn!(target, error = %err, "target does not resolve");
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    }
}

#[async_trait]
impl<C: Clock> TaskHandler for ScanWorkflow<C> {
    async fn run(&self, task: Task) -> Result<serde_json::Value, BusError> {
        let job: ScanJob = match serde_json::from_value(task.payload) {
            Ok(job) => job,
            Err(err) => {
                tracing::error!(task = %task.id, error = %err, "undecodable scan job");
                return Ok(serde_json::Value::Null);
            }
        };
        ScanWorkflow::run(self, &job.scan).await;
        Ok(serde_json::Value::Null)
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
