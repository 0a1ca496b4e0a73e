// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator: wires the components onto the bus and exposes scan control.
//!
//! One orchestrator per worker process. The `state` queue gets a single
//! consumer so mutations serialise; each plugin queue gets one worker per
//! process so at most one plugin child is supervised at a time.

use crate::callback::CallbackClient;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ownership::OwnershipVerifier;
use crate::runner::PluginRunner;
use crate::workflow::{ScanJob, ScanWorkflow};
use crate::writer::{StateClient, StateWriter};
use std::collections::HashMap;
use std::sync::Arc;
use warden_bus::{TaskBus, TaskHandle};
use warden_core::{
    Clock, Issue, Plan, PluginRegistry, Scan, ScanConfig, ScanId, ScanMeta, ScanState,
    ScanSummary, StateOp, SystemClock,
};
use warden_storage::{Repository, ScanPatch};

pub struct Orchestrator<C: Clock = SystemClock> {
    repo: Arc<dyn Repository>,
    bus: TaskBus,
    config: Arc<EngineConfig>,
    state: StateClient,
    registry: PluginRegistry,
    clock: C,
}

impl<C: Clock> Orchestrator<C> {
    /// Wire the state writer, scan workflow, and plugin runner onto the bus
    /// and start serving their queues on the current runtime.
    pub fn start(
        repo: Arc<dyn Repository>,
        bus: TaskBus,
        config: EngineConfig,
        registry: PluginRegistry,
        verifier: Arc<dyn OwnershipVerifier>,
        clock: C,
    ) -> Self {
        let config = Arc::new(config);
        let callback = CallbackClient::new(config.callback_timeout());

        let writer = StateWriter::new(Arc::clone(&repo), bus.clone(), callback);
        bus.serve(&config.queues.state, 1, Arc::new(writer));

        let state = StateClient::new(bus.clone(), config.queues.state.clone());

        let workflow = ScanWorkflow::new(
            Arc::clone(&repo),
            bus.clone(),
            state.clone(),
            Arc::clone(&config),
            verifier,
            clock.clone(),
        );
        bus.serve(&config.queues.scan, config.scan_workers, Arc::new(workflow));

        let runner = Arc::new(PluginRunner::new(
            Arc::clone(&repo),
            state.clone(),
            Arc::clone(&config),
            clock.clone(),
        ));
        for queue in config.queues.plugin_queues() {
            bus.serve(queue, 1, runner.clone());
        }

        Self { repo, bus, config, state, registry, clock }
    }

    /// Assemble and persist a `CREATED` scan from a stored plan, folding
    /// the site's tags into the configuration when the site is known.
    pub async fn create_scan(
        &self,
        plan_name: &str,
        mut configuration: ScanConfig,
        user: &str,
    ) -> Result<Scan, EngineError> {
        let plan: Plan = self
            .repo
            .plan(plan_name)
            .await?
            .ok_or_else(|| EngineError::PlanNotFound(plan_name.to_string()))?;
        if let Some(site) = self.repo.site(&configuration.target).await? {
            if !site.tags.is_empty() {
                configuration.tags = site.tags.clone();
            }
        }
        let meta = ScanMeta { user: user.to_string(), tags: Vec::new() };
        let scan = Scan::assemble(&plan, configuration, meta, &self.registry, &self.clock)?;
        self.repo.insert_scan(scan.clone()).await?;
        Ok(scan)
    }

    /// START control: legal only from `CREATED`. Patches the scan to
    /// `QUEUED` and enqueues the scan job.
    pub async fn start_scan(&self, scan_id: &ScanId) -> Result<TaskHandle, EngineError> {
        let scan = self
            .repo
            .scan(scan_id)
            .await?
            .ok_or_else(|| EngineError::ScanNotFound(scan_id.clone()))?;
        if scan.state != ScanState::Created {
            return Err(EngineError::InvalidScanState {
                id: scan_id.clone(),
                expected: ScanState::Created,
                actual: scan.state,
            });
        }
        self.repo
            .update_scan(
                scan_id,
                ScanPatch::new().state(ScanState::Queued).queued(self.clock.now_utc()),
            )
            .await?;
        let payload = serde_json::to_value(ScanJob { scan: scan_id.clone() })?;
        Ok(self.bus.enqueue(&self.config.queues.scan, "scan", payload)?)
    }

    /// STOP control: writes `STOPPING` to signal intent, then runs the stop
    /// job on the state queue, which patches live sessions to `STOPPED`
    /// and revokes their task handles.
    pub async fn stop_scan(&self, scan_id: &ScanId) -> Result<(), EngineError> {
        let scan = self
            .repo
            .scan(scan_id)
            .await?
            .ok_or_else(|| EngineError::ScanNotFound(scan_id.clone()))?;
        if scan.state.is_terminal() {
            return Err(EngineError::ScanAlreadyTerminal(scan_id.clone()));
        }
        self.repo
            .update_scan(scan_id, ScanPatch::new().state(ScanState::Stopping))
            .await?;
        self.state
            .apply(StateOp::ScanStop { scan: scan_id.clone(), at: self.clock.now_utc() })
            .await
    }

    /// Re-run issue correlation for a scan, through the state queue.
    pub async fn recorrelate(&self, scan_id: &ScanId) -> Result<(), EngineError> {
        self.state.apply(StateOp::CorrelateIssues { scan: scan_id.clone() }).await
    }

    /// Reporting view of a scan: per-severity counts of live findings plus
    /// per-session plugin and state rows.
    pub async fn summary(&self, scan_id: &ScanId) -> Result<ScanSummary, EngineError> {
        let scan = self
            .repo
            .scan(scan_id)
            .await?
            .ok_or_else(|| EngineError::ScanNotFound(scan_id.clone()))?;
        let mut issues: HashMap<String, Issue> = HashMap::new();
        for session in &scan.sessions {
            for issue_id in &session.issues {
                if issues.contains_key(issue_id.as_str()) {
                    continue;
                }
                if let Some(issue) = self.repo.issue(issue_id).await? {
                    issues.insert(issue_id.to_string(), issue);
                }
            }
        }
        Ok(ScanSummary::build(&scan, |id| issues.get(id.as_str()).cloned()))
    }

    pub fn repo(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn bus(&self) -> &TaskBus {
        &self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
