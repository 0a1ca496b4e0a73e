// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared scenario harness: a two-plugin plan, a registered site, and a
//! fake plugin executable whose behavior branches on the plugin class.

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use warden_bus::TaskBus;
use warden_core::{
    Plan, PlanStep, PluginDescriptor, PluginRegistry, Scan, ScanConfig, ScanId, Site,
    SystemClock, WeightClass,
};
use warden_engine::{AcceptAll, EngineConfig, Orchestrator};
use warden_storage::{MemoryRepository, Repository};

pub const TARGET: &str = "http://127.0.0.1/";

pub struct Lab {
    pub repo: MemoryRepository,
    pub orchestrator: Orchestrator<SystemClock>,
    /// Scratch directory holding the fake plugin; dropped with the lab.
    _dir: tempfile::TempDir,
}

fn registry() -> PluginRegistry {
    ["One", "Two"]
        .into_iter()
        .map(|name| PluginDescriptor {
            class: format!("plugins.{name}"),
            name: name.to_lowercase(),
            version: "1.0".to_string(),
            weight: WeightClass::Light,
        })
        .collect()
}

fn plan() -> Plan {
    Plan {
        name: "baseline".to_string(),
        revision: 0,
        workflow: ["one", "two"]
            .into_iter()
            .map(|name| PlanStep {
                plugin_name: name.to_string(),
                configuration: serde_json::Map::new(),
                description: format!("step {name}"),
            })
            .collect(),
    }
}

impl Lab {
    /// Build a lab whose fake plugin runs `script` (a `/bin/sh` body; the
    /// plugin class arrives as `$4`). `{LAB}` in the script expands to the
    /// lab's scratch directory, handy for cross-scan marker files.
    pub async fn with_script(script: &str, mut config: EngineConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let program = dir.path().join("fake-plugin");
        let body = script.replace("{LAB}", &dir.path().display().to_string());
        std::fs::write(&program, body).expect("write fake plugin");
        let mut permissions = std::fs::metadata(&program).expect("stat").permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&program, permissions).expect("chmod");

        config.plugin_program = program.display().to_string();

        let repo = MemoryRepository::new();
        let orchestrator = Orchestrator::start(
            Arc::new(repo.clone()),
            TaskBus::new(),
            config,
            registry(),
            Arc::new(AcceptAll),
            SystemClock,
        );
        repo.insert_plan(plan()).await.expect("insert plan");
        repo.insert_site(Site::new(TARGET)).await.expect("insert site");
        Lab { repo, orchestrator, _dir: dir }
    }

    pub async fn with_default_config(script: &str) -> Self {
        Self::with_script(script, EngineConfig::default()).await
    }

    /// Create a scan for the baseline plan, run it to a terminal state,
    /// and return the final document.
    pub async fn run_scan(&self) -> Scan {
        let scan = self.create_scan().await;
        self.finish_scan(&scan.id).await
    }

    pub async fn create_scan(&self) -> Scan {
        self.orchestrator
            .create_scan("baseline", ScanConfig::new(TARGET), "alice@example.com")
            .await
            .expect("create scan")
    }

    pub async fn create_scan_with(&self, configuration: ScanConfig) -> Scan {
        self.orchestrator
            .create_scan("baseline", configuration, "alice@example.com")
            .await
            .expect("create scan")
    }

    /// Start the scan and block until its workflow task completes.
    pub async fn finish_scan(&self, id: &ScanId) -> Scan {
        let handle = self.orchestrator.start_scan(id).await.expect("start scan");
        self.orchestrator.bus().wait(&handle.id).await.expect("wait for scan");
        self.scan(id).await
    }

    pub async fn scan(&self, id: &ScanId) -> Scan {
        self.repo.scan(id).await.expect("load scan").expect("scan exists")
    }

    pub async fn issue(&self, id: &str) -> warden_core::Issue {
        self.repo.issue(&id.into()).await.expect("load issue").expect("issue exists")
    }
}
