// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use crate::plan::{Plan, PlanStep, PluginRegistry};
use crate::session::{PluginDescriptor, WeightClass};

fn registry() -> PluginRegistry {
    [
        PluginDescriptor {
            class: "plugins.Alive".to_string(),
            name: "alive".to_string(),
            version: "0.3".to_string(),
            weight: WeightClass::Light,
        },
        PluginDescriptor {
            class: "plugins.Nmap".to_string(),
            name: "nmap".to_string(),
            version: "1.1".to_string(),
            weight: WeightClass::Heavy,
        },
    ]
    .into_iter()
    .collect()
}

fn plan() -> Plan {
    let mut step_config = serde_json::Map::new();
    step_config.insert("ports".to_string(), serde_json::json!("1-1024"));
    Plan {
        name: "baseline".to_string(),
        revision: 2,
        workflow: vec![
            PlanStep {
                plugin_name: "alive".to_string(),
                configuration: serde_json::Map::new(),
                description: "Reachability check".to_string(),
            },
            PlanStep {
                plugin_name: "nmap".to_string(),
                configuration: step_config,
                description: "Port scan".to_string(),
            },
        ],
    }
}

#[test]
fn assemble_builds_one_created_session_per_step() {
    let clock = FakeClock::new();
    let scan = Scan::assemble(
        &plan(),
        ScanConfig::new("http://127.0.0.1"),
        ScanMeta { user: "alice@example.com".to_string(), tags: vec![] },
        &registry(),
        &clock,
    )
    .unwrap();

    assert_eq!(scan.state, ScanState::Created);
    assert_eq!(scan.plan.name, "baseline");
    assert_eq!(scan.plan.revision, 2);
    assert_eq!(scan.created, Some(clock.now_utc()));
    assert!(scan.queued.is_none() && scan.started.is_none() && scan.finished.is_none());

    assert_eq!(scan.sessions.len(), 2);
    assert_eq!(scan.sessions[0].plugin.name, "alive");
    assert_eq!(scan.sessions[1].plugin.name, "nmap");
    assert!(scan.sessions.iter().all(|s| s.state == SessionState::Created));
    assert_ne!(scan.sessions[0].id, scan.sessions[1].id);
}

#[test]
fn assemble_merges_scan_config_over_step_config() {
    let clock = FakeClock::new();
    let mut config = ScanConfig::new("http://127.0.0.1");
    config.extra.insert("ports".to_string(), serde_json::json!("443"));
    let scan =
        Scan::assemble(&plan(), config, ScanMeta::default(), &registry(), &clock).unwrap();

    // The scan-level value wins over the step's "1-1024"
    assert_eq!(scan.sessions[1].configuration["ports"], "443");
    assert_eq!(scan.sessions[1].configuration["target"], "http://127.0.0.1");
}

#[test]
fn assemble_rejects_unknown_plugin() {
    let clock = FakeClock::new();
    let mut bad = plan();
    bad.workflow[0].plugin_name = "missing".to_string();
    let err = Scan::assemble(
        &bad,
        ScanConfig::new("http://127.0.0.1"),
        ScanMeta::default(),
        &registry(),
        &clock,
    )
    .unwrap_err();
    assert_eq!(err, UnknownPlugin("missing".to_string()));
}

#[test]
fn session_lookup_by_id_and_plugin() {
    let clock = FakeClock::new();
    let scan = Scan::assemble(
        &plan(),
        ScanConfig::new("http://127.0.0.1"),
        ScanMeta::default(),
        &registry(),
        &clock,
    )
    .unwrap();

    let id = scan.sessions[1].id.clone();
    assert_eq!(scan.session(&id).map(|s| s.plugin.name.as_str()), Some("nmap"));
    assert_eq!(
        scan.session_for_plugin("alive").map(|s| s.id.clone()),
        Some(scan.sessions[0].id.clone())
    );
    assert!(scan.session(&SessionId::new("nope")).is_none());
}

#[yare::parameterized(
    finished = { ScanState::Finished, true, true },
    failed = { ScanState::Failed, true, true },
    stopped = { ScanState::Stopped, true, true },
    aborted = { ScanState::Aborted, true, true },
    stopping = { ScanState::Stopping, false, true },
    started = { ScanState::Started, false, false },
    queued = { ScanState::Queued, false, false },
    created = { ScanState::Created, false, false },
)]
fn scan_state_classification(state: ScanState, terminal: bool, refuses: bool) {
    assert_eq!(state.is_terminal(), terminal);
    assert_eq!(state.refuses_work(), refuses);
}

#[test]
fn scan_state_wire_names() {
    assert_eq!(serde_json::to_string(&ScanState::Stopping).unwrap(), "\"STOPPING\"");
    let parsed: ScanState = serde_json::from_str("\"ABORTED\"").unwrap();
    assert_eq!(parsed, ScanState::Aborted);
}
