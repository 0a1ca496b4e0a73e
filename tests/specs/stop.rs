// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-initiated stop scenarios: cooperative children and children that
//! have to be killed.

use crate::prelude::Lab;
use std::time::Duration;
use warden_core::{ScanState, SessionState};
use warden_engine::EngineConfig;

/// Plugin one runs long but honours the graceful signal by reporting a
/// `STOPPED` finish. Plugin two would finish instantly (it never runs).
const COOPERATIVE: &str = r#"#!/bin/sh
case "$4" in
  plugins.One)
    trap 'echo "{\"msg\": \"finish\", \"data\": {\"state\": \"STOPPED\"}}"; exit 0' USR1
    sleep 20 > /dev/null 2>&1 &
    wait $!
    ;;
esac
echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
"#;

/// Plugin one ignores the graceful signal entirely.
const STUBBORN: &str = r#"#!/bin/sh
case "$4" in
  plugins.One)
    trap '' USR1
    sleep 20 > /dev/null 2>&1 &
    wait $!
    ;;
esac
echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
"#;

#[tokio::test]
#[serial_test::serial]
async fn stop_mid_plugin_with_a_cooperative_child() {
    let lab = Lab::with_default_config(COOPERATIVE).await;
    let scan = lab.create_scan().await;
    let handle = lab.orchestrator.start_scan(&scan.id).await.expect("start");

    // Let plugin one spawn, then stop the scan
    tokio::time::sleep(Duration::from_millis(500)).await;
    lab.orchestrator.stop_scan(&scan.id).await.expect("stop");
    lab.orchestrator.bus().wait(&handle.id).await.expect("scan task");

    let scan = lab.scan(&scan.id).await;
    assert_eq!(scan.state, ScanState::Stopped);
    assert_eq!(scan.sessions[1].state, SessionState::Cancelled);

    // The child reports STOPPED within the grace window; give its state
    // write a moment to land before asserting.
    for _ in 0..50 {
        if lab.scan(&scan.id).await.sessions[0].state == SessionState::Stopped {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(lab.scan(&scan.id).await.sessions[0].state, SessionState::Stopped);
}

#[tokio::test]
#[serial_test::serial]
async fn unresponsive_plugin_is_killed_but_user_intent_wins() {
    let config = EngineConfig { stop_grace_ms: 500, ..EngineConfig::default() };
    let lab = Lab::with_script(STUBBORN, config).await;
    let scan = lab.create_scan().await;
    let handle = lab.orchestrator.start_scan(&scan.id).await.expect("start");

    tokio::time::sleep(Duration::from_millis(500)).await;
    let stopped_at = std::time::Instant::now();
    lab.orchestrator.stop_scan(&scan.id).await.expect("stop");
    lab.orchestrator.bus().wait(&handle.id).await.expect("scan task");

    let scan_doc = lab.scan(&scan.id).await;
    // User intent wins at the scan level
    assert_eq!(scan_doc.state, ScanState::Stopped);
    assert_eq!(scan_doc.sessions[1].state, SessionState::Cancelled);

    // The runner kills the child at the grace deadline and synthesises a
    // FAILED session since no finish was ever seen.
    let mut session_state = scan_doc.sessions[0].state;
    for _ in 0..80 {
        session_state = lab.scan(&scan.id).await.sessions[0].state;
        if session_state == SessionState::Failed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(session_state, SessionState::Failed);
    assert!(
        stopped_at.elapsed() < Duration::from_secs(15),
        "the kill must not wait out the child's sleep"
    );

    let failure = lab.scan(&scan.id).await.sessions[0].failure.clone().expect("failure");
    assert_eq!(failure.message, "The plugin did not finish correctly");
}
