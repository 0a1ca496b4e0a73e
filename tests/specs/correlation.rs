// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-scan issue correlation scenarios: recurrence, fixes, and fixes
//! suppressed by dirty scans.

use crate::prelude::Lab;
use warden_core::{IssueStatus, ScanState, SessionState};

/// First run: plugin one reports A, plugin two reports B. Later runs
/// (marker file present): plugin one re-reports A, plugin two goes quiet.
const FIX_AFTER_FIRST_RUN: &str = r#"#!/bin/sh
case "$4" in
  plugins.One)
    echo '{"msg": "issue", "data": {"Id": "A", "Code": "XS-0", "Severity": "High", "Summary": "issue A"}}'
    ;;
  plugins.Two)
    if [ ! -f "{LAB}/second-run" ]; then
      touch "{LAB}/second-run"
      echo '{"msg": "issue", "data": {"Id": "B", "Code": "SD-1", "Severity": "Low", "Summary": "issue B"}}'
    fi
    ;;
esac
echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
"#;

/// As above, but on later runs plugin two fails instead of finishing.
const DIRTY_SECOND_RUN: &str = r#"#!/bin/sh
case "$4" in
  plugins.One)
    echo '{"msg": "issue", "data": {"Id": "A", "Code": "XS-0", "Severity": "High", "Summary": "issue A"}}'
    echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
    ;;
  plugins.Two)
    if [ ! -f "{LAB}/second-run" ]; then
      touch "{LAB}/second-run"
      echo '{"msg": "issue", "data": {"Id": "B", "Code": "SD-1", "Severity": "Low", "Summary": "issue B"}}'
      echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
    else
      echo '{"msg": "finish", "data": {"state": "FAILED", "failure": {"message": "probe crashed"}}}'
    fi
    ;;
esac
"#;

#[tokio::test]
async fn recurrence_and_fix_detection() {
    let lab = Lab::with_default_config(FIX_AFTER_FIRST_RUN).await;

    let first = lab.run_scan().await;
    assert_eq!(first.state, ScanState::Finished);
    assert_eq!(lab.issue("B").await.status, IssueStatus::Current);

    let second = lab.run_scan().await;
    assert_eq!(second.state, ScanState::Finished);

    // A recurred: Current, previously Current
    let a = lab.issue("A").await;
    assert_eq!(a.status, IssueStatus::Current);
    assert_eq!(a.old_status, IssueStatus::Current);

    // B vanished from a cleanly finished session: Fixed, previously
    // Current, and attached to the second scan's plugin-two session
    let b = lab.issue("B").await;
    assert_eq!(b.status, IssueStatus::Fixed);
    assert_eq!(b.old_status, IssueStatus::Current);
    assert_eq!(second.sessions[1].plugin.name, "two");
    let refreshed = lab.scan(&second.id).await;
    assert_eq!(refreshed.sessions[1].issues, vec![warden_core::IssueId::from("B")]);
}

#[tokio::test]
async fn dirty_scan_cannot_assert_a_fix() {
    let lab = Lab::with_default_config(DIRTY_SECOND_RUN).await;

    let first = lab.run_scan().await;
    assert_eq!(first.state, ScanState::Finished);

    let second = lab.run_scan().await;
    assert_eq!(second.state, ScanState::Failed);
    assert_eq!(second.sessions[1].state, SessionState::Failed);

    // B's status survives: a failed session proves nothing about B
    let b = lab.issue("B").await;
    assert_eq!(b.status, IssueStatus::Current);
    assert_eq!(b.old_status, IssueStatus::Current);
    // Still attached so the timeline stays navigable
    let refreshed = lab.scan(&second.id).await;
    assert_eq!(refreshed.sessions[1].issues, vec![warden_core::IssueId::from("B")]);
}

#[tokio::test]
async fn recorrelation_is_idempotent() {
    let lab = Lab::with_default_config(FIX_AFTER_FIRST_RUN).await;
    lab.run_scan().await;
    let second = lab.run_scan().await;

    let before = (lab.issue("A").await, lab.issue("B").await);
    lab.orchestrator.recorrelate(&second.id).await.expect("recorrelate");
    let after = (lab.issue("A").await, lab.issue("B").await);
    assert_eq!(before, after);

    let refreshed = lab.scan(&second.id).await;
    assert_eq!(refreshed.sessions[1].issues, vec![warden_core::IssueId::from("B")]);
}
