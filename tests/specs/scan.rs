// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy-path and admission scenarios.

use crate::prelude::{Lab, TARGET};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use warden_core::{
    AccessPolicy, Callback, IssueStatus, ScanConfig, ScanState, SessionState, Severity,
};
use warden_engine::EngineConfig;

/// Each plugin reports one finding and finishes cleanly.
const ONE_ISSUE_EACH: &str = r#"#!/bin/sh
case "$4" in
  plugins.One)
    echo '{"msg": "issue", "data": {"Id": "A", "Code": "XS-0", "Severity": "High", "Summary": "issue A"}}'
    ;;
  plugins.Two)
    echo '{"msg": "issue", "data": {"Id": "B", "Code": "SD-1", "Severity": "Low", "Summary": "issue B"}}'
    ;;
esac
echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
"#;

#[tokio::test]
async fn fresh_target_reports_new_issues() {
    let lab = Lab::with_default_config(ONE_ISSUE_EACH).await;
    let scan = lab.run_scan().await;

    assert_eq!(scan.state, ScanState::Finished);
    assert!(scan.sessions.iter().all(|s| s.state == SessionState::Finished));
    assert_eq!(scan.sessions[0].issues, vec![warden_core::IssueId::from("A")]);
    assert_eq!(scan.sessions[1].issues, vec![warden_core::IssueId::from("B")]);

    for (id, severity) in [("A", Severity::High), ("B", Severity::Low)] {
        let issue = lab.issue(id).await;
        assert_eq!(issue.severity, severity);
        assert_eq!(issue.status, IssueStatus::Current);
        assert_eq!(issue.old_status, IssueStatus::Unset);
    }

    // Timestamps are monotonic across the lifecycle
    assert!(scan.created <= scan.queued);
    assert!(scan.queued <= scan.started);
    assert!(scan.started <= scan.finished);
}

#[tokio::test]
async fn summary_counts_live_findings() {
    let lab = Lab::with_default_config(ONE_ISSUE_EACH).await;
    let scan = lab.run_scan().await;

    let summary = lab.orchestrator.summary(&scan.id).await.expect("summary");
    assert_eq!(summary.issues.high, 1);
    assert_eq!(summary.issues.low, 1);
    assert_eq!(summary.issues.medium, 0);
    assert_eq!(summary.sessions.len(), 2);
}

/// Minimal HTTP listener capturing one POST body.
async fn capture_one_request(listener: tokio::net::TcpListener) -> String {
    let (mut socket, _) = listener.accept().await.expect("accept");
    let mut raw = Vec::new();
    let mut buffer = [0u8; 4096];
    loop {
        let n = socket.read(&mut buffer).await.expect("read");
        raw.extend_from_slice(&buffer[..n]);
        if n == 0 {
            break;
        }
        // Headers complete and body present?
        if let Some(split) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&raw[..split]).to_lowercase();
            let length: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            if raw.len() >= split + 4 + length {
                socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
                    .await
                    .expect("respond");
                socket.flush().await.expect("flush");
                return String::from_utf8_lossy(&raw[split + 4..split + 4 + length]).to_string();
            }
        }
    }
    panic!("connection closed before a full request arrived");
}

#[tokio::test]
async fn deny_listed_target_aborts_and_fires_the_callback() {
    let config = EngineConfig {
        access: AccessPolicy {
            allow: vec![],
            deny: vec!["127.0.0.0/8".parse().expect("cidr")],
        },
        ..EngineConfig::default()
    };
    let lab = Lab::with_script(ONE_ISSUE_EACH, config).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let callback = tokio::spawn(capture_one_request(listener));

    let mut configuration = ScanConfig::new(TARGET);
    configuration.callback = Some(Callback { url: format!("http://127.0.0.1:{port}/hook") });
    let scan = lab.create_scan_with(configuration).await;
    let scan = lab.finish_scan(&scan.id).await;

    assert_eq!(scan.state, ScanState::Aborted);
    let failure = scan.failure.expect("failure recorded");
    assert_eq!(failure.reason.as_deref(), Some("target-blacklisted"));
    assert!(scan.sessions.iter().all(|s| s.state == SessionState::Cancelled));

    let body = tokio::time::timeout(std::time::Duration::from_secs(5), callback)
        .await
        .expect("callback fired")
        .expect("listener task");
    let body: serde_json::Value = serde_json::from_str(&body).expect("callback json");
    assert_eq!(body["event"], "scan-state");
    assert_eq!(body["id"], scan.id.as_str());
    assert_eq!(body["state"], "ABORTED");
}
