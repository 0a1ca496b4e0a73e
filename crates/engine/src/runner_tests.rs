// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::callback::CallbackClient;
use crate::writer::StateWriter;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use warden_bus::TaskBus;
use warden_core::{Scan, ScanConfig, ScanState, Session, SystemClock};
use warden_storage::MemoryRepository;

/// Write an executable fake plugin script and return an engine config
/// pointing the runner at it.
fn config_with_script(dir: &Path, script: &str, grace_ms: u64) -> Arc<EngineConfig> {
    let path = dir.join("fake-plugin");
    std::fs::write(&path, script).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    Arc::new(EngineConfig {
        plugin_program: path.display().to_string(),
        stop_grace_ms: grace_ms,
        ..EngineConfig::default()
    })
}

async fn harness(config: Arc<EngineConfig>) -> (MemoryRepository, PluginRunner<SystemClock>) {
    let repo = MemoryRepository::new();
    let bus = TaskBus::new();
    let writer = StateWriter::new(
        Arc::new(repo.clone()),
        bus.clone(),
        CallbackClient::new(Duration::from_millis(200)),
    );
    bus.serve("state", 1, Arc::new(writer));

    let scan = Scan::builder()
        .id("s1")
        .state(ScanState::Started)
        .configuration(ScanConfig::new("http://127.0.0.1"))
        .sessions(vec![Session::builder().id("p1").state(SessionState::Queued).build()])
        .created(chrono::Utc::now())
        .build();
    repo.insert_scan(scan).await.unwrap();

    let runner = PluginRunner::new(
        Arc::new(repo.clone()),
        StateClient::new(bus.clone(), "state"),
        config,
        SystemClock,
    );
    (repo, runner)
}

fn job() -> PluginJob {
    PluginJob { scan: "s1".into(), session: "p1".into() }
}

const HAPPY: &str = r#"#!/bin/sh
echo '{"msg": "issue", "data": {"Id": "a", "Code": "XS-0", "Severity": "High", "Summary": "xss"}}'
echo '{"msg": "artifact", "data": {"paths": ["/tmp/report.txt"]}}'
echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
"#;

#[tokio::test]
async fn happy_stream_lands_in_scan_state() {
    let dir = tempfile::tempdir().unwrap();
    let (repo, runner) = harness(config_with_script(dir.path(), HAPPY, 10_000)).await;

    let outcome = runner.execute(&job(), CancellationToken::new()).await;
    assert_eq!(outcome, Some(SessionState::Finished));

    let scan = repo.scan(&"s1".into()).await.unwrap().unwrap();
    let session = &scan.sessions[0];
    assert_eq!(session.state, SessionState::Finished);
    assert_eq!(session.issues, vec![warden_core::IssueId::from("a")]);
    assert_eq!(session.artifacts.len(), 1);
    assert!(session.started.is_some() && session.finished.is_some());
    assert!(session.started <= session.finished);

    let issue = repo.issue(&"a".into()).await.unwrap().unwrap();
    assert_eq!(issue.code, "XS-0");
}

#[tokio::test]
async fn exit_without_finish_synthesises_failed() {
    let dir = tempfile::tempdir().unwrap();
    let script = "#!/bin/sh\nexit 0\n";
    let (repo, runner) = harness(config_with_script(dir.path(), script, 10_000)).await;

    let outcome = runner.execute(&job(), CancellationToken::new()).await;
    assert_eq!(outcome, Some(SessionState::Failed));

    let scan = repo.scan(&"s1".into()).await.unwrap().unwrap();
    let failure = scan.sessions[0].failure.clone().unwrap();
    assert_eq!(failure.message, "The plugin did not finish correctly");
    assert!(failure.hostname.is_some());
    assert!(failure.exception.is_none());
}

#[tokio::test]
async fn messages_after_finish_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"#!/bin/sh
echo '{"msg": "issue", "data": {"Id": "a", "Code": "XS-0", "Severity": "Low", "Summary": "one"}}'
echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
echo '{"msg": "issue", "data": {"Id": "b", "Code": "XS-1", "Severity": "Low", "Summary": "late"}}'
"#;
    let (repo, runner) = harness(config_with_script(dir.path(), script, 10_000)).await;

    let outcome = runner.execute(&job(), CancellationToken::new()).await;
    assert_eq!(outcome, Some(SessionState::Finished));

    let scan = repo.scan(&"s1".into()).await.unwrap().unwrap();
    assert_eq!(scan.sessions[0].issues, vec![warden_core::IssueId::from("a")]);
    assert!(repo.issue(&"b".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn garbage_lines_are_skipped_and_stream_drained() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"#!/bin/sh
echo 'this is not json'
echo '{"msg": "gossip", "data": {}}'
echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
"#;
    let (repo, runner) = harness(config_with_script(dir.path(), script, 10_000)).await;

    let outcome = runner.execute(&job(), CancellationToken::new()).await;
    assert_eq!(outcome, Some(SessionState::Finished));
    let scan = repo.scan(&"s1".into()).await.unwrap().unwrap();
    assert_eq!(scan.sessions[0].state, SessionState::Finished);
}

#[tokio::test]
#[serial_test::serial]
async fn graceful_stop_lets_the_child_report_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"#!/bin/sh
trap 'echo "{\"msg\": \"finish\", \"data\": {\"state\": \"STOPPED\"}}"; exit 0' USR1
sleep 5 > /dev/null 2>&1 &
wait $!
"#;
    let (repo, runner) = harness(config_with_script(dir.path(), script, 10_000)).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = runner.execute(&job(), cancel).await;
    assert_eq!(outcome, Some(SessionState::Stopped));
    assert!(started.elapsed() < Duration::from_secs(4), "stop should not wait for the sleep");

    let scan = repo.scan(&"s1".into()).await.unwrap().unwrap();
    assert_eq!(scan.sessions[0].state, SessionState::Stopped);
}

#[tokio::test]
#[serial_test::serial]
async fn stubborn_child_is_killed_after_the_grace_window() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"#!/bin/sh
trap '' USR1
sleep 5 > /dev/null 2>&1 &
wait $!
echo '{"msg": "finish", "data": {"state": "FINISHED"}}'
"#;
    let (repo, runner) = harness(config_with_script(dir.path(), script, 400)).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let started = std::time::Instant::now();
    let outcome = runner.execute(&job(), cancel).await;
    assert_eq!(outcome, Some(SessionState::Failed));
    assert!(started.elapsed() < Duration::from_secs(4), "kill must not wait for the sleep");

    let scan = repo.scan(&"s1".into()).await.unwrap().unwrap();
    assert_eq!(scan.sessions[0].state, SessionState::Failed);
    let failure = scan.sessions[0].failure.clone().unwrap();
    assert_eq!(failure.message, "The plugin did not finish correctly");
}

#[tokio::test]
async fn stopping_scan_refuses_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let (repo, runner) = harness(config_with_script(dir.path(), HAPPY, 10_000)).await;
    repo.update_scan(&"s1".into(), warden_storage::ScanPatch::new().state(ScanState::Stopping))
        .await
        .unwrap();

    let outcome = runner.execute(&job(), CancellationToken::new()).await;
    assert_eq!(outcome, None);

    let scan = repo.scan(&"s1".into()).await.unwrap().unwrap();
    assert_eq!(scan.sessions[0].state, SessionState::Queued);
}

#[tokio::test]
async fn non_queued_session_refuses_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let (repo, runner) = harness(config_with_script(dir.path(), HAPPY, 10_000)).await;
    repo.update_session(
        &"s1".into(),
        &"p1".into(),
        warden_storage::SessionPatch::new().state(SessionState::Finished),
    )
    .await
    .unwrap();

    let outcome = runner.execute(&job(), CancellationToken::new()).await;
    assert_eq!(outcome, None);
}

#[tokio::test]
async fn unspawnable_program_marks_the_session_failed() {
    let dir = tempfile::tempdir().unwrap();
    let (repo, runner) = harness(config_with_script(dir.path(), HAPPY, 10_000)).await;
    // Same harness, but the runner points at a program that does not exist
    let broken = PluginRunner::new(
        Arc::new(repo.clone()),
        runner.state.clone(),
        Arc::new(EngineConfig {
            plugin_program: dir.path().join("does-not-exist").display().to_string(),
            ..EngineConfig::default()
        }),
        SystemClock,
    );

    let outcome = broken.execute(&job(), CancellationToken::new()).await;
    assert_eq!(outcome, Some(SessionState::Failed));

    let scan = repo.scan(&"s1".into()).await.unwrap().unwrap();
    let failure = scan.sessions[0].failure.clone().unwrap();
    assert!(failure.exception.is_some());
}
