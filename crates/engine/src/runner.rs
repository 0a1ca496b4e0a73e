// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plugin runner: spawns one plugin child process per session, streams
//! its line-delimited messages into scan state, and enforces graceful
//! shutdown with a bounded kill window.
//!
//! The graceful stop can arrive two ways and both land on the same path:
//! the bus revokes the session task (cancellation token), or the worker
//! process itself receives `SIGUSR1`. Either way the child gets `SIGUSR1`
//! and a kill timer starts; if the child is still alive when the window
//! closes it is killed. Each plugin queue is served by a single worker per
//! process, so at most one child is supervised at a time and the signal
//! listener's lifetime is bounded by the supervision itself.

use crate::config::EngineConfig;
use crate::diagnostics;
use crate::error::EngineError;
use crate::writer::StateClient;
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use warden_bus::{BusError, Task, TaskHandler};
use warden_core::{Clock, ScanId, SessionId, SessionState, StateOp};
use warden_storage::Repository;
use warden_wire::PluginMessage;

/// Payload of a `run_plugin` task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginJob {
    pub scan: ScanId,
    pub session: SessionId,
}

#[derive(Clone)]
pub struct PluginRunner<C: Clock> {
    repo: Arc<dyn Repository>,
    state: StateClient,
    config: Arc<EngineConfig>,
    clock: C,
}

impl<C: Clock> PluginRunner<C> {
    pub fn new(
        repo: Arc<dyn Repository>,
        state: StateClient,
        config: Arc<EngineConfig>,
        clock: C,
    ) -> Self {
        Self { repo, state, config, clock }
    }

    /// Run the session to a terminal state. Never returns an error to the
    /// bus: unexpected failures mark the session `FAILED` with diagnostics.
    /// `None` means the job was refused (stale enqueue, stopped scan).
    pub async fn execute(
        &self,
        job: &PluginJob,
        cancel: CancellationToken,
    ) -> Option<SessionState> {
        match self.run(job, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    scan_id = %job.scan,
                    session_id = %job.session,
                    error = %err,
                    "plugin session errored, marking it FAILED"
                );
                let failure = diagnostics::failure_for_error(&err);
                let finish = StateOp::SessionFinish {
                    scan: job.scan.clone(),
                    session: job.session.clone(),
                    state: SessionState::Failed,
                    at: self.clock.now_utc(),
                    failure: Some(failure),
                };
                if let Err(err) = self.state.apply(finish).await {
                    tracing::error!(
                        scan_id = %job.scan,
                        session_id = %job.session,
                        error = %err,
                        "error marking session FAILED"
                    );
                }
                Some(SessionState::Failed)
            }
        }
    }

    async fn run(
        &self,
        job: &PluginJob,
        cancel: CancellationToken,
    ) -> Result<Option<SessionState>, EngineError> {
        // Fresh read: the enqueue may be stale by the time a worker picks
        // the job up (stop requested, scan already torn down).
        let Some(scan) = self.repo.scan(&job.scan).await? else {
            tracing::error!(scan_id = %job.scan, "cannot load scan");
            return Ok(None);
        };
        if matches!(scan.state, warden_core::ScanState::Stopping | warden_core::ScanState::Stopped)
        {
            tracing::debug!(scan_id = %job.scan, state = %scan.state, "scan is stopping, refusing plugin job");
            return Ok(None);
        }
        if scan.state != warden_core::ScanState::Started {
            tracing::error!(
                scan_id = %job.scan,
                state = %scan.state,
                "scan has invalid state, expected STARTED"
            );
            return Ok(None);
        }
        let Some(session) = scan.session(&job.session).cloned() else {
            tracing::error!(scan_id = %job.scan, session_id = %job.session, "cannot find session");
            return Ok(None);
        };
        if session.state != SessionState::Queued {
            tracing::error!(
                scan_id = %job.scan,
                session_id = %job.session,
                state = %session.state,
                "session has invalid state, expected QUEUED"
            );
            return Ok(None);
        }

        self.state
            .apply(StateOp::SessionStart {
                scan: job.scan.clone(),
                session: job.session.clone(),
                at: self.clock.now_utc(),
            })
            .await?;

        let configuration =
            serde_json::Value::Object(session.configuration.clone()).to_string();
        let mut command = Command::new(&self.config.plugin_program);
        command
            .arg("-c")
            .arg(&configuration)
            .arg("-p")
            .arg(&session.plugin.class)
            .arg("-s")
            .arg(job.session.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            // TODO: fold stderr into the failure diagnostics
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let mut child = command.spawn()?;
        tracing::info!(
            scan_id = %job.scan,
            session_id = %job.session,
            plugin = %session.plugin.class,
            "plugin child spawned"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout not captured"))?;

        // Reader fibre: complete lines into a bounded channel
        let (line_tx, mut lines) = mpsc::channel::<String>(64);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            loop {
                match reader.next_line().await {
                    Ok(Some(line)) => {
                        if line_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "error reading plugin stdout");
                        break;
                    }
                }
            }
        });

        let mut usr1 = signal(SignalKind::user_defined1())?;
        let mut shutdown = Shutdown::new(child.id(), self.config.stop_grace());
        let mut finished: Option<SessionState> = None;

        loop {
            tokio::select! {
                line = lines.recv() => match line {
                    Some(line) => self.handle_line(job, &line, &mut finished).await?,
                    None => break,
                },
                _ = cancel.cancelled(), if !shutdown.requested() => shutdown.request_graceful(),
                _ = usr1.recv(), if !shutdown.requested() => shutdown.request_graceful(),
                _ = tokio::time::sleep_until(shutdown.deadline()), if shutdown.armed() => {
                    shutdown.force_kill();
                }
            }
        }

        // Stdout is closed; reap the child. A child that shut its pipe but
        // ignores the graceful signal still dies at the deadline.
        let exit = if shutdown.armed() {
            match tokio::time::timeout_at(shutdown.deadline(), child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    shutdown.force_kill();
                    child.wait().await
                }
            }
        } else {
            child.wait().await
        };
        match exit {
            Ok(status) => {
                tracing::debug!(scan_id = %job.scan, session_id = %job.session, %status, "plugin child exited")
            }
            Err(err) => {
                tracing::warn!(scan_id = %job.scan, session_id = %job.session, error = %err, "error reaping plugin child")
            }
        }

        if finished.is_none() {
            let failure = diagnostics::failure("The plugin did not finish correctly");
            self.state
                .apply(StateOp::SessionFinish {
                    scan: job.scan.clone(),
                    session: job.session.clone(),
                    state: SessionState::Failed,
                    at: self.clock.now_utc(),
                    failure: Some(failure),
                })
                .await?;
            finished = Some(SessionState::Failed);
        }

        Ok(finished)
    }

    async fn handle_line(
        &self,
        job: &PluginJob,
        line: &str,
        finished: &mut Option<SessionState>,
    ) -> Result<(), EngineError> {
        let message = match warden_wire::decode_line(line) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(
                    scan_id = %job.scan,
                    session_id = %job.session,
                    error = %err,
                    "dropping malformed plugin line"
                );
                return Ok(());
            }
        };
        if finished.is_some() {
            if !matches!(message, PluginMessage::Progress(_)) {
                tracing::error!(
                    scan_id = %job.scan,
                    session_id = %job.session,
                    "plugin emitted (ignored) message after finishing"
                );
            }
            return Ok(());
        }
        match message {
            PluginMessage::Issue(issue) => {
                self.state
                    .apply(StateOp::SessionReportIssue {
                        scan: job.scan.clone(),
                        session: job.session.clone(),
                        issue,
                    })
                    .await
            }
            PluginMessage::Artifact(artifact) => {
                self.state
                    .apply(StateOp::SessionReportArtifact {
                        scan: job.scan.clone(),
                        session: job.session.clone(),
                        artifact,
                    })
                    .await
            }
            // Reserved: accepted, not recorded
            PluginMessage::Progress(_) => Ok(()),
            PluginMessage::Finish(finish) => {
                self.state
                    .apply(StateOp::SessionFinish {
                        scan: job.scan.clone(),
                        session: job.session.clone(),
                        state: finish.state,
                        at: self.clock.now_utc(),
                        failure: finish.failure,
                    })
                    .await?;
                *finished = Some(finish.state);
                Ok(())
            }
        }
    }
}

/// Graceful-then-forced shutdown of one supervised child.
struct Shutdown {
    pid: Option<Pid>,
    grace: Duration,
    deadline: Option<Instant>,
    killed: bool,
}

impl Shutdown {
    fn new(pid: Option<u32>, grace: Duration) -> Self {
        Self {
            pid: pid.map(|p| Pid::from_raw(p as i32)),
            grace,
            deadline: None,
            killed: false,
        }
    }

    fn requested(&self) -> bool {
        self.deadline.is_some()
    }

    /// Kill timer is live: stop requested and the hard kill not yet sent.
    fn armed(&self) -> bool {
        self.requested() && !self.killed
    }

    /// Deadline for the kill timer; far future until a stop is requested.
    fn deadline(&self) -> Instant {
        self.deadline
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400))
    }

    fn request_graceful(&mut self) {
        self.signal(Signal::SIGUSR1);
        self.deadline = Some(Instant::now() + self.grace);
        tracing::info!(pid = ?self.pid, grace = ?self.grace, "graceful stop signalled to plugin child");
    }

    fn force_kill(&mut self) {
        self.signal(Signal::SIGKILL);
        self.killed = true;
        tracing::warn!(pid = ?self.pid, "plugin child ignored graceful stop, killed");
    }

    fn signal(&self, signal: Signal) {
        if let Some(pid) = self.pid {
            // ESRCH just means the child already exited
            if let Err(err) = kill(pid, signal) {
                tracing::debug!(%pid, ?signal, error = %err, "signal delivery failed");
            }
        }
    }
}

#[async_trait]
impl<C: Clock> TaskHandler for PluginRunner<C> {
    async fn run(&self, task: Task) -> Result<serde_json::Value, BusError> {
        let job: PluginJob = match serde_json::from_value(task.payload) {
            Ok(job) => job,
            Err(err) => {
                tracing::error!(task = %task.id, error = %err, "undecodable plugin job");
                return Ok(serde_json::Value::Null);
            }
        };
        let outcome = self.execute(&job, task.cancel).await;
        Ok(serde_json::to_value(outcome).unwrap_or(serde_json::Value::Null))
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
