// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message set streamed by a plugin child over stdout.

use serde::{Deserialize, Serialize};
use warden_core::{Failure, Issue, SessionState};

/// Errors raised while decoding a plugin stdout line.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid message line: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("finish reported non-terminal state {0}")]
    NonTerminalFinish(SessionState),
}

/// Progress report. Accepted but not recorded in this revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Progress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Terminal report: the state the session ends in, with optional diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finish {
    pub state: SessionState,
    #[serde(default)]
    pub failure: Option<Failure>,
}

/// One line of the plugin stdout stream.
///
/// The tag set is closed; lines with unknown tags fail to decode and are
/// discarded by the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", content = "data", rename_all = "lowercase")]
pub enum PluginMessage {
    Issue(Issue),
    Artifact(serde_json::Value),
    Progress(Progress),
    Finish(Finish),
}

/// Decode one complete line of plugin output.
///
/// A `finish` must name a terminal session state; anything else is a
/// protocol error (the plugin cannot put its own session back to `QUEUED`).
pub fn decode_line(line: &str) -> Result<PluginMessage, ProtocolError> {
    let message: PluginMessage = serde_json::from_str(line.trim_end())?;
    if let PluginMessage::Finish(finish) = &message {
        if !finish.state.is_terminal() {
            return Err(ProtocolError::NonTerminalFinish(finish.state));
        }
    }
    Ok(message)
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
