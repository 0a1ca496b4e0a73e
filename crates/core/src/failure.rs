// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured failure diagnostics attached to scans and sessions.

use serde::{Deserialize, Serialize};

/// Diagnostic record written when a scan or session ends abnormally.
///
/// `reason` is a machine-readable tag (e.g. `"target-blacklisted"`) set for
/// admission failures; `exception` carries a captured error chain when an
/// unexpected error was the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub message: String,
    #[serde(default)]
    pub exception: Option<String>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            hostname: None,
            reason: None,
            message: message.into(),
            exception: None,
        }
    }

    crate::setters! {
        option {
            hostname: String,
            reason: String,
            exception: String,
        }
    }
}
