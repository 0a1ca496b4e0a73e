// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure diagnostics: structured failure records stamped with the worker
//! hostname, matching what operators see in the scan documents.

use warden_core::Failure;

/// Hostname of this worker, best effort.
pub(crate) fn hostname() -> String {
    nix::unistd::gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// A failure with just a message.
pub(crate) fn failure(message: impl Into<String>) -> Failure {
    Failure::new(message).hostname(hostname())
}

/// An admission failure with a machine-readable reason tag.
pub(crate) fn admission_failure(reason: &str, message: impl Into<String>) -> Failure {
    failure(message).reason(reason)
}

/// A failure capturing an unexpected error chain.
pub(crate) fn failure_for_error(err: &crate::error::EngineError) -> Failure {
    failure(err.to_string()).exception(format!("{err:?}"))
}
