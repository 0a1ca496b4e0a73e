// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use warden_core::{ScanId, ScanState, SessionId};

/// Orchestration errors.
///
/// Inside queue jobs these never cross the task boundary: the workflow and
/// runner convert them into terminal `FAILED` states with diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] warden_storage::StorageError),

    #[error(transparent)]
    Bus(#[from] warden_bus::BusError),

    #[error("scan not found: {0}")]
    ScanNotFound(ScanId),

    #[error("session not found: {0}/{1}")]
    SessionNotFound(ScanId, SessionId),

    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error(transparent)]
    UnknownPlugin(#[from] warden_core::scan::UnknownPlugin),

    #[error("scan {id} is {actual}, expected {expected}")]
    InvalidScanState {
        id: ScanId,
        expected: ScanState,
        actual: ScanState,
    },

    #[error("scan already terminal: {0}")]
    ScanAlreadyTerminal(ScanId),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed task payload: {0}")]
    Payload(#[from] serde_json::Error),
}
