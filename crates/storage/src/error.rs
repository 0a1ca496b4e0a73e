// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use warden_core::{ScanId, SessionId};

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("scan not found: {0}")]
    ScanNotFound(ScanId),

    #[error("session not found: {0}/{1}")]
    SessionNotFound(ScanId, SessionId),

    #[error("issue not found: {0}")]
    IssueNotFound(warden_core::IssueId),

    #[error("document already exists: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}
