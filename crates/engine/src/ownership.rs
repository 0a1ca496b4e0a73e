// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ownership verification seam.
//!
//! Whether a user may scan a site is decided by an external verifier (e.g.
//! fetching a well-known token from the target). The workflow only consumes
//! this trait; deployments plug their own implementation in.

use async_trait::async_trait;

#[async_trait]
pub trait OwnershipVerifier: Send + Sync {
    /// True when `target` carries the expected verification token.
    async fn verify(&self, target: &str, token: &str) -> bool;
}

/// Verifier that accepts every target. Suitable for closed deployments
/// where site registration already implies ownership.
pub struct AcceptAll;

#[async_trait]
impl OwnershipVerifier for AcceptAll {
    async fn verify(&self, _target: &str, _token: &str) -> bool {
        true
    }
}
