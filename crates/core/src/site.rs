// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sites: known targets with ownership-verification settings and tags.

use serde::{Deserialize, Serialize};

/// Ownership verification settings for a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Verification {
    pub enabled: bool,
    /// Token the external verifier looks for at the target.
    #[serde(default)]
    pub value: Option<String>,
}

/// A registered target. Scans against unknown sites are aborted at admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub url: String,
    #[serde(default)]
    pub verification: Verification,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Site {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            verification: Verification::default(),
            tags: Vec::new(),
        }
    }

    crate::setters! {
        set {
            verification: Verification,
            tags: Vec<String>,
        }
    }
}
