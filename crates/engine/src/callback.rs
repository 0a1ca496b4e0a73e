// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-state callback webhook.
//!
//! Fired once per terminal transition of a scan whose configuration names a
//! callback URL. Failures are logged and swallowed; the webhook never
//! alters the scan's recorded state.

use std::time::Duration;
use warden_core::{ScanId, ScanState};

#[derive(Clone)]
pub struct CallbackClient {
    http: reqwest::Client,
}

impl CallbackClient {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }

    /// POST `{event: "scan-state", id, state}` to the callback URL.
    pub async fn scan_state(&self, url: &str, scan: &ScanId, state: ScanState) {
        let body = serde_json::json!({
            "event": "scan-state",
            "id": scan,
            "state": state,
        });
        let outcome = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        if let Err(err) = outcome {
            tracing::warn!(
                scan_id = %scan,
                url,
                error = %err,
                "(ignored) scan state callback failed"
            );
        }
    }
}
