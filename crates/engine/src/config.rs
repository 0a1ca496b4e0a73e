// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration. Loading it from files or the environment is the
//! embedder's concern; tests construct it directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use warden_core::{AccessPolicy, WeightClass};

/// Queue names the engine serves and dispatches on.
///
/// Heavy and light plugin sessions route to their dedicated queues when
/// configured, otherwise everything shares the `plugin` queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub state: String,
    pub scan: String,
    pub plugin: String,
    pub plugin_heavy: Option<String>,
    pub plugin_light: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            state: "state".to_string(),
            scan: "scan".to_string(),
            plugin: "plugin".to_string(),
            plugin_heavy: None,
            plugin_light: None,
        }
    }
}

impl QueueConfig {
    /// Queue a session routes to, by its plugin's weight class.
    pub fn for_weight(&self, weight: WeightClass) -> &str {
        match weight {
            WeightClass::Heavy => self.plugin_heavy.as_deref().unwrap_or(&self.plugin),
            WeightClass::Light => self.plugin_light.as_deref().unwrap_or(&self.plugin),
            WeightClass::Unspecified => &self.plugin,
        }
    }

    /// All distinct plugin queues that need a worker.
    pub fn plugin_queues(&self) -> Vec<&str> {
        let mut queues = vec![self.plugin.as_str()];
        for extra in [self.plugin_heavy.as_deref(), self.plugin_light.as_deref()] {
            if let Some(name) = extra {
                if !queues.contains(&name) {
                    queues.push(name);
                }
            }
        }
        queues
    }
}

/// Knobs for the orchestration core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable name of the plugin child, resolved via `PATH`.
    pub plugin_program: String,
    /// Grace window between the graceful stop signal and `KILL`.
    pub stop_grace_ms: u64,
    /// HTTP timeout for the terminal-state callback webhook.
    pub callback_timeout_ms: u64,
    /// Workers serving the `scan` queue. The `state` queue is always served
    /// by a single consumer and each plugin queue by one worker per process.
    pub scan_workers: usize,
    pub queues: QueueConfig,
    /// IPv4 allow/deny lists evaluated at admission.
    pub access: AccessPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plugin_program: "minion-plugin-runner".to_string(),
            stop_grace_ms: 10_000,
            callback_timeout_ms: 30_000,
            scan_workers: 4,
            queues: QueueConfig::default(),
            access: AccessPolicy::open(),
        }
    }
}

impl EngineConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
