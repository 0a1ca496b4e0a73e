// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plans: named, ordered workflows of plugin invocations.

use crate::session::PluginDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One step of a plan workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub plugin_name: String,
    #[serde(default)]
    pub configuration: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub description: String,
}

/// A named, ordered workflow of plugin invocations. Read-only to the
/// workflow engine; authoring and validation live outside the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub revision: u32,
    pub workflow: Vec<PlanStep>,
}

/// Registry of installed plugins: plugin name → descriptor. Scan assembly
/// resolves each workflow step through it.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, PluginDescriptor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: PluginDescriptor) {
        self.plugins.insert(descriptor.name.clone(), descriptor);
    }

    pub fn descriptor(&self, plugin_name: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(plugin_name)
    }
}

impl FromIterator<PluginDescriptor> for PluginRegistry {
    fn from_iter<I: IntoIterator<Item = PluginDescriptor>>(iter: I) -> Self {
        let mut registry = Self::new();
        for descriptor in iter {
            registry.register(descriptor);
        }
        registry
    }
}
