// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loading and publishing flow rules.

use std::sync::{Arc, PoisonError, RwLock};

use sluice_core::{FlowRule, RuleError};

use super::{describe, FlowRuleEntry, FlowRuleSet};
use crate::controller::ControllerSettings;

/// Owns the active flow rule set.
///
/// Loading replaces the whole set at once. Readers take a snapshot (an `Arc`
/// clone) and keep evaluating against it even if a reload happens meanwhile.
#[derive(Debug)]
pub struct FlowRuleManager {
    settings: ControllerSettings,
    rules: RwLock<Arc<FlowRuleSet>>,
}

impl FlowRuleManager {
    /// Creates a manager with no rules.
    pub fn new(settings: ControllerSettings) -> Self {
        Self {
            settings,
            rules: RwLock::new(Arc::new(FlowRuleSet::default())),
        }
    }

    /// Returns the settings controllers are built with.
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Replaces the active rules, returning how many were loaded.
    ///
    /// Invalid rules are skipped with a warning; the rest still load. Every
    /// controller is rebuilt, so queue timelines and warm-up buckets restart.
    pub fn load_rules(&self, rules: Vec<FlowRule>) -> usize {
        let submitted = rules.len();
        let entries: Vec<FlowRuleEntry> = rules
            .into_iter()
            .filter_map(|rule| match rule.validate(self.settings.cold_factor) {
                Ok(()) => Some(FlowRuleEntry::new(rule, &self.settings)),
                Err(err) => {
                    log::warn!("Skipping flow rule for '{}': {}", rule.resource, err);
                    None
                }
            })
            .collect();

        for entry in &entries {
            log::debug!("Flow rule loaded: {}", describe(entry));
        }

        let set = Arc::new(FlowRuleSet::new(entries));
        let loaded = set.len();
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = set;

        log::info!(
            "FlowRuleManager: Loaded {} of {} flow rules",
            loaded,
            submitted
        );
        loaded
    }

    /// Parses a JSON array of rules and loads it.
    ///
    /// A malformed document leaves the active rules untouched.
    pub fn load_json(&self, json: &str) -> Result<usize, RuleError> {
        let rules = FlowRule::list_from_json(json)?;
        Ok(self.load_rules(rules))
    }

    /// Returns the active rule set.
    pub fn snapshot(&self) -> Arc<FlowRuleSet> {
        Arc::clone(&self.rules.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns a copy of every active rule.
    pub fn rules(&self) -> Vec<FlowRule> {
        self.snapshot().iter().map(|e| e.rule.clone()).collect()
    }

    /// Returns true if `resource` has at least one active rule.
    pub fn has_config(&self, resource: &str) -> bool {
        self.snapshot().has_rules(resource)
    }
}

impl Default for FlowRuleManager {
    fn default() -> Self {
        Self::new(ControllerSettings::default())
    }
}
