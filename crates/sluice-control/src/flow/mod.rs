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

//! Resource-scoped flow rules: the loaded rule set and the checker that
//! evaluates it.

mod checker;
mod manager;

use std::collections::HashMap;

use sluice_core::rule::{LIMIT_APP_DEFAULT, LIMIT_APP_OTHER};
use sluice_core::{FlowRule, TrafficShapingController};

use crate::controller::{ControllerSettings, ShapingController};

pub use checker::FlowRuleChecker;
pub use manager::FlowRuleManager;

/// A validated rule paired with the controller built for it.
#[derive(Debug)]
pub struct FlowRuleEntry {
    /// The rule as loaded.
    pub rule: FlowRule,
    /// The controller enforcing it. Holds per-rule state such as the virtual
    /// queue timeline or the warm-up bucket.
    pub controller: ShapingController,
}

impl FlowRuleEntry {
    /// Builds the controller for `rule`.
    pub fn new(rule: FlowRule, settings: &ControllerSettings) -> Self {
        let controller = ShapingController::for_rule(&rule, settings);
        Self { rule, controller }
    }
}

/// An immutable set of flow rules grouped by resource.
///
/// Rule loading builds a fresh set and swaps it in whole, so a set never
/// changes once published.
#[derive(Debug, Default)]
pub struct FlowRuleSet {
    by_resource: HashMap<String, Vec<FlowRuleEntry>>,
}

impl FlowRuleSet {
    /// Groups `entries` by resource, preserving load order within a resource.
    pub fn new(entries: impl IntoIterator<Item = FlowRuleEntry>) -> Self {
        let mut by_resource: HashMap<String, Vec<FlowRuleEntry>> = HashMap::new();
        for entry in entries {
            by_resource
                .entry(entry.rule.resource.clone())
                .or_default()
                .push(entry);
        }
        Self { by_resource }
    }

    /// Returns the rules protecting `resource`, in load order.
    pub fn rules_for(&self, resource: &str) -> &[FlowRuleEntry] {
        self.by_resource
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns true if `origin` is not named by any rule of `resource`.
    ///
    /// Rules with `limit_app = "other"` apply only to such origins.
    pub fn is_other_origin(&self, origin: &str, resource: &str) -> bool {
        if origin.is_empty() {
            return false;
        }
        !self
            .rules_for(resource)
            .iter()
            .any(|entry| entry.rule.limit_app == origin)
    }

    /// Returns true if at least one rule protects `resource`.
    pub fn has_rules(&self, resource: &str) -> bool {
        !self.rules_for(resource).is_empty()
    }

    /// Total number of rules across all resources.
    pub fn len(&self) -> usize {
        self.by_resource.values().map(Vec::len).sum()
    }

    /// Returns true if the set holds no rules.
    pub fn is_empty(&self) -> bool {
        self.by_resource.is_empty()
    }

    /// Iterates over every loaded rule.
    pub fn iter(&self) -> impl Iterator<Item = &FlowRuleEntry> {
        self.by_resource.values().flatten()
    }
}

/// Returns true if `limit_app` names a concrete origin rather than one of the
/// reserved selectors.
pub(crate) fn names_origin(limit_app: &str) -> bool {
    limit_app != LIMIT_APP_DEFAULT && limit_app != LIMIT_APP_OTHER
}

pub(crate) fn describe(entry: &FlowRuleEntry) -> String {
    format!(
        "{} (limit app: {}, count: {}, behavior: {:?})",
        entry.rule.resource,
        entry.rule.limit_app,
        entry.rule.count,
        entry.controller.behavior()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(rules: Vec<FlowRule>) -> FlowRuleSet {
        let settings = ControllerSettings::default();
        FlowRuleSet::new(rules.into_iter().map(|r| FlowRuleEntry::new(r, &settings)))
    }

    #[test]
    fn test_rules_are_grouped_by_resource() {
        let set = set(vec![
            FlowRule::new("a", 1.0),
            FlowRule::new("b", 2.0),
            FlowRule::new("a", 3.0),
        ]);
        assert_eq!(set.len(), 3);
        let counts: Vec<f64> = set.rules_for("a").iter().map(|e| e.rule.count).collect();
        assert_eq!(counts, vec![1.0, 3.0]);
        assert!(set.rules_for("missing").is_empty());
        assert!(!set.has_rules("missing"));
    }

    #[test]
    fn test_other_origin() {
        let set = set(vec![
            FlowRule::new("a", 1.0).with_limit_app("mobile"),
            FlowRule::new("a", 1.0).with_limit_app(LIMIT_APP_OTHER),
        ]);
        assert!(!set.is_other_origin("mobile", "a"));
        assert!(set.is_other_origin("web", "a"));
        assert!(!set.is_other_origin("", "a"));
        // No rule of "b" names anyone, so every origin is "other" there.
        assert!(set.is_other_origin("mobile", "b"));
    }

    #[test]
    fn test_reserved_limit_apps() {
        assert!(!names_origin(LIMIT_APP_DEFAULT));
        assert!(!names_origin(LIMIT_APP_OTHER));
        assert!(names_origin("mobile"));
    }
}
