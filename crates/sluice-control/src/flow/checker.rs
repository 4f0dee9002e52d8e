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

//! Evaluating flow rules against an entry.

use std::sync::Arc;

use sluice_core::rule::{LIMIT_APP_DEFAULT, LIMIT_APP_OTHER};
use sluice_core::{
    BlockError, ControlStrategy, EntryContext, NodeResolver, StatisticsNode,
    TrafficShapingController,
};

use super::{names_origin, FlowRuleEntry, FlowRuleManager, FlowRuleSet};

/// Checks entries against the rules of a [`FlowRuleManager`].
#[derive(Debug, Clone)]
pub struct FlowRuleChecker {
    manager: Arc<FlowRuleManager>,
}

impl FlowRuleChecker {
    /// Creates a checker reading rules from `manager`.
    pub fn new(manager: Arc<FlowRuleManager>) -> Self {
        Self { manager }
    }

    /// Returns the manager this checker reads from.
    pub fn manager(&self) -> &Arc<FlowRuleManager> {
        &self.manager
    }

    /// Evaluates every rule of the entry's resource in load order.
    ///
    /// The first rule that refuses the entry produces the block. A rule that
    /// applies but has no statistics node is evaluated as if every reading
    /// were zero, so pacing rules still shape the traffic.
    pub fn check(
        &self,
        ctx: &EntryContext<'_>,
        resolver: &dyn NodeResolver,
        acquire_count: i32,
        prioritized: bool,
    ) -> Result<(), BlockError> {
        let rules = self.manager.snapshot();
        for entry in rules.rules_for(ctx.resource) {
            if !Self::can_pass_rule(&rules, entry, ctx, resolver, acquire_count, prioritized) {
                log::debug!(
                    "Flow rule blocked '{}' from origin '{}' (limit app: {})",
                    ctx.resource,
                    ctx.origin,
                    entry.rule.limit_app
                );
                return Err(BlockError::Flow {
                    resource: ctx.resource.to_string(),
                    limit_app: entry.rule.limit_app.clone(),
                    behavior: entry.controller.behavior(),
                });
            }
        }
        Ok(())
    }

    fn can_pass_rule(
        rules: &FlowRuleSet,
        entry: &FlowRuleEntry,
        ctx: &EntryContext<'_>,
        resolver: &dyn NodeResolver,
        acquire_count: i32,
        prioritized: bool,
    ) -> bool {
        match select_node(rules, entry, ctx, resolver) {
            Selection::Node(node) => entry
                .controller
                .can_pass(node.as_deref(), acquire_count, prioritized),
            Selection::NotApplicable => true,
        }
    }
}

/// Outcome of matching a rule against an entry.
enum Selection {
    /// The rule does not cover this entry.
    NotApplicable,
    /// The rule applies; the node may be absent when nothing has been recorded yet.
    Node(Option<Arc<dyn StatisticsNode>>),
}

/// Picks the statistics node a rule is evaluated against.
///
/// An unmatched origin, a different chain entrance or an unseen related
/// resource make the rule not apply.
fn select_node(
    rules: &FlowRuleSet,
    entry: &FlowRuleEntry,
    ctx: &EntryContext<'_>,
    resolver: &dyn NodeResolver,
) -> Selection {
    let rule = &entry.rule;
    let limit_app = rule.limit_app.as_str();

    let direct_node = if limit_app == ctx.origin && names_origin(ctx.origin) {
        ctx.origin_node.clone()
    } else if limit_app == LIMIT_APP_DEFAULT {
        ctx.cluster_node.clone()
    } else if limit_app == LIMIT_APP_OTHER && rules.is_other_origin(ctx.origin, ctx.resource) {
        ctx.origin_node.clone()
    } else {
        return Selection::NotApplicable;
    };

    let reference = rule.ref_resource.as_deref();
    match rule.strategy {
        ControlStrategy::Direct => Selection::Node(direct_node),
        ControlStrategy::Relate => match reference.and_then(|r| resolver.cluster_node(r)) {
            Some(node) => Selection::Node(Some(node)),
            None => Selection::NotApplicable,
        },
        ControlStrategy::Chain => match reference {
            Some(reference) if reference == ctx.context_name => {
                Selection::Node(ctx.chain_node.clone())
            }
            _ => Selection::NotApplicable,
        },
    }
}
