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

use std::collections::HashMap;
use std::sync::Arc;

use sluice_control::{ControllerSettings, FlowRuleChecker, FlowRuleManager};
use sluice_core::testing::{FixedNode, ManualClock};
use sluice_core::{
    BlockError, ControlBehavior, ControlStrategy, EntryContext, EntryType, FlowRule,
    NodeResolver, StatisticsNode,
};

/// Resolves related resources from a fixed map.
struct MapResolver(HashMap<String, Arc<dyn StatisticsNode>>);

impl MapResolver {
    fn empty() -> Self {
        Self(HashMap::new())
    }

    fn with(resource: &str, node: Arc<FixedNode>) -> Self {
        let mut map: HashMap<String, Arc<dyn StatisticsNode>> = HashMap::new();
        map.insert(resource.to_string(), node);
        Self(map)
    }
}

impl NodeResolver for MapResolver {
    fn cluster_node(&self, resource: &str) -> Option<Arc<dyn StatisticsNode>> {
        self.0.get(resource).cloned()
    }
}

fn checker(rules: Vec<FlowRule>) -> FlowRuleChecker {
    let _ = env_logger::builder().is_test(true).try_init();
    let settings = ControllerSettings::new(Arc::new(ManualClock::new(1_000_000)));
    let manager = Arc::new(FlowRuleManager::new(settings));
    manager.load_rules(rules);
    FlowRuleChecker::new(manager)
}

fn node_with_qps(qps: f64) -> Arc<FixedNode> {
    let node = Arc::new(FixedNode::new());
    node.set_pass_qps(qps);
    node
}

#[test]
fn test_resource_without_rules_passes() {
    let checker = checker(vec![FlowRule::new("other-resource", 0.0)]);
    let ctx = EntryContext::new("GET /users", EntryType::In).with_cluster_node(node_with_qps(1e6));
    assert!(checker.check(&ctx, &MapResolver::empty(), 1, false).is_ok());
}

#[test]
fn test_default_rule_reads_cluster_node() {
    let checker = checker(vec![FlowRule::new("GET /users", 10.0)]);

    let busy = EntryContext::new("GET /users", EntryType::In)
        .with_cluster_node(node_with_qps(10.0))
        .with_origin("mobile", Some(node_with_qps(0.0)));
    let err = checker
        .check(&busy, &MapResolver::empty(), 1, false)
        .unwrap_err();
    assert_eq!(
        err,
        BlockError::Flow {
            resource: "GET /users".to_string(),
            limit_app: "default".to_string(),
            behavior: ControlBehavior::Default,
        }
    );

    let quiet = EntryContext::new("GET /users", EntryType::In)
        .with_cluster_node(node_with_qps(9.0))
        .with_origin("mobile", Some(node_with_qps(1e6)));
    assert!(checker.check(&quiet, &MapResolver::empty(), 1, false).is_ok());
}

#[test]
fn test_origin_rule_applies_only_to_that_origin() {
    let checker = checker(vec![FlowRule::new("GET /users", 5.0).with_limit_app("mobile")]);

    let mobile = EntryContext::new("GET /users", EntryType::In)
        .with_origin("mobile", Some(node_with_qps(5.0)));
    assert!(checker.check(&mobile, &MapResolver::empty(), 1, false).is_err());

    let web = EntryContext::new("GET /users", EntryType::In)
        .with_origin("web", Some(node_with_qps(5.0)));
    assert!(checker.check(&web, &MapResolver::empty(), 1, false).is_ok());
}

#[test]
fn test_other_rule_covers_unnamed_origins() {
    let checker = checker(vec![
        FlowRule::new("GET /users", 100.0).with_limit_app("mobile"),
        FlowRule::new("GET /users", 1.0).with_limit_app("other"),
    ]);

    let web = EntryContext::new("GET /users", EntryType::In)
        .with_origin("web", Some(node_with_qps(1.0)));
    let err = checker
        .check(&web, &MapResolver::empty(), 1, false)
        .unwrap_err();
    assert!(matches!(err, BlockError::Flow { ref limit_app, .. } if limit_app == "other"));

    // "mobile" has its own rule, so the catch-all does not apply to it.
    let mobile = EntryContext::new("GET /users", EntryType::In)
        .with_origin("mobile", Some(node_with_qps(1.0)));
    assert!(checker.check(&mobile, &MapResolver::empty(), 1, false).is_ok());

    // Nor does it apply when the origin is unknown.
    let anonymous = EntryContext::new("GET /users", EntryType::In);
    assert!(checker.check(&anonymous, &MapResolver::empty(), 1, false).is_ok());
}

#[test]
fn test_relate_rule_reads_related_resource() {
    let checker = checker(vec![FlowRule::new("write", 5.0)
        .with_strategy(ControlStrategy::Relate, "read")]);
    let ctx = EntryContext::new("write", EntryType::In).with_cluster_node(node_with_qps(0.0));

    let busy_reads = MapResolver::with("read", node_with_qps(5.0));
    assert!(checker.check(&ctx, &busy_reads, 1, false).is_err());

    let quiet_reads = MapResolver::with("read", node_with_qps(1.0));
    assert!(checker.check(&ctx, &quiet_reads, 1, false).is_ok());

    // An unseen related resource has no statistics yet.
    assert!(checker.check(&ctx, &MapResolver::empty(), 1, false).is_ok());
}

#[test]
fn test_chain_rule_applies_only_through_its_entrance() {
    let checker = checker(vec![FlowRule::new("query", 3.0)
        .with_strategy(ControlStrategy::Chain, "entrance-a")]);

    let via_a = EntryContext::new("query", EntryType::In)
        .with_cluster_node(node_with_qps(0.0))
        .with_context("entrance-a", Some(node_with_qps(3.0)));
    assert!(checker.check(&via_a, &MapResolver::empty(), 1, false).is_err());

    let via_b = EntryContext::new("query", EntryType::In)
        .with_cluster_node(node_with_qps(0.0))
        .with_context("entrance-b", Some(node_with_qps(3.0)));
    assert!(checker.check(&via_b, &MapResolver::empty(), 1, false).is_ok());
}

#[test]
fn test_missing_node_is_read_as_idle() {
    let checker = checker(vec![FlowRule::new("GET /users", 2.0)]);
    let ctx = EntryContext::new("GET /users", EntryType::Out);
    assert!(checker.check(&ctx, &MapResolver::empty(), 2, false).is_ok());
    assert!(checker.check(&ctx, &MapResolver::empty(), 3, false).is_err());
}

#[test]
fn test_origin_rule_without_origin_node_still_applies() {
    let checker = checker(vec![FlowRule::new("GET /users", 1.0).with_limit_app("mobile")]);
    let ctx = EntryContext::new("GET /users", EntryType::In).with_origin("mobile", None);
    assert!(checker.check(&ctx, &MapResolver::empty(), 1, false).is_ok());
    assert!(checker.check(&ctx, &MapResolver::empty(), 2, false).is_err());
}

#[test]
fn test_pacing_rule_shapes_entries_without_statistics() {
    let checker = checker(vec![FlowRule::new("POST /pay", 10.0)
        .with_behavior(ControlBehavior::RateLimiter)
        .with_max_queueing_time_ms(150)]);
    let ctx = EntryContext::new("POST /pay", EntryType::In);

    let admitted = (0..5)
        .filter(|_| checker.check(&ctx, &MapResolver::empty(), 1, false).is_ok())
        .count();
    // One immediate pass plus one queued 100ms behind it.
    assert_eq!(admitted, 2);
}

#[test]
fn test_first_refusing_rule_is_reported() {
    let checker = checker(vec![
        FlowRule::new("GET /users", 100.0),
        FlowRule::new("GET /users", 5.0).with_behavior(ControlBehavior::WarmUp),
        FlowRule::new("GET /users", 1.0).with_behavior(ControlBehavior::Default),
    ]);
    let ctx = EntryContext::new("GET /users", EntryType::In).with_cluster_node(node_with_qps(8.0));

    let err = checker
        .check(&ctx, &MapResolver::empty(), 1, false)
        .unwrap_err();
    assert!(matches!(
        err,
        BlockError::Flow {
            behavior: ControlBehavior::WarmUp,
            ..
        }
    ));
}
