use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use sluice_control::{ControllerSettings, FlowRuleChecker, FlowRuleManager, ShapingController};
use sluice_core::testing::{FixedNode, ManualClock};
use sluice_core::{
    ControlBehavior, EntryContext, EntryType, FlowRule, StatisticsNode, TrafficShapingController,
};

fn bench_controllers(c: &mut Criterion) {
    let settings = ControllerSettings::new(Arc::new(ManualClock::new(1_000_000)));
    let node = FixedNode::new();
    node.set_pass_qps(50.0);
    node.set_previous_pass_qps(50.0);

    let mut group = c.benchmark_group("Controllers");

    for behavior in [
        ControlBehavior::Default,
        ControlBehavior::WarmUp,
        ControlBehavior::RateLimiter,
        ControlBehavior::WarmUpRateLimiter,
    ] {
        // High enough that pacing never parks on the frozen clock.
        let rule = FlowRule::new("bench", 1e9).with_behavior(behavior);
        let controller = ShapingController::for_rule(&rule, &settings);
        group.bench_function(format!("{behavior:?}"), |b| {
            b.iter(|| black_box(controller.can_pass(Some(&node), 1, false)));
        });
    }

    group.finish();
}

fn bench_flow_checker(c: &mut Criterion) {
    let settings = ControllerSettings::new(Arc::new(ManualClock::new(1_000_000)));
    let manager = Arc::new(FlowRuleManager::new(settings));

    // 1,000 resources with three rules each
    let rules = (0..1_000).flat_map(|i| {
        let resource = format!("resource-{i}");
        [
            FlowRule::new(resource.clone(), 1e9),
            FlowRule::new(resource.clone(), 1e9).with_limit_app("mobile"),
            FlowRule::new(resource, 1e9).with_limit_app("other"),
        ]
    });
    manager.load_rules(rules.collect());
    let checker = FlowRuleChecker::new(manager);

    let node: Arc<dyn StatisticsNode> = Arc::new(FixedNode::new());
    let resolver = |_: &str| -> Option<Arc<dyn StatisticsNode>> { None };
    let ctx = EntryContext::new("resource-500", EntryType::In)
        .with_cluster_node(Arc::clone(&node))
        .with_origin("web", Some(Arc::clone(&node)));

    c.bench_function("Flow check (3 rules)", |b| {
        b.iter(|| black_box(checker.check(&ctx, &resolver, 1, false)));
    });
}

criterion_group!(benches, bench_controllers, bench_flow_checker);
criterion_main!(benches);
