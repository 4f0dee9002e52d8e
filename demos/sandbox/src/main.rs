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

// Sluice Sandbox
// Drives the admission engine with simulated traffic for manual testing.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sluice_core::AtomicF64;
use sluice_sdk::prelude::*;

const FLOW_RULES: &str = r#"[
    { "resource": "GET /users", "count": 10 },
    { "resource": "POST /pay", "count": 20, "controlBehavior": 2, "maxQueueingTimeMs": 200 },
    { "resource": "GET /search", "count": 30, "controlBehavior": 1, "warmUpPeriodSec": 5 }
]"#;

const SYSTEM_RULES: &str = r#"[
    { "highestSystemLoad": 64.0, "highestCpuUsage": 0.98 }
]"#;

/// Statistics whose pass rate is dialed in by the simulation.
#[derive(Debug, Default)]
struct SimulatedNode {
    pass_qps: AtomicF64,
}

impl SimulatedNode {
    fn set_pass_qps(&self, qps: f64) {
        self.pass_qps.store(qps, Ordering::Relaxed);
    }
}

impl StatisticsNode for SimulatedNode {
    fn pass_qps(&self) -> f64 {
        self.pass_qps.load(Ordering::Relaxed)
    }
    fn previous_pass_qps(&self) -> f64 {
        0.0
    }
    fn success_qps(&self) -> f64 {
        0.0
    }
    fn avg_rt(&self) -> f64 {
        0.0
    }
    fn min_rt(&self) -> f64 {
        0.0
    }
    fn max_success_qps(&self) -> f64 {
        0.0
    }
    fn cur_thread_num(&self) -> u32 {
        0
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let root = Arc::new(SimulatedNode::default());
    let users = Arc::new(SimulatedNode::default());
    let resolver = |_: &str| -> Option<Arc<dyn StatisticsNode>> { None };

    let config = EngineConfig {
        monitor: MonitorConfig {
            interval: Duration::from_millis(250),
        },
        ..EngineConfig::default()
    };
    let mut engine = AdmissionEngine::with_sysinfo(config, root.clone(), Arc::new(resolver))
        .context("failed to create admission engine")?;
    engine
        .load_flow_rules_json(FLOW_RULES)
        .context("failed to load flow rules")?;
    engine
        .load_system_rules_json(SYSTEM_RULES)
        .context("failed to load system rules")?;
    engine.start();

    // Fast fail: the observed rate climbs past the threshold.
    let ctx = EntryContext::new("GET /users", EntryType::In).with_cluster_node(users.clone());
    for qps in [0.0, 5.0, 9.0, 10.0, 15.0] {
        users.set_pass_qps(qps);
        match engine.check(&ctx, 1, false) {
            Ok(()) => log::info!("GET /users at {qps} qps: pass"),
            Err(err) => log::info!("GET /users at {qps} qps: {err}"),
        }
    }

    // Pacing: a concurrent burst is spread 50ms apart until the 200ms queue
    // bound is reached; the rest are rejected.
    let pay = Arc::new(SimulatedNode::default());
    let ctx = EntryContext::new("POST /pay", EntryType::In).with_cluster_node(pay);
    let start = Instant::now();
    thread::scope(|scope| {
        for i in 0..8 {
            let (engine, ctx) = (&engine, &ctx);
            scope.spawn(move || {
                let outcome = engine.check(ctx, 1, false);
                log::info!(
                    "POST /pay #{i} after {:?}: {}",
                    start.elapsed(),
                    if outcome.is_ok() { "pass" } else { "blocked" }
                );
            });
        }
    });

    // Warm-up: a cold resource admits only a third of its count.
    let search = Arc::new(SimulatedNode::default());
    let ctx = EntryContext::new("GET /search", EntryType::In).with_cluster_node(search.clone());
    for qps in [5.0, 9.0, 10.0, 20.0] {
        search.set_pass_qps(qps);
        let passed = engine.check(&ctx, 1, false).is_ok();
        log::info!("GET /search (cold) at {qps} qps: {}", if passed { "pass" } else { "blocked" });
    }

    std::thread::sleep(Duration::from_millis(600));
    let snapshot = engine.system_snapshot();
    log::info!(
        "Host snapshot: load={:.2}, cpu={:.3}",
        snapshot.load,
        snapshot.cpu_usage
    );

    engine.stop();
    Ok(())
}
