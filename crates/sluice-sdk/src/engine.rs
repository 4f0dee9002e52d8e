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

//! The admission engine facade.

use std::sync::Arc;

use anyhow::Result;
use sluice_control::{ControllerSettings, FlowRuleChecker, FlowRuleManager, SystemRuleManager};
use sluice_core::rule::{DEFAULT_COLD_FACTOR, DEFAULT_OCCUPY_TIMEOUT_MS};
use sluice_core::{
    BlockError, Clock, EntryContext, FlowRule, NodeResolver, ProbeError, RuleError,
    StatisticsNode, SystemClock, SystemMetricsProvider, SystemRule, SystemSnapshot, SystemStatus,
};
use sluice_infra::SysinfoMetricsProvider;
use sluice_telemetry::{AdaptiveSystemMonitor, MonitorConfig, SystemStatusService};

/// Configuration for the [`AdmissionEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sampling settings for the system monitor.
    pub monitor: MonitorConfig,
    /// Cold factor for warm-up rules that do not set their own.
    pub cold_factor: u32,
    /// Longest a prioritized request may wait to borrow from the next window.
    pub occupy_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            cold_factor: DEFAULT_COLD_FACTOR,
            occupy_timeout_ms: DEFAULT_OCCUPY_TIMEOUT_MS,
        }
    }
}

/// Decides whether entries may proceed.
///
/// Inbound entries first pass system protection, which reads the inbound
/// `root` statistics and the monitor's latest snapshot. Every entry then
/// passes the flow rules of its resource.
pub struct AdmissionEngine {
    flow_checker: FlowRuleChecker,
    system_rules: SystemRuleManager,
    monitor: Arc<AdaptiveSystemMonitor>,
    service: SystemStatusService,
    root: Arc<dyn StatisticsNode>,
    resolver: Arc<dyn NodeResolver>,
}

impl AdmissionEngine {
    /// Creates an engine with no rules and a stopped monitor.
    ///
    /// `root` holds the statistics of all inbound traffic; `resolver` looks up
    /// the statistics of related resources.
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn SystemMetricsProvider>,
        root: Arc<dyn StatisticsNode>,
        resolver: Arc<dyn NodeResolver>,
    ) -> Self {
        let settings = ControllerSettings {
            clock,
            cold_factor: config.cold_factor,
            occupy_timeout_ms: config.occupy_timeout_ms,
        };
        let flow_checker = FlowRuleChecker::new(Arc::new(FlowRuleManager::new(settings)));

        let system_rules = SystemRuleManager::new();
        let monitor = Arc::new(
            AdaptiveSystemMonitor::new(provider, system_rules.load_threshold_handle())
                .with_root_node(Arc::clone(&root)),
        );
        let service = SystemStatusService::new(config.monitor, Arc::clone(&monitor));

        Self {
            flow_checker,
            system_rules,
            monitor,
            service,
            root,
            resolver,
        }
    }

    /// Creates an engine on the wall clock, sampling this host through sysinfo.
    pub fn with_sysinfo(
        config: EngineConfig,
        root: Arc<dyn StatisticsNode>,
        resolver: Arc<dyn NodeResolver>,
    ) -> Result<Self> {
        let provider = SysinfoMetricsProvider::new()?;
        Ok(Self::new(
            config,
            Arc::new(SystemClock::new()),
            Arc::new(provider),
            root,
            resolver,
        ))
    }

    /// Starts background system sampling.
    pub fn start(&mut self) {
        self.service.start();
        log::info!("AdmissionEngine: started");
    }

    /// Stops background system sampling.
    pub fn stop(&mut self) {
        self.service.stop();
        log::info!("AdmissionEngine: stopped");
    }

    /// Returns true while background sampling runs.
    pub fn is_running(&self) -> bool {
        self.service.is_running()
    }

    /// Replaces the flow rules, returning how many were loaded.
    pub fn load_flow_rules(&self, rules: Vec<FlowRule>) -> usize {
        self.flow_checker.manager().load_rules(rules)
    }

    /// Parses and loads a JSON array of flow rules.
    pub fn load_flow_rules_json(&self, json: &str) -> Result<usize, RuleError> {
        self.flow_checker.manager().load_json(json)
    }

    /// Returns the active flow rules.
    pub fn flow_rules(&self) -> Vec<FlowRule> {
        self.flow_checker.manager().rules()
    }

    /// Replaces the system rules, returning how many were loaded.
    pub fn load_system_rules(&self, rules: Vec<SystemRule>) -> usize {
        self.system_rules.load_rules(rules)
    }

    /// Parses and loads a JSON array of system rules.
    pub fn load_system_rules_json(&self, json: &str) -> Result<usize, RuleError> {
        self.system_rules.load_json(json)
    }

    /// Returns the merged system rule in force.
    pub fn system_rule(&self) -> SystemRule {
        self.system_rules.current_rule()
    }

    /// Checks whether `acquire_count` units of `ctx` may proceed.
    ///
    /// May park the calling thread when a pacing rule queues the entry.
    pub fn check(
        &self,
        ctx: &EntryContext<'_>,
        acquire_count: i32,
        prioritized: bool,
    ) -> Result<(), BlockError> {
        self.system_rules.check(
            ctx.resource,
            ctx.entry_type,
            acquire_count,
            self.root.as_ref(),
            self.monitor.as_ref(),
        )?;
        self.flow_checker
            .check(ctx, self.resolver.as_ref(), acquire_count, prioritized)
    }

    /// Returns the latest sampled host load and CPU usage.
    pub fn system_snapshot(&self) -> SystemSnapshot {
        self.monitor.snapshot()
    }

    /// Takes a system sample immediately, outside the background schedule.
    pub fn sample_now(&self) -> Result<SystemSnapshot, ProbeError> {
        self.monitor.sample()
    }
}

impl std::fmt::Debug for AdmissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionEngine")
            .field("flow_rules", &self.flow_checker.manager().snapshot().len())
            .field("system_rule", &self.system_rules.current_rule())
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
