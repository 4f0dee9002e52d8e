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

//! Host-wide system protection for inbound traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use sluice_core::{
    AtomicF64, BlockError, EntryType, LimitType, RuleError, StatisticsNode, SystemRule,
    SystemStatus,
};

/// Owns the merged system rule and applies it to inbound entries.
///
/// Loading folds every valid rule into one holding the strictest value of each
/// threshold. The load threshold is also published through a shared handle so
/// the system monitor can flag high-load samples without reading the rules.
#[derive(Debug)]
pub struct SystemRuleManager {
    rule: RwLock<Arc<SystemRule>>,
    check_enabled: AtomicBool,
    load_threshold: Arc<AtomicF64>,
}

impl SystemRuleManager {
    /// Creates a manager with no thresholds set.
    pub fn new() -> Self {
        Self {
            rule: RwLock::new(Arc::new(SystemRule::default())),
            check_enabled: AtomicBool::new(false),
            load_threshold: Arc::new(AtomicF64::new(f64::MAX)),
        }
    }

    /// Replaces the active rules, returning how many were accepted.
    pub fn load_rules(&self, rules: Vec<SystemRule>) -> usize {
        let submitted = rules.len();
        let valid: Vec<SystemRule> = rules
            .into_iter()
            .filter(|rule| match rule.validate() {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("Skipping system rule: {}", err);
                    false
                }
            })
            .collect();

        let merged = SystemRule::merge(&valid);
        let enabled = merged.is_set();
        self.load_threshold.store(
            merged.highest_system_load.unwrap_or(f64::MAX),
            Ordering::SeqCst,
        );
        *self.rule.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(merged.clone());
        self.check_enabled.store(enabled, Ordering::SeqCst);

        log::info!(
            "SystemRuleManager: Loaded {} of {} system rules, effective {:?}",
            valid.len(),
            submitted,
            merged
        );
        valid.len()
    }

    /// Parses a JSON array of rules and loads it.
    pub fn load_json(&self, json: &str) -> Result<usize, RuleError> {
        let rules = SystemRule::list_from_json(json)?;
        Ok(self.load_rules(rules))
    }

    /// Returns the merged rule currently in force.
    pub fn current_rule(&self) -> SystemRule {
        self.rule
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .clone()
    }

    /// Returns true if any threshold is set.
    pub fn is_enabled(&self) -> bool {
        self.check_enabled.load(Ordering::SeqCst)
    }

    /// The shared load threshold, `f64::MAX` while unset.
    pub fn load_threshold_handle(&self) -> Arc<AtomicF64> {
        Arc::clone(&self.load_threshold)
    }

    /// Checks an entry against the merged thresholds.
    ///
    /// `root` holds the statistics of all inbound traffic to the process and
    /// `status` the latest host sample. Outbound entries are never blocked.
    pub fn check(
        &self,
        resource: &str,
        entry_type: EntryType,
        acquire_count: i32,
        root: &dyn StatisticsNode,
        status: &dyn SystemStatus,
    ) -> Result<(), BlockError> {
        if entry_type != EntryType::In || !self.is_enabled() {
            return Ok(());
        }

        let rule = Arc::clone(&self.rule.read().unwrap_or_else(PoisonError::into_inner));
        let block = |limit_type: LimitType| -> Result<(), BlockError> {
            log::debug!("System protection blocked '{}' ({})", resource, limit_type);
            Err(BlockError::System {
                resource: resource.to_string(),
                limit_type,
            })
        };

        if let Some(qps) = rule.qps {
            if root.pass_qps() + f64::from(acquire_count) > qps {
                return block(LimitType::Qps);
            }
        }

        let threads = root.cur_thread_num();
        if let Some(max_thread) = rule.max_thread {
            if i64::from(threads) > max_thread {
                return block(LimitType::Thread);
            }
        }

        if let Some(avg_rt) = rule.avg_rt {
            if root.avg_rt() > avg_rt as f64 {
                return block(LimitType::Rt);
            }
        }

        let snapshot = status.snapshot();
        if let (Some(limit), Some(load)) = (rule.highest_system_load, snapshot.known_load()) {
            if load > limit && !within_estimated_capacity(root, threads) {
                return block(LimitType::Load);
            }
        }

        if let (Some(limit), Some(cpu)) = (rule.highest_cpu_usage, snapshot.known_cpu_usage()) {
            if cpu > limit {
                return block(LimitType::Cpu);
            }
        }

        Ok(())
    }
}

impl Default for SystemRuleManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Little's-law estimate of whether concurrency is still within what the
/// process has proven it can serve: `max_success_qps * min_rt / 1000`.
///
/// High load alone does not shed traffic while this holds.
fn within_estimated_capacity(root: &dyn StatisticsNode, threads: u32) -> bool {
    let threads = f64::from(threads);
    !(threads > 1.0 && threads > root.max_success_qps() * root.min_rt() / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::testing::FixedNode;
    use sluice_core::SystemSnapshot;

    struct Fixed(SystemSnapshot);

    impl SystemStatus for Fixed {
        fn snapshot(&self) -> SystemSnapshot {
            self.0
        }
    }

    fn manager(rule: SystemRule) -> SystemRuleManager {
        let manager = SystemRuleManager::new();
        manager.load_rules(vec![rule]);
        manager
    }

    fn check(
        manager: &SystemRuleManager,
        root: &FixedNode,
        status: SystemSnapshot,
    ) -> Result<(), BlockError> {
        manager.check("GET /orders", EntryType::In, 1, root, &Fixed(status))
    }

    fn limit_type(result: Result<(), BlockError>) -> Option<LimitType> {
        match result {
            Err(BlockError::System { limit_type, .. }) => Some(limit_type),
            _ => None,
        }
    }

    #[test]
    fn test_disabled_without_thresholds() {
        let manager = SystemRuleManager::new();
        let root = FixedNode::new();
        root.set_pass_qps(1e9);
        assert!(!manager.is_enabled());
        assert!(check(&manager, &root, SystemSnapshot::UNKNOWN).is_ok());
    }

    #[test]
    fn test_qps_threshold() {
        let manager = manager(SystemRule {
            qps: Some(100.0),
            ..Default::default()
        });
        let root = FixedNode::new();
        root.set_pass_qps(99.0);
        assert!(check(&manager, &root, SystemSnapshot::UNKNOWN).is_ok());
        root.set_pass_qps(99.5);
        assert_eq!(
            limit_type(check(&manager, &root, SystemSnapshot::UNKNOWN)),
            Some(LimitType::Qps)
        );
    }

    #[test]
    fn test_thread_and_rt_thresholds() {
        let manager = manager(SystemRule {
            max_thread: Some(10),
            avg_rt: Some(200),
            ..Default::default()
        });
        let root = FixedNode::new();
        root.set_threads(10);
        root.set_avg_rt(200.0);
        assert!(check(&manager, &root, SystemSnapshot::UNKNOWN).is_ok());

        root.set_threads(11);
        assert_eq!(
            limit_type(check(&manager, &root, SystemSnapshot::UNKNOWN)),
            Some(LimitType::Thread)
        );

        root.set_threads(1);
        root.set_avg_rt(201.0);
        assert_eq!(
            limit_type(check(&manager, &root, SystemSnapshot::UNKNOWN)),
            Some(LimitType::Rt)
        );
    }

    #[test]
    fn test_high_load_sheds_only_past_capacity() {
        let manager = manager(SystemRule {
            highest_system_load: Some(4.0),
            ..Default::default()
        });
        let loaded = SystemSnapshot {
            load: 6.0,
            cpu_usage: 0.1,
        };
        let root = FixedNode::new();
        root.set_max_success_qps(100.0);
        root.set_min_rt(50.0);

        // Capacity estimate: 100 qps * 50ms = 5 concurrent requests.
        root.set_threads(5);
        assert!(check(&manager, &root, loaded).is_ok());

        root.set_threads(6);
        assert_eq!(limit_type(check(&manager, &root, loaded)), Some(LimitType::Load));

        // A single thread is never shed for load.
        root.set_max_success_qps(0.0);
        root.set_threads(1);
        assert!(check(&manager, &root, loaded).is_ok());
    }

    #[test]
    fn test_unknown_readings_pass() {
        let manager = manager(SystemRule {
            highest_system_load: Some(0.0),
            highest_cpu_usage: Some(0.0),
            ..Default::default()
        });
        let root = FixedNode::new();
        root.set_threads(100);
        assert!(check(&manager, &root, SystemSnapshot::UNKNOWN).is_ok());
    }

    #[test]
    fn test_cpu_threshold() {
        let manager = manager(SystemRule {
            highest_cpu_usage: Some(0.8),
            ..Default::default()
        });
        let root = FixedNode::new();
        let busy = SystemSnapshot {
            load: -1.0,
            cpu_usage: 0.85,
        };
        assert_eq!(limit_type(check(&manager, &root, busy)), Some(LimitType::Cpu));
    }

    #[test]
    fn test_outbound_is_never_blocked() {
        let manager = manager(SystemRule {
            qps: Some(0.0),
            ..Default::default()
        });
        let root = FixedNode::new();
        let status = Fixed(SystemSnapshot::UNKNOWN);
        let result = manager.check("db", EntryType::Out, 1, &root, &status);
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_threshold_is_published() {
        let manager = SystemRuleManager::new();
        let handle = manager.load_threshold_handle();
        assert_eq!(handle.load(Ordering::SeqCst), f64::MAX);

        manager.load_rules(vec![
            SystemRule {
                highest_system_load: Some(8.0),
                ..Default::default()
            },
            SystemRule {
                highest_system_load: Some(3.0),
                ..Default::default()
            },
        ]);
        assert_eq!(handle.load(Ordering::SeqCst), 3.0);

        manager.load_rules(Vec::new());
        assert_eq!(handle.load(Ordering::SeqCst), f64::MAX);
        assert!(!manager.is_enabled());
    }

    #[test]
    fn test_invalid_cpu_rule_is_skipped() {
        let manager = SystemRuleManager::new();
        let loaded = manager.load_rules(vec![SystemRule {
            highest_cpu_usage: Some(1.5),
            ..Default::default()
        }]);
        assert_eq!(loaded, 0);
        assert!(!manager.is_enabled());
    }
}
