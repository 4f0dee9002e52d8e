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

//! Host-wide system protection rules.

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Thresholds that protect the whole process from overload.
///
/// Each threshold is optional; any one that is breached sheds inbound traffic.
/// Negative values are accepted in documents and treated as unset, matching
/// rule sources that encode "unset" as `-1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRule {
    /// Highest allowed one-minute load average.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_system_load: Option<f64>,
    /// Highest allowed CPU usage fraction, in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_cpu_usage: Option<f64>,
    /// Highest allowed entry-point requests per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qps: Option<f64>,
    /// Highest allowed entry-point average response time, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_rt: Option<i64>,
    /// Highest allowed number of concurrent entry-point threads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_thread: Option<i64>,
}

fn non_negative_f64(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v >= 0.0)
}

fn non_negative_i64(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v >= 0)
}

fn min_f64(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn min_i64(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl SystemRule {
    /// Returns a copy with every negative threshold cleared.
    pub fn normalized(&self) -> Self {
        Self {
            highest_system_load: non_negative_f64(self.highest_system_load),
            highest_cpu_usage: non_negative_f64(self.highest_cpu_usage),
            qps: non_negative_f64(self.qps),
            avg_rt: non_negative_i64(self.avg_rt),
            max_thread: non_negative_i64(self.max_thread),
        }
    }

    /// Returns true if at least one threshold is set.
    pub fn is_set(&self) -> bool {
        let rule = self.normalized();
        rule.highest_system_load.is_some()
            || rule.highest_cpu_usage.is_some()
            || rule.qps.is_some()
            || rule.avg_rt.is_some()
            || rule.max_thread.is_some()
    }

    /// Checks the rule for configuration errors.
    pub fn validate(&self) -> Result<(), RuleError> {
        if let Some(cpu) = self.highest_cpu_usage {
            if cpu.is_nan() || cpu > 1.0 {
                return Err(RuleError::InvalidCpuUsage(cpu));
            }
        }
        Ok(())
    }

    /// Folds a rule set into one rule holding the strictest value of each threshold.
    pub fn merge<'a>(rules: impl IntoIterator<Item = &'a SystemRule>) -> SystemRule {
        rules
            .into_iter()
            .map(SystemRule::normalized)
            .fold(SystemRule::default(), |acc, rule| SystemRule {
                highest_system_load: min_f64(acc.highest_system_load, rule.highest_system_load),
                highest_cpu_usage: min_f64(acc.highest_cpu_usage, rule.highest_cpu_usage),
                qps: min_f64(acc.qps, rule.qps),
                avg_rt: min_i64(acc.avg_rt, rule.avg_rt),
                max_thread: min_i64(acc.max_thread, rule.max_thread),
            })
    }

    /// Parses a JSON array of system rules.
    pub fn list_from_json(json: &str) -> Result<Vec<SystemRule>, RuleError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_strictest_thresholds() {
        let rules = vec![
            SystemRule {
                highest_system_load: Some(8.0),
                qps: Some(500.0),
                ..Default::default()
            },
            SystemRule {
                highest_system_load: Some(4.0),
                max_thread: Some(64),
                ..Default::default()
            },
            SystemRule {
                qps: Some(-1.0),
                avg_rt: Some(200),
                ..Default::default()
            },
        ];

        let merged = SystemRule::merge(&rules);
        assert_eq!(merged.highest_system_load, Some(4.0));
        assert_eq!(merged.qps, Some(500.0));
        assert_eq!(merged.max_thread, Some(64));
        assert_eq!(merged.avg_rt, Some(200));
        assert_eq!(merged.highest_cpu_usage, None);
    }

    #[test]
    fn test_negative_thresholds_are_unset() {
        let rule = SystemRule {
            highest_system_load: Some(-1.0),
            max_thread: Some(-1),
            ..Default::default()
        };
        assert!(!rule.is_set());
        assert!(!SystemRule::default().is_set());
    }

    #[test]
    fn test_cpu_usage_must_be_a_fraction() {
        let rule = SystemRule {
            highest_cpu_usage: Some(80.0),
            ..Default::default()
        };
        assert!(matches!(rule.validate(), Err(RuleError::InvalidCpuUsage(_))));
    }

    #[test]
    fn test_parse_rule_source_document() {
        let rules = SystemRule::list_from_json(
            r#"[{"highestSystemLoad": 3.5, "highestCpuUsage": -1, "qps": -1, "avgRt": 100, "maxThread": -1}]"#,
        )
        .unwrap();
        let merged = SystemRule::merge(&rules);
        assert_eq!(merged.highest_system_load, Some(3.5));
        assert_eq!(merged.avg_rt, Some(100));
        assert_eq!(merged.highest_cpu_usage, None);
    }
}
