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

//! Resource-scoped flow rules.

use serde::{Deserialize, Serialize};

use super::{
    ControlBehavior, ControlStrategy, FlowGrade, DEFAULT_MAX_QUEUEING_TIME_MS,
    DEFAULT_WARM_UP_PERIOD_SEC, LIMIT_APP_DEFAULT,
};
use crate::error::RuleError;

fn default_limit_app() -> String {
    LIMIT_APP_DEFAULT.to_string()
}

fn default_warm_up_period_sec() -> u32 {
    DEFAULT_WARM_UP_PERIOD_SEC
}

fn default_max_queueing_time_ms() -> u64 {
    DEFAULT_MAX_QUEUEING_TIME_MS
}

/// A flow rule: a threshold on one resource plus how excess traffic is shaped.
///
/// Field names follow the camelCase JSON documents rule sources publish, and
/// every optional field falls back to the documented default when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRule {
    /// The resource this rule protects.
    pub resource: String,
    /// Which callers the rule applies to: `default`, `other` or an origin name.
    #[serde(default = "default_limit_app")]
    pub limit_app: String,
    /// The statistic the threshold is compared against.
    #[serde(default)]
    pub grade: FlowGrade,
    /// The threshold (threads, or requests per second).
    pub count: f64,
    /// Which resource's statistics the threshold is evaluated against.
    #[serde(default)]
    pub strategy: ControlStrategy,
    /// The related resource (`Relate`) or entrance (`Chain`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_resource: Option<String>,
    /// How traffic above the threshold is shaped.
    #[serde(default)]
    pub control_behavior: ControlBehavior,
    /// Length of the warm-up ramp, in seconds.
    #[serde(default = "default_warm_up_period_sec")]
    pub warm_up_period_sec: u32,
    /// Longest a request may queue in a rate limiter, in milliseconds.
    #[serde(default = "default_max_queueing_time_ms")]
    pub max_queueing_time_ms: u64,
    /// Ratio between the full rate and the cold rate of the warm-up ramp.
    ///
    /// `None` uses the engine-wide default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cold_factor: Option<u32>,
}

impl FlowRule {
    /// Creates a direct, fast-fail QPS rule for `resource`.
    pub fn new(resource: impl Into<String>, count: f64) -> Self {
        Self {
            resource: resource.into(),
            limit_app: default_limit_app(),
            grade: FlowGrade::Qps,
            count,
            strategy: ControlStrategy::Direct,
            ref_resource: None,
            control_behavior: ControlBehavior::Default,
            warm_up_period_sec: DEFAULT_WARM_UP_PERIOD_SEC,
            max_queueing_time_ms: DEFAULT_MAX_QUEUEING_TIME_MS,
            cold_factor: None,
        }
    }

    /// Sets the statistic the threshold is compared against.
    pub fn with_grade(mut self, grade: FlowGrade) -> Self {
        self.grade = grade;
        self
    }

    /// Sets the callers the rule applies to.
    pub fn with_limit_app(mut self, limit_app: impl Into<String>) -> Self {
        self.limit_app = limit_app.into();
        self
    }

    /// Evaluates the rule against `ref_resource` using `strategy`.
    pub fn with_strategy(mut self, strategy: ControlStrategy, ref_resource: impl Into<String>) -> Self {
        self.strategy = strategy;
        self.ref_resource = Some(ref_resource.into());
        self
    }

    /// Sets how traffic above the threshold is shaped.
    pub fn with_behavior(mut self, behavior: ControlBehavior) -> Self {
        self.control_behavior = behavior;
        self
    }

    /// Sets the warm-up ramp.
    pub fn with_warm_up(mut self, period_sec: u32, cold_factor: u32) -> Self {
        self.warm_up_period_sec = period_sec;
        self.cold_factor = Some(cold_factor);
        self
    }

    /// Sets the longest a request may queue.
    pub fn with_max_queueing_time_ms(mut self, max_queueing_time_ms: u64) -> Self {
        self.max_queueing_time_ms = max_queueing_time_ms;
        self
    }

    /// Checks the rule for configuration errors.
    ///
    /// `default_cold_factor` is used when the rule does not carry its own.
    pub fn validate(&self, default_cold_factor: u32) -> Result<(), RuleError> {
        if self.resource.trim().is_empty() {
            return Err(RuleError::BlankResource);
        }
        if self.limit_app.trim().is_empty() {
            return Err(RuleError::BlankLimitApp);
        }
        if self.count.is_nan() || self.count < 0.0 {
            return Err(RuleError::InvalidCount(self.count));
        }
        if self.strategy != ControlStrategy::Direct
            && self
                .ref_resource
                .as_deref()
                .map_or(true, |r| r.trim().is_empty())
        {
            return Err(RuleError::MissingRefResource(self.strategy));
        }
        if self.control_behavior.is_warm_up() {
            if self.warm_up_period_sec == 0 {
                return Err(RuleError::InvalidWarmUpPeriod);
            }
            let cold_factor = self.cold_factor.unwrap_or(default_cold_factor);
            if cold_factor <= 1 {
                return Err(RuleError::InvalidColdFactor(cold_factor));
            }
        }
        Ok(())
    }

    /// Parses a JSON array of flow rules.
    pub fn list_from_json(json: &str) -> Result<Vec<FlowRule>, RuleError> {
        Ok(serde_json::from_str(json)?)
    }
}
