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

//! Error types for the admission engine.

use std::fmt;

use thiserror::Error;

use crate::rule::{ControlBehavior, ControlStrategy};

/// A rule failed validation or could not be parsed.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule names no resource.
    #[error("rule resource must not be blank")]
    BlankResource,
    /// The rule names no limit app.
    #[error("rule limit app must not be blank")]
    BlankLimitApp,
    /// The threshold is negative or not a number.
    #[error("invalid threshold: {0}")]
    InvalidCount(f64),
    /// A relate or chain rule is missing the resource it refers to.
    #[error("strategy {0:?} requires a reference resource")]
    MissingRefResource(ControlStrategy),
    /// A warm-up behavior was configured with a zero warm-up period.
    #[error("warm-up period must be positive")]
    InvalidWarmUpPeriod,
    /// A warm-up behavior was configured with a cold factor of 1 or less.
    #[error("cold factor must be greater than 1, got {0}")]
    InvalidColdFactor(u32),
    /// A CPU usage threshold outside `[0, 1]`.
    #[error("highest cpu usage must be within [0, 1], got {0}")]
    InvalidCpuUsage(f64),
    /// The rule document is not valid JSON for the rule type.
    #[error("failed to parse rules: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A metrics probe could not produce a reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The platform does not expose the metric.
    #[error("metric '{0}' is not available on this platform")]
    Unavailable(&'static str),
    /// Reading process statistics failed.
    #[error("failed to read process statistics: {0}")]
    Process(String),
}

/// A queued wait was cancelled before it elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queued wait was interrupted")]
pub struct WaitInterrupted;

/// The system metric that caused a system-level block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitType {
    /// Entry-point request rate.
    Qps,
    /// Concurrent threads at the entry point.
    Thread,
    /// Average response time at the entry point.
    Rt,
    /// Host load average.
    Load,
    /// CPU usage.
    Cpu,
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LimitType::Qps => "qps",
            LimitType::Thread => "thread",
            LimitType::Rt => "rt",
            LimitType::Load => "load",
            LimitType::Cpu => "cpu",
        };
        f.write_str(name)
    }
}

/// The typed block signal raised when an entry is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    /// A resource-scoped flow rule refused the entry.
    #[error("flow control blocked '{resource}' (limit app: {limit_app}, behavior: {behavior:?})")]
    Flow {
        /// The resource that was refused.
        resource: String,
        /// The `limit_app` of the rule that refused it.
        limit_app: String,
        /// The behavior of the rule that refused it.
        behavior: ControlBehavior,
    },
    /// System protection refused an inbound entry.
    #[error("system protection blocked '{resource}' ({limit_type})")]
    System {
        /// The resource that was refused.
        resource: String,
        /// The metric that tripped.
        limit_type: LimitType,
    },
}

impl BlockError {
    /// Returns the resource that was refused.
    pub fn resource(&self) -> &str {
        match self {
            BlockError::Flow { resource, .. } | BlockError::System { resource, .. } => resource,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_error_messages() {
        let err = BlockError::System {
            resource: "GET /orders".into(),
            limit_type: LimitType::Load,
        };
        assert_eq!(
            err.to_string(),
            "system protection blocked 'GET /orders' (load)"
        );
        assert_eq!(err.resource(), "GET /orders");
    }

    #[test]
    fn test_rule_error_wraps_json_errors() {
        let parse = serde_json::from_str::<Vec<u32>>("not json").unwrap_err();
        let err = RuleError::from(parse);
        assert!(err.to_string().starts_with("failed to parse rules"));
    }
}
