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

//! The traffic-shaping controller family.
//!
//! Each [`ControlBehavior`] maps to exactly one controller type. The set is
//! closed, so rule loading picks a [`ShapingController`] variant once and every
//! admission check afterwards is a single match on that variant.

pub mod default;
pub mod rate_limiter;
pub mod warm_up;
pub mod warm_up_rate_limiter;

mod queue;

use std::sync::Arc;

use sluice_core::rule::{DEFAULT_COLD_FACTOR, DEFAULT_OCCUPY_TIMEOUT_MS};
use sluice_core::{
    Clock, ControlBehavior, FlowGrade, FlowRule, StatisticsNode, SystemClock,
    TrafficShapingController,
};

pub use self::default::DefaultController;
pub use self::rate_limiter::RateLimiterController;
pub use self::warm_up::WarmUpController;
pub use self::warm_up_rate_limiter::WarmUpRateLimiterController;

/// Engine-wide settings shared by every controller built from a rule set.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Time source used for pacing and for parking queued callers.
    pub clock: Arc<dyn Clock>,
    /// Cold factor for warm-up rules that do not carry their own.
    pub cold_factor: u32,
    /// Longest a prioritized request may wait to borrow from the next window.
    pub occupy_timeout_ms: u64,
}

impl ControllerSettings {
    /// Creates settings with default factors around `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            cold_factor: DEFAULT_COLD_FACTOR,
            occupy_timeout_ms: DEFAULT_OCCUPY_TIMEOUT_MS,
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock::new()))
    }
}

/// A controller built for one flow rule.
#[derive(Debug)]
pub enum ShapingController {
    /// Fast fail.
    Default(DefaultController),
    /// Warm-up ramp.
    WarmUp(WarmUpController),
    /// Virtual-queue pacing.
    RateLimiter(RateLimiterController),
    /// Virtual-queue pacing at the warm-up ramp's rate.
    WarmUpRateLimiter(WarmUpRateLimiterController),
}

impl ShapingController {
    /// Builds the controller a rule calls for.
    ///
    /// Only QPS rules can shape traffic; thread-count rules always fail fast.
    pub fn for_rule(rule: &FlowRule, settings: &ControllerSettings) -> Self {
        let clock = Arc::clone(&settings.clock);
        let cold_factor = rule.cold_factor.unwrap_or(settings.cold_factor);

        if rule.grade == FlowGrade::Qps {
            match rule.control_behavior {
                ControlBehavior::WarmUp => {
                    return ShapingController::WarmUp(WarmUpController::new(
                        rule.count,
                        rule.warm_up_period_sec,
                        cold_factor,
                        clock,
                    ));
                }
                ControlBehavior::RateLimiter => {
                    return ShapingController::RateLimiter(RateLimiterController::new(
                        rule.count,
                        rule.max_queueing_time_ms,
                        clock,
                    ));
                }
                ControlBehavior::WarmUpRateLimiter => {
                    return ShapingController::WarmUpRateLimiter(
                        WarmUpRateLimiterController::new(
                            rule.count,
                            rule.warm_up_period_sec,
                            rule.max_queueing_time_ms,
                            cold_factor,
                            clock,
                        ),
                    );
                }
                ControlBehavior::Default => {}
            }
        }

        ShapingController::Default(
            DefaultController::new(rule.count, rule.grade, clock)
                .with_occupy_timeout_ms(settings.occupy_timeout_ms),
        )
    }
}

impl TrafficShapingController for ShapingController {
    fn can_pass(
        &self,
        node: Option<&dyn StatisticsNode>,
        acquire_count: i32,
        prioritized: bool,
    ) -> bool {
        match self {
            ShapingController::Default(c) => c.can_pass(node, acquire_count, prioritized),
            ShapingController::WarmUp(c) => c.can_pass(node, acquire_count, prioritized),
            ShapingController::RateLimiter(c) => c.can_pass(node, acquire_count, prioritized),
            ShapingController::WarmUpRateLimiter(c) => {
                c.can_pass(node, acquire_count, prioritized)
            }
        }
    }

    fn behavior(&self) -> ControlBehavior {
        match self {
            ShapingController::Default(c) => c.behavior(),
            ShapingController::WarmUp(c) => c.behavior(),
            ShapingController::RateLimiter(c) => c.behavior(),
            ShapingController::WarmUpRateLimiter(c) => c.behavior(),
        }
    }
}
