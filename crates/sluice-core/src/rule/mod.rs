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

//! The admission rule model.
//!
//! Rules are plain data: they are parsed or constructed by whoever manages
//! configuration, validated, and then published to the decision layer as a
//! whole set. A published rule is never mutated in place.

pub mod entity;
pub mod flow;
pub mod system;

use serde::{Deserialize, Serialize};

pub use self::entity::SystemRuleEntity;
pub use self::flow::FlowRule;
pub use self::system::SystemRule;

/// Rule applies to callers of any origin.
pub const LIMIT_APP_DEFAULT: &str = "default";
/// Rule applies to origins not named by any other rule of the same resource.
pub const LIMIT_APP_OTHER: &str = "other";

/// Default warm-up period, in seconds.
pub const DEFAULT_WARM_UP_PERIOD_SEC: u32 = 10;
/// Default maximum time a request may queue in a rate limiter, in milliseconds.
pub const DEFAULT_MAX_QUEUEING_TIME_MS: u64 = 500;
/// Default ratio between the full rate and the cold rate of a warm-up curve.
pub const DEFAULT_COLD_FACTOR: u32 = 3;
/// Default limit on how long a prioritized request may wait to borrow from the
/// next window, in milliseconds.
pub const DEFAULT_OCCUPY_TIMEOUT_MS: u64 = 500;

/// Default number of buckets in a statistics window.
pub const DEFAULT_SAMPLE_COUNT: u32 = 2;
/// Default length of a statistics window, in milliseconds.
pub const DEFAULT_WINDOW_INTERVAL_MS: u32 = 1000;

/// Generates the integer wire representation shared by every rule enum.
macro_rules! wire_enum {
    ($name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                match value {
                    $($name::$variant => $value),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!("invalid {} value: {}", stringify!($name), other)),
                }
            }
        }
    };
}

/// Which statistic a flow rule's threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FlowGrade {
    /// Concurrent thread count.
    Thread,
    /// Requests per second.
    #[default]
    Qps,
}

wire_enum!(FlowGrade { Thread = 0, Qps = 1 });

/// Which resource's statistics a flow rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ControlStrategy {
    /// The resource itself.
    #[default]
    Direct,
    /// A related resource named by the rule.
    Relate,
    /// The resource, but only when entered through the named entrance.
    Chain,
}

wire_enum!(ControlStrategy { Direct = 0, Relate = 1, Chain = 2 });

/// What happens to traffic above a flow rule's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ControlBehavior {
    /// Reject immediately (fast fail).
    #[default]
    Default,
    /// Ramp the allowed rate up to the threshold after an idle period.
    WarmUp,
    /// Queue requests and admit them at a fixed pace.
    RateLimiter,
    /// Queue requests and admit them at the warm-up curve's current pace.
    WarmUpRateLimiter,
}

wire_enum!(ControlBehavior {
    Default = 0,
    WarmUp = 1,
    RateLimiter = 2,
    WarmUpRateLimiter = 3,
});

impl ControlBehavior {
    /// Returns true for the behaviors driven by a warm-up curve.
    pub fn is_warm_up(self) -> bool {
        matches!(
            self,
            ControlBehavior::WarmUp | ControlBehavior::WarmUpRateLimiter
        )
    }
}
