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

//! Virtual-queue pacing at the rate permitted by a warm-up bucket.

use std::sync::Arc;

use sluice_core::{Clock, ControlBehavior, StatisticsNode, TrafficShapingController};

use super::queue::{cost_millis, VirtualQueue};
use super::warm_up::WarmUpBucket;

/// Paces requests like [`RateLimiterController`](super::RateLimiterController),
/// but with an interval derived from the warm-up ramp, so a cold resource is
/// fed slowly and evenly until it warms.
#[derive(Debug)]
pub struct WarmUpRateLimiterController {
    bucket: WarmUpBucket,
    queue: VirtualQueue,
    clock: Arc<dyn Clock>,
}

impl WarmUpRateLimiterController {
    /// Creates a controller ramping up to `count` QPS over
    /// `warm_up_period_sec`, queueing for at most `max_queueing_time_ms`.
    pub fn new(
        count: f64,
        warm_up_period_sec: u32,
        max_queueing_time_ms: u64,
        cold_factor: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bucket: WarmUpBucket::new(count, warm_up_period_sec, cold_factor),
            queue: VirtualQueue::new(max_queueing_time_ms),
            clock,
        }
    }

    /// The virtual time of the most recently reserved slot, in milliseconds.
    pub fn latest_passed_time(&self) -> i64 {
        self.queue.latest_passed_time()
    }

    /// Tokens currently stored in the warm-up bucket.
    pub fn stored_tokens(&self) -> i64 {
        self.bucket.stored_tokens()
    }
}

impl TrafficShapingController for WarmUpRateLimiterController {
    fn can_pass(
        &self,
        node: Option<&dyn StatisticsNode>,
        acquire_count: i32,
        _prioritized: bool,
    ) -> bool {
        if acquire_count <= 0 {
            return true;
        }
        if !(self.bucket.count() > 0.0) {
            return false;
        }

        let previous_qps = node.map_or(0, |n| n.previous_pass_qps() as i64);
        self.bucket.sync_token(self.clock.now_millis(), previous_qps);

        let cost = cost_millis(acquire_count, self.bucket.permitted_qps());
        self.queue.acquire(cost, self.clock.as_ref())
    }

    fn behavior(&self) -> ControlBehavior {
        ControlBehavior::WarmUpRateLimiter
    }
}
