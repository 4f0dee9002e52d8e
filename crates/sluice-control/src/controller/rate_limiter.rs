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

//! Constant-pace admission through a virtual queue.

use std::sync::Arc;

use sluice_core::{Clock, ControlBehavior, StatisticsNode, TrafficShapingController};

use super::queue::{cost_millis, VirtualQueue};

/// Admits requests at a fixed interval of `1000 / count` milliseconds per unit.
///
/// Requests arriving faster than the pace are parked until their slot rather
/// than rejected, as long as the slot is no more than `max_queueing_time_ms`
/// away. The controller ignores the statistics node: its own timeline is the
/// only state it needs.
#[derive(Debug)]
pub struct RateLimiterController {
    count: f64,
    queue: VirtualQueue,
    clock: Arc<dyn Clock>,
}

impl RateLimiterController {
    /// Creates a controller pacing at `count` requests per second.
    pub fn new(count: f64, max_queueing_time_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            count,
            queue: VirtualQueue::new(max_queueing_time_ms),
            clock,
        }
    }

    /// The virtual time of the most recently reserved slot, in milliseconds.
    pub fn latest_passed_time(&self) -> i64 {
        self.queue.latest_passed_time()
    }
}

impl TrafficShapingController for RateLimiterController {
    fn can_pass(
        &self,
        _node: Option<&dyn StatisticsNode>,
        acquire_count: i32,
        _prioritized: bool,
    ) -> bool {
        if acquire_count <= 0 {
            return true;
        }
        // A non-positive rate would make the cost infinite.
        if !(self.count > 0.0) {
            return false;
        }

        let cost = cost_millis(acquire_count, self.count);
        self.queue.acquire(cost, self.clock.as_ref())
    }

    fn behavior(&self) -> ControlBehavior {
        ControlBehavior::RateLimiter
    }
}
