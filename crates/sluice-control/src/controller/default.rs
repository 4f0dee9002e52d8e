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

//! Fast-fail admission against the observed rate or concurrency.

use std::sync::Arc;
use std::time::Duration;

use sluice_core::rule::DEFAULT_OCCUPY_TIMEOUT_MS;
use sluice_core::{Clock, ControlBehavior, FlowGrade, StatisticsNode, TrafficShapingController};

/// Rejects immediately once the current reading would exceed `count`.
///
/// Prioritized QPS requests get one more chance: if the node reports that the
/// next window has room within `occupy_timeout_ms`, the request borrows that
/// capacity and parks until the window opens.
#[derive(Debug)]
pub struct DefaultController {
    count: f64,
    grade: FlowGrade,
    occupy_timeout_ms: u64,
    clock: Arc<dyn Clock>,
}

impl DefaultController {
    /// Creates a controller limiting `grade` readings to `count`.
    pub fn new(count: f64, grade: FlowGrade, clock: Arc<dyn Clock>) -> Self {
        Self {
            count,
            grade,
            occupy_timeout_ms: DEFAULT_OCCUPY_TIMEOUT_MS,
            clock,
        }
    }

    /// Sets how long a prioritized request may wait for the next window.
    pub fn with_occupy_timeout_ms(mut self, occupy_timeout_ms: u64) -> Self {
        self.occupy_timeout_ms = occupy_timeout_ms;
        self
    }

    fn current_reading(&self, node: Option<&dyn StatisticsNode>) -> f64 {
        match (node, self.grade) {
            (Some(node), FlowGrade::Thread) => f64::from(node.cur_thread_num()),
            (Some(node), FlowGrade::Qps) => node.pass_qps(),
            (None, _) => 0.0,
        }
    }

    fn try_borrow_next_window(&self, node: &dyn StatisticsNode, acquire_count: i32) -> bool {
        let now = self.clock.now_millis();
        let wait_ms = node.try_occupy_next(now, acquire_count, self.count);
        if wait_ms >= self.occupy_timeout_ms {
            return false;
        }

        let future_time_ms = now.saturating_add(wait_ms as i64);
        node.add_waiting_request(future_time_ms, acquire_count);
        log::trace!("Prioritized request borrowed next window, waiting {}ms", wait_ms);
        match self.clock.park(Duration::from_millis(wait_ms)) {
            Ok(()) => {
                node.add_occupied_pass(acquire_count);
                true
            }
            Err(_) => {
                node.remove_waiting_request(future_time_ms, acquire_count);
                log::debug!("Borrowed wait cancelled, releasing {} token(s)", acquire_count);
                false
            }
        }
    }
}

impl TrafficShapingController for DefaultController {
    fn can_pass(
        &self,
        node: Option<&dyn StatisticsNode>,
        acquire_count: i32,
        prioritized: bool,
    ) -> bool {
        if acquire_count <= 0 {
            return true;
        }
        if !(self.count > 0.0) {
            return false;
        }

        let current = self.current_reading(node);
        if current + f64::from(acquire_count - 1) < self.count {
            return true;
        }

        match node {
            Some(node) if prioritized && self.grade == FlowGrade::Qps => {
                self.try_borrow_next_window(node, acquire_count)
            }
            _ => false,
        }
    }

    fn behavior(&self) -> ControlBehavior {
        ControlBehavior::Default
    }
}
