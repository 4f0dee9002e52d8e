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

//! The virtual queue shared by the pacing controllers.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use sluice_core::Clock;

/// A lock-free timeline on which admitted requests are serialized.
///
/// Instead of holding requests in a real queue, each caller reserves its slot
/// by advancing `latest_passed_time` by its cost and then parks until the slot
/// arrives. A reservation that lands too far in the future is rolled back by
/// subtracting exactly the cost that was added.
#[derive(Debug)]
pub(crate) struct VirtualQueue {
    latest_passed_time: AtomicI64,
    max_queueing_time_ms: i64,
}

impl VirtualQueue {
    pub(crate) fn new(max_queueing_time_ms: u64) -> Self {
        Self {
            latest_passed_time: AtomicI64::new(-1),
            max_queueing_time_ms: i64::try_from(max_queueing_time_ms).unwrap_or(i64::MAX),
        }
    }

    pub(crate) fn latest_passed_time(&self) -> i64 {
        self.latest_passed_time.load(Ordering::SeqCst)
    }

    /// Admits a request costing `cost_ms` of virtual time, parking the caller
    /// until its slot if needed.
    pub(crate) fn acquire(&self, cost_ms: i64, clock: &dyn Clock) -> bool {
        let now = clock.now_millis();
        let expected = self.latest_passed_time().saturating_add(cost_ms);

        if expected <= now {
            // Idle timeline: restart the baseline at the present. Racing callers
            // may both take this branch; the overshoot is bounded by one cost.
            self.latest_passed_time.fetch_max(now, Ordering::SeqCst);
            return true;
        }

        if expected - now > self.max_queueing_time_ms {
            return false;
        }

        let slot = self
            .latest_passed_time
            .fetch_add(cost_ms, Ordering::SeqCst)
            .saturating_add(cost_ms);
        let wait = slot - clock.now_millis();
        if wait > self.max_queueing_time_ms {
            self.latest_passed_time.fetch_sub(cost_ms, Ordering::SeqCst);
            return false;
        }

        // A racing caller may have moved the timeline so that the slot is
        // already due.
        if wait > 0 && clock.park(Duration::from_millis(wait as u64)).is_err() {
            self.latest_passed_time.fetch_sub(cost_ms, Ordering::SeqCst);
            log::debug!("Queued wait of {}ms interrupted, releasing slot", wait);
            return false;
        }
        true
    }
}

/// Virtual-time cost of admitting `acquire_count` units at `qps`, in milliseconds.
pub(crate) fn cost_millis(acquire_count: i32, qps: f64) -> i64 {
    (f64::from(acquire_count) / qps * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::testing::ManualClock;

    #[test]
    fn test_cost_rounds_to_nearest_millisecond() {
        assert_eq!(cost_millis(1, 10.0), 100);
        assert_eq!(cost_millis(3, 10.0), 300);
        assert_eq!(cost_millis(1, 3.0), 333);
        // Above 1000 qps a single unit costs nothing.
        assert_eq!(cost_millis(1, 2500.0), 0);
    }

    #[test]
    fn test_first_acquire_moves_baseline_to_now() {
        let clock = ManualClock::new(50_000);
        let queue = VirtualQueue::new(500);
        assert!(queue.acquire(100, &clock));
        assert_eq!(queue.latest_passed_time(), 50_000);
        assert!(clock.parked().is_empty());
    }

    #[test]
    fn test_interrupted_wait_releases_the_slot() {
        let clock = ManualClock::new(50_000);
        let queue = VirtualQueue::new(500);
        assert!(queue.acquire(100, &clock));

        clock.interrupt_parks(true);
        assert!(!queue.acquire(100, &clock));
        assert_eq!(queue.latest_passed_time(), 50_000);
        assert_eq!(clock.parked(), vec![Duration::from_millis(100)]);
    }
}
