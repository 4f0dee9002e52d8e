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

//! Deterministic stand-ins for time and statistics.
//!
//! Only built with the `testing` feature. Hosts can enable it to drive the
//! engine in simulations without real sleeps.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::clock::Clock;
use crate::error::WaitInterrupted;
use crate::node::StatisticsNode;
use crate::utils::atomic::AtomicF64;

/// A clock that only moves when told to.
///
/// Every `park` is recorded. By default parking does not move time, so a burst
/// of callers all observe the same instant; [`ManualClock::advancing`] builds a
/// clock where parking advances time by the parked duration.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
    advance_on_park: bool,
    interrupt: AtomicBool,
    parks: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
            advance_on_park: false,
            interrupt: AtomicBool::new(false),
            parks: Mutex::new(Vec::new()),
        }
    }

    /// Creates a clock at `start_ms` whose parks advance time.
    pub fn advancing(start_ms: i64) -> Self {
        Self {
            advance_on_park: true,
            ..Self::new(start_ms)
        }
    }

    /// Moves time forward by `ms`.
    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Sets the current time.
    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Makes every subsequent park fail as if it had been cancelled.
    pub fn interrupt_parks(&self, interrupt: bool) {
        self.interrupt.store(interrupt, Ordering::SeqCst);
    }

    /// Returns every duration callers have parked for, in order.
    pub fn parked(&self) -> Vec<Duration> {
        self.parks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn park(&self, duration: Duration) -> Result<(), WaitInterrupted> {
        self.parks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        if self.interrupt.load(Ordering::SeqCst) {
            return Err(WaitInterrupted);
        }
        if self.advance_on_park {
            self.advance(duration.as_millis() as i64);
        }
        Ok(())
    }
}

/// A statistics node whose readings are set directly.
///
/// Borrowing from the next window is refused unless a wait is configured with
/// [`FixedNode::set_occupy_wait`].
#[derive(Debug)]
pub struct FixedNode {
    pass_qps: AtomicF64,
    previous_pass_qps: AtomicF64,
    success_qps: AtomicF64,
    avg_rt: AtomicF64,
    min_rt: AtomicF64,
    max_success_qps: AtomicF64,
    threads: AtomicU32,
    occupy_wait_ms: AtomicU64,
    occupied_passes: AtomicI64,
    waiting: Mutex<Vec<(i64, i32)>>,
}

impl FixedNode {
    /// Creates a node where every reading is zero.
    pub fn new() -> Self {
        Self {
            pass_qps: AtomicF64::default(),
            previous_pass_qps: AtomicF64::default(),
            success_qps: AtomicF64::default(),
            avg_rt: AtomicF64::default(),
            min_rt: AtomicF64::default(),
            max_success_qps: AtomicF64::default(),
            threads: AtomicU32::new(0),
            occupy_wait_ms: AtomicU64::new(u64::MAX),
            occupied_passes: AtomicI64::new(0),
            waiting: Mutex::new(Vec::new()),
        }
    }

    /// Sets the current pass rate.
    pub fn set_pass_qps(&self, value: f64) {
        self.pass_qps.store(value, Ordering::SeqCst);
    }

    /// Sets the pass rate of the previous window.
    pub fn set_previous_pass_qps(&self, value: f64) {
        self.previous_pass_qps.store(value, Ordering::SeqCst);
    }

    /// Sets the success rate.
    pub fn set_success_qps(&self, value: f64) {
        self.success_qps.store(value, Ordering::SeqCst);
    }

    /// Sets the average response time.
    pub fn set_avg_rt(&self, value: f64) {
        self.avg_rt.store(value, Ordering::SeqCst);
    }

    /// Sets the minimum response time.
    pub fn set_min_rt(&self, value: f64) {
        self.min_rt.store(value, Ordering::SeqCst);
    }

    /// Sets the highest observed success rate.
    pub fn set_max_success_qps(&self, value: f64) {
        self.max_success_qps.store(value, Ordering::SeqCst);
    }

    /// Sets the number of threads inside the resource.
    pub fn set_threads(&self, value: u32) {
        self.threads.store(value, Ordering::SeqCst);
    }

    /// Sets the wait offered to prioritized requests borrowing from the next window.
    pub fn set_occupy_wait(&self, wait_ms: u64) {
        self.occupy_wait_ms.store(wait_ms, Ordering::SeqCst);
    }

    /// Returns how many borrowed tokens were admitted.
    pub fn occupied_passes(&self) -> i64 {
        self.occupied_passes.load(Ordering::SeqCst)
    }

    /// Returns every outstanding `(future_time_ms, acquire_count)` borrow.
    pub fn waiting_requests(&self) -> Vec<(i64, i32)> {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for FixedNode {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsNode for FixedNode {
    fn pass_qps(&self) -> f64 {
        self.pass_qps.load(Ordering::SeqCst)
    }

    fn previous_pass_qps(&self) -> f64 {
        self.previous_pass_qps.load(Ordering::SeqCst)
    }

    fn success_qps(&self) -> f64 {
        self.success_qps.load(Ordering::SeqCst)
    }

    fn avg_rt(&self) -> f64 {
        self.avg_rt.load(Ordering::SeqCst)
    }

    fn min_rt(&self) -> f64 {
        self.min_rt.load(Ordering::SeqCst)
    }

    fn max_success_qps(&self) -> f64 {
        self.max_success_qps.load(Ordering::SeqCst)
    }

    fn cur_thread_num(&self) -> u32 {
        self.threads.load(Ordering::SeqCst)
    }

    fn try_occupy_next(&self, _now_ms: i64, _acquire_count: i32, _threshold: f64) -> u64 {
        self.occupy_wait_ms.load(Ordering::SeqCst)
    }

    fn add_waiting_request(&self, future_time_ms: i64, acquire_count: i32) {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((future_time_ms, acquire_count));
    }

    fn remove_waiting_request(&self, future_time_ms: i64, acquire_count: i32) {
        let mut waiting = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = waiting
            .iter()
            .position(|&entry| entry == (future_time_ms, acquire_count))
        {
            waiting.remove(index);
        }
    }

    fn add_occupied_pass(&self, acquire_count: i32) {
        self.occupied_passes
            .fetch_add(i64::from(acquire_count), Ordering::SeqCst);
    }
}
