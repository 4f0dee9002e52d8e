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

//! Token-bucket warm-up: a cold resource ramps from `count / cold_factor` up
//! to `count` over the warm-up period.
//!
//! The bucket holds "stored tokens" that accumulate while traffic is light and
//! drain as traffic flows. Above `warning_token` the permitted rate falls
//! linearly with the surplus:
//!
//! ```text
//! permitted_qps = 1 / ((stored - warning_token) * slope + 1 / count)
//! ```
//!
//! so a full bucket (`max_token`) yields `count / cold_factor` and the warning
//! line yields `count`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use sluice_core::rule::DEFAULT_COLD_FACTOR;
use sluice_core::{Clock, ControlBehavior, StatisticsNode, TrafficShapingController};

/// Bucket state shared by the warm-up controllers.
#[derive(Debug)]
pub(crate) struct WarmUpBucket {
    count: f64,
    cold_factor: u32,
    warning_token: i64,
    max_token: i64,
    slope: f64,
    stored_tokens: AtomicI64,
    last_filled_time: AtomicI64,
}

impl WarmUpBucket {
    pub(crate) fn new(count: f64, warm_up_period_sec: u32, cold_factor: u32) -> Self {
        let cold_factor = if cold_factor <= 1 {
            log::warn!(
                "Cold factor {} cannot ramp, using {}",
                cold_factor,
                DEFAULT_COLD_FACTOR
            );
            DEFAULT_COLD_FACTOR
        } else {
            cold_factor
        };
        let cold = f64::from(cold_factor);
        let period = f64::from(warm_up_period_sec);

        let (warning_token, max_token, slope) = if count > 0.0 {
            let warning = (period * count) as i64 / i64::from(cold_factor - 1);
            let max = warning + (2.0 * period * count / (1.0 + cold)) as i64;
            let slope = if max > warning {
                (cold - 1.0) / count / (max - warning) as f64
            } else {
                0.0
            };
            (warning, max, slope)
        } else {
            (0, 0, 0.0)
        };

        Self {
            count,
            cold_factor,
            warning_token,
            max_token,
            slope,
            stored_tokens: AtomicI64::new(0),
            last_filled_time: AtomicI64::new(0),
        }
    }

    pub(crate) fn count(&self) -> f64 {
        self.count
    }

    pub(crate) fn warning_token(&self) -> i64 {
        self.warning_token
    }

    pub(crate) fn max_token(&self) -> i64 {
        self.max_token
    }

    pub(crate) fn slope(&self) -> f64 {
        self.slope
    }

    pub(crate) fn stored_tokens(&self) -> i64 {
        self.stored_tokens.load(Ordering::SeqCst)
    }

    /// Refills and drains the bucket once per second boundary.
    ///
    /// Only the caller that wins the compare-exchange applies the update; the
    /// others see the second as already synced.
    pub(crate) fn sync_token(&self, now_ms: i64, previous_qps: i64) {
        let current_time = now_ms - now_ms.rem_euclid(1000);
        let last_filled = self.last_filled_time.load(Ordering::SeqCst);
        if current_time <= last_filled {
            return;
        }

        let old_value = self.stored_tokens.load(Ordering::SeqCst);
        let new_value =
            self.cool_down_tokens(current_time, last_filled, old_value, previous_qps);
        if self
            .stored_tokens
            .compare_exchange(old_value, new_value, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let remaining =
                self.stored_tokens.fetch_sub(previous_qps, Ordering::SeqCst) - previous_qps;
            if remaining < 0 {
                self.stored_tokens.store(0, Ordering::SeqCst);
            }
            self.last_filled_time.store(current_time, Ordering::SeqCst);
        }
    }

    fn cool_down_tokens(
        &self,
        current_time: i64,
        last_filled: i64,
        old_value: i64,
        previous_qps: i64,
    ) -> i64 {
        let refill = || {
            let elapsed = (current_time - last_filled) as f64;
            old_value.saturating_add((elapsed * self.count / 1000.0) as i64)
        };

        let new_value = if old_value < self.warning_token {
            refill()
        } else if old_value > self.warning_token
            && previous_qps < (self.count as i64) / i64::from(self.cold_factor)
        {
            // Traffic is below the cold rate: keep cooling down.
            refill()
        } else {
            old_value
        };
        new_value.min(self.max_token)
    }

    /// The rate permitted at the current fill level.
    pub(crate) fn permitted_qps(&self) -> f64 {
        let rest = self.stored_tokens();
        if rest >= self.warning_token {
            let above = (rest - self.warning_token) as f64;
            next_up(1.0 / (above * self.slope + 1.0 / self.count))
        } else {
            self.count
        }
    }
}

/// Smallest `f64` greater than `x`, for positive finite `x`.
///
/// Keeps the permitted rate from landing a rounding step below the rule's
/// count at the warning line.
fn next_up(x: f64) -> f64 {
    if x.is_finite() && x >= 0.0 {
        f64::from_bits(x.to_bits() + 1)
    } else {
        x
    }
}

/// Fast-fail admission against a rate that ramps up as the resource warms.
#[derive(Debug)]
pub struct WarmUpController {
    bucket: WarmUpBucket,
    clock: Arc<dyn Clock>,
}

impl WarmUpController {
    /// Creates a controller that reaches `count` QPS after `warm_up_period_sec`
    /// of sustained traffic, starting from `count / cold_factor`.
    pub fn new(
        count: f64,
        warm_up_period_sec: u32,
        cold_factor: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bucket: WarmUpBucket::new(count, warm_up_period_sec, cold_factor),
            clock,
        }
    }

    /// Token level below which the full rate is permitted.
    pub fn warning_token(&self) -> i64 {
        self.bucket.warning_token()
    }

    /// Capacity of the bucket.
    pub fn max_token(&self) -> i64 {
        self.bucket.max_token()
    }

    /// Slope of the permitted interval above the warning line.
    pub fn slope(&self) -> f64 {
        self.bucket.slope()
    }

    /// Tokens currently stored.
    pub fn stored_tokens(&self) -> i64 {
        self.bucket.stored_tokens()
    }
}

impl TrafficShapingController for WarmUpController {
    fn can_pass(
        &self,
        node: Option<&dyn StatisticsNode>,
        acquire_count: i32,
        _prioritized: bool,
    ) -> bool {
        if acquire_count <= 0 {
            return true;
        }
        if !(self.bucket.count > 0.0) {
            return false;
        }

        let (pass_qps, previous_qps) = node
            .map(|n| (n.pass_qps(), n.previous_pass_qps() as i64))
            .unwrap_or((0.0, 0));
        self.bucket.sync_token(self.clock.now_millis(), previous_qps);

        pass_qps + f64::from(acquire_count) <= self.bucket.permitted_qps()
    }

    fn behavior(&self) -> ControlBehavior {
        ControlBehavior::WarmUp
    }
}
