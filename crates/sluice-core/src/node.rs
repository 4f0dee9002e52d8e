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

//! Read-only view of the sliding-window statistics kept for a resource.
//!
//! The engine never stores statistics itself: whoever records passes, blocks
//! and response times exposes them through [`StatisticsNode`], and the
//! controllers read them to make a decision.

use std::sync::Arc;

/// Pre-aggregated statistics for one resource (or one slice of it).
///
/// Every method must be a cheap, non-blocking read.
pub trait StatisticsNode: Send + Sync {
    /// Requests admitted per second in the current window.
    fn pass_qps(&self) -> f64;

    /// Requests admitted per second in the previous whole window.
    fn previous_pass_qps(&self) -> f64;

    /// Requests completed successfully per second.
    fn success_qps(&self) -> f64;

    /// Average response time in milliseconds.
    fn avg_rt(&self) -> f64;

    /// Minimum response time observed in the window, in milliseconds.
    fn min_rt(&self) -> f64;

    /// Highest success rate observed across the window's buckets.
    fn max_success_qps(&self) -> f64;

    /// Number of threads currently executing inside the resource.
    fn cur_thread_num(&self) -> u32;

    /// Asks how long a prioritized request must wait to borrow `acquire_count`
    /// tokens from a future window without exceeding `threshold`.
    ///
    /// Returns the wait in milliseconds. Nodes that cannot borrow return
    /// `u64::MAX`, which never fits inside an occupy timeout.
    fn try_occupy_next(&self, _now_ms: i64, _acquire_count: i32, _threshold: f64) -> u64 {
        u64::MAX
    }

    /// Records that `acquire_count` tokens were borrowed from the window that
    /// starts at `future_time_ms`.
    fn add_waiting_request(&self, _future_time_ms: i64, _acquire_count: i32) {}

    /// Releases a borrow registered with
    /// [`add_waiting_request`](Self::add_waiting_request) whose wait was cancelled.
    fn remove_waiting_request(&self, _future_time_ms: i64, _acquire_count: i32) {}

    /// Records that `acquire_count` borrowed tokens were admitted.
    fn add_occupied_pass(&self, _acquire_count: i32) {}
}

/// Looks up the resource-wide statistics of resources other than the one being
/// admitted (used by rules that watch a related resource).
pub trait NodeResolver: Send + Sync {
    /// Returns the statistics node of `resource`, if it has been seen.
    fn cluster_node(&self, resource: &str) -> Option<Arc<dyn StatisticsNode>>;
}

impl<F> NodeResolver for F
where
    F: Fn(&str) -> Option<Arc<dyn StatisticsNode>> + Send + Sync,
{
    fn cluster_node(&self, resource: &str) -> Option<Arc<dyn StatisticsNode>> {
        self(resource)
    }
}
