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

//! Abstractions over host and process metrics.
//!
//! The system monitor samples a [`SystemMetricsProvider`] on a background task
//! and publishes the result through [`SystemStatus`], which admission checks
//! read without locking.

use crate::error::ProbeError;

/// A specialized `Result` type for metric probes.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Source of raw host and process metrics.
///
/// Implementations typically live in `sluice-infra`. The values are cumulative
/// or instantaneous readings; smoothing and deltas are the monitor's job.
pub trait SystemMetricsProvider: Send + Sync + 'static {
    /// Returns the OS load average over the last minute.
    fn system_load_average(&self) -> ProbeResult<f64>;

    /// Returns the recent CPU usage of the whole host as a fraction in `[0, 1]`,
    /// or a negative value when the platform cannot tell.
    fn system_cpu_usage(&self) -> ProbeResult<f64>;

    /// Returns the CPU time consumed by this process since it started, in nanoseconds.
    fn process_cpu_time_nanos(&self) -> ProbeResult<u64>;

    /// Returns how long this process has been running, in milliseconds.
    fn process_uptime_millis(&self) -> ProbeResult<u64>;

    /// Returns the number of cores available to this process.
    fn available_processors(&self) -> ProbeResult<usize>;

    /// Refreshes any cached platform state before a sampling round.
    ///
    /// This default implementation does nothing, for providers that read live values.
    fn refresh(&self) {
        // Default: no-op
    }
}

/// A consistent view of the host load, as last sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemSnapshot {
    /// One-minute load average; negative when unknown.
    pub load: f64,
    /// CPU usage fraction; negative when unknown.
    pub cpu_usage: f64,
}

impl SystemSnapshot {
    /// A snapshot where nothing has been sampled yet.
    pub const UNKNOWN: SystemSnapshot = SystemSnapshot {
        load: -1.0,
        cpu_usage: -1.0,
    };

    /// Returns the load average if it has been sampled.
    pub fn known_load(&self) -> Option<f64> {
        (self.load >= 0.0).then_some(self.load)
    }

    /// Returns the CPU usage if it has been sampled.
    pub fn known_cpu_usage(&self) -> Option<f64> {
        (self.cpu_usage >= 0.0).then_some(self.cpu_usage)
    }
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Read side of the system monitor, consulted by system-level admission checks.
pub trait SystemStatus: Send + Sync {
    /// Returns the latest published snapshot.
    fn snapshot(&self) -> SystemSnapshot;
}
