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

//! sysinfo-based implementation of the SystemMetricsProvider trait.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use sluice_core::platform::ProbeResult;
use sluice_core::{ProbeError, SystemMetricsProvider};
use sysinfo::{CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

/// A metrics provider that reads the host and the current process through
/// the `sysinfo` crate.
///
/// Host CPU usage is computed by sysinfo from the difference between two
/// refreshes, so the first sample after creation reads close to zero.
pub struct SysinfoMetricsProvider {
    system: Mutex<System>,
    pid: Pid,
    started: Instant,
    uptime_at_start_ms: u64,
}

impl SysinfoMetricsProvider {
    /// Creates a provider for the current process.
    pub fn new() -> ProbeResult<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|err| ProbeError::Process(format!("cannot resolve current pid: {err}")))?;

        let mut system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
        );
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        let uptime_at_start_ms = system
            .process(pid)
            .map(|p| p.run_time().saturating_mul(1_000))
            .unwrap_or(0);

        log::debug!("SysinfoMetricsProvider: watching process {}", pid);
        Ok(Self {
            system: Mutex::new(system),
            pid,
            started: Instant::now(),
            uptime_at_start_ms,
        })
    }
}

impl SystemMetricsProvider for SysinfoMetricsProvider {
    fn system_load_average(&self) -> ProbeResult<f64> {
        if cfg!(windows) {
            return Err(ProbeError::Unavailable("load average"));
        }
        Ok(System::load_average().one)
    }

    fn system_cpu_usage(&self) -> ProbeResult<f64> {
        let system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        if system.cpus().is_empty() {
            return Ok(-1.0);
        }
        Ok(f64::from(system.global_cpu_usage()) / 100.0)
    }

    fn process_cpu_time_nanos(&self) -> ProbeResult<u64> {
        let system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        let process = system
            .process(self.pid)
            .ok_or_else(|| ProbeError::Process(format!("process {} not found", self.pid)))?;
        Ok(process.accumulated_cpu_time().saturating_mul(1_000_000))
    }

    fn process_uptime_millis(&self) -> ProbeResult<u64> {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(self.uptime_at_start_ms.saturating_add(elapsed))
    }

    fn available_processors(&self) -> ProbeResult<usize> {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .map_err(|err| ProbeError::Process(format!("cannot read core count: {err}")))
    }

    fn refresh(&self) {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu_specifics(CpuRefreshKind::nothing().with_cpu_usage());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
    }
}

impl std::fmt::Debug for SysinfoMetricsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoMetricsProvider")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}
