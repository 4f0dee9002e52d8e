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

//! The adaptive system monitor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sluice_core::{
    AtomicF64, ProbeError, StatisticsNode, SystemMetricsProvider, SystemSnapshot, SystemStatus,
};

/// Holds the latest host load and CPU usage, refreshed by [`sample`].
///
/// There is a single writer (the sampling thread) and any number of readers.
/// Every field is its own atomic cell, so readers never block; a reader racing
/// a tick may pair a new load with the previous CPU usage, which is harmless
/// for threshold checks.
///
/// [`sample`]: AdaptiveSystemMonitor::sample
pub struct AdaptiveSystemMonitor {
    provider: Arc<dyn SystemMetricsProvider>,
    root: Option<Arc<dyn StatisticsNode>>,
    load_threshold: Arc<AtomicF64>,
    current_load: AtomicF64,
    current_cpu_usage: AtomicF64,
    process_cpu_time_nanos: AtomicU64,
    process_uptime_millis: AtomicU64,
}

impl AdaptiveSystemMonitor {
    /// Creates a monitor over `provider`.
    ///
    /// `load_threshold` is the shared handle the system rule manager publishes
    /// its load limit through; samples above it are logged with diagnostics.
    pub fn new(provider: Arc<dyn SystemMetricsProvider>, load_threshold: Arc<AtomicF64>) -> Self {
        Self {
            provider,
            root: None,
            load_threshold,
            current_load: AtomicF64::new(-1.0),
            current_cpu_usage: AtomicF64::new(-1.0),
            process_cpu_time_nanos: AtomicU64::new(0),
            process_uptime_millis: AtomicU64::new(0),
        }
    }

    /// Attaches the inbound-traffic statistics quoted in high-load diagnostics.
    pub fn with_root_node(mut self, root: Arc<dyn StatisticsNode>) -> Self {
        self.root = Some(root);
        self
    }

    /// Takes one sample and publishes it.
    ///
    /// All readings are taken before anything is stored, so a failing probe
    /// leaves the previous snapshot and cumulative counters untouched.
    pub fn sample(&self) -> Result<SystemSnapshot, ProbeError> {
        let readings = self.read_provider().inspect_err(|err| {
            log::warn!("Failed to sample system status, keeping last snapshot: {}", err);
        })?;

        let prev_cpu_nanos = self.process_cpu_time_nanos.load(Ordering::Acquire);
        let prev_uptime_millis = self.process_uptime_millis.load(Ordering::Acquire);
        let cpu_delta_ms =
            readings.cpu_time_nanos.saturating_sub(prev_cpu_nanos) as f64 / 1_000_000.0;
        let uptime_delta_ms = readings.uptime_millis.saturating_sub(prev_uptime_millis) as f64;

        let process_cpu = process_cpu_usage(cpu_delta_ms, uptime_delta_ms, readings.cores);
        let cpu_usage = process_cpu.max(readings.system_cpu);

        self.current_load.store(readings.load, Ordering::Release);
        self.current_cpu_usage.store(cpu_usage, Ordering::Release);
        self.process_cpu_time_nanos
            .store(readings.cpu_time_nanos, Ordering::Release);
        self.process_uptime_millis
            .store(readings.uptime_millis, Ordering::Release);

        let snapshot = SystemSnapshot {
            load: readings.load,
            cpu_usage,
        };
        log::trace!(
            "System sample: load={:.2}, cpu={:.3} (process={:.3}, system={:.3})",
            snapshot.load,
            snapshot.cpu_usage,
            process_cpu,
            readings.system_cpu
        );

        if snapshot.load > self.load_threshold.load(Ordering::Relaxed) {
            self.log_high_load(&snapshot);
        }
        Ok(snapshot)
    }

    /// The cumulative process readings taken at the last successful sample.
    pub fn last_process_readings(&self) -> (u64, u64) {
        (
            self.process_cpu_time_nanos.load(Ordering::Acquire),
            self.process_uptime_millis.load(Ordering::Acquire),
        )
    }

    fn read_provider(&self) -> Result<Readings, ProbeError> {
        self.provider.refresh();
        Ok(Readings {
            load: self.provider.system_load_average()?,
            system_cpu: self.provider.system_cpu_usage()?,
            cpu_time_nanos: self.provider.process_cpu_time_nanos()?,
            uptime_millis: self.provider.process_uptime_millis()?,
            cores: self.provider.available_processors()?,
        })
    }

    fn log_high_load(&self, snapshot: &SystemSnapshot) {
        match &self.root {
            Some(root) => log::info!(
                "[SystemStatus] load exceeds threshold: load:{:.2}; cpuUsage:{:.3}; qps:{:.1}; rt:{:.1}; thread:{}; success:{:.1}; minRt:{:.1}; maxSuccess:{:.1};",
                snapshot.load,
                snapshot.cpu_usage,
                root.pass_qps(),
                root.avg_rt(),
                root.cur_thread_num(),
                root.success_qps(),
                root.min_rt(),
                root.max_success_qps()
            ),
            None => log::info!(
                "[SystemStatus] load exceeds threshold: load:{:.2}; cpuUsage:{:.3};",
                snapshot.load,
                snapshot.cpu_usage
            ),
        }
    }
}

impl SystemStatus for AdaptiveSystemMonitor {
    fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            load: self.current_load.load(Ordering::Acquire),
            cpu_usage: self.current_cpu_usage.load(Ordering::Acquire),
        }
    }
}

impl fmt::Debug for AdaptiveSystemMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveSystemMonitor")
            .field("snapshot", &self.snapshot())
            .field("load_threshold", &self.load_threshold.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

struct Readings {
    load: f64,
    system_cpu: f64,
    cpu_time_nanos: u64,
    uptime_millis: u64,
    cores: usize,
}

/// CPU usage of this process over a sampling interval, as a fraction of every
/// available core.
///
/// Returns `-1.0` (unknown) when no time elapsed or no core count is known.
pub fn process_cpu_usage(cpu_delta_ms: f64, uptime_delta_ms: f64, cores: usize) -> f64 {
    if uptime_delta_ms <= 0.0 || cores == 0 {
        return -1.0;
    }
    cpu_delta_ms / uptime_delta_ms / cores as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sluice_core::platform::ProbeResult;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    struct Tick {
        load: f64,
        system_cpu: f64,
        cpu_ms: u64,
        uptime_ms: u64,
        cores: usize,
    }

    /// Replays one scripted tick per refresh; `None` makes every probe fail.
    struct ScriptedProvider {
        ticks: Mutex<VecDeque<Option<Tick>>>,
        current: Mutex<Option<Tick>>,
    }

    impl ScriptedProvider {
        fn new(ticks: Vec<Option<Tick>>) -> Self {
            Self {
                ticks: Mutex::new(ticks.into()),
                current: Mutex::new(None),
            }
        }

        fn read<T>(&self, f: impl FnOnce(&Tick) -> T) -> ProbeResult<T> {
            self.current
                .lock()
                .unwrap()
                .as_ref()
                .map(f)
                .ok_or(ProbeError::Unavailable("scripted"))
        }
    }

    impl SystemMetricsProvider for ScriptedProvider {
        fn system_load_average(&self) -> ProbeResult<f64> {
            self.read(|t| t.load)
        }

        fn system_cpu_usage(&self) -> ProbeResult<f64> {
            self.read(|t| t.system_cpu)
        }

        fn process_cpu_time_nanos(&self) -> ProbeResult<u64> {
            self.read(|t| t.cpu_ms * 1_000_000)
        }

        fn process_uptime_millis(&self) -> ProbeResult<u64> {
            self.read(|t| t.uptime_ms)
        }

        fn available_processors(&self) -> ProbeResult<usize> {
            self.read(|t| t.cores)
        }

        fn refresh(&self) {
            let next = self.ticks.lock().unwrap().pop_front().flatten();
            *self.current.lock().unwrap() = next;
        }
    }

    fn monitor(ticks: Vec<Option<Tick>>) -> AdaptiveSystemMonitor {
        AdaptiveSystemMonitor::new(
            Arc::new(ScriptedProvider::new(ticks)),
            Arc::new(AtomicF64::new(f64::MAX)),
        )
    }

    fn tick(load: f64, system_cpu: f64, cpu_ms: u64, uptime_ms: u64) -> Option<Tick> {
        Some(Tick {
            load,
            system_cpu,
            cpu_ms,
            uptime_ms,
            cores: 4,
        })
    }

    #[test]
    fn test_snapshot_starts_unknown() {
        let monitor = monitor(vec![]);
        assert_eq!(monitor.snapshot(), SystemSnapshot::UNKNOWN);
    }

    #[test]
    fn test_process_cpu_is_delta_over_uptime_and_cores() {
        let monitor = monitor(vec![
            tick(1.0, 0.1, 10_000, 60_000),
            tick(1.5, 0.3, 12_000, 61_000),
        ]);
        monitor.sample().unwrap();

        // 2000ms of CPU over 1000ms on 4 cores.
        let snapshot = monitor.sample().unwrap();
        assert_relative_eq!(snapshot.cpu_usage, 0.5);
        assert_relative_eq!(snapshot.load, 1.5);
        assert_eq!(monitor.snapshot(), snapshot);
        assert_eq!(monitor.last_process_readings(), (12_000_000_000, 61_000));
    }

    #[test]
    fn test_system_cpu_wins_when_higher() {
        let monitor = monitor(vec![
            tick(1.0, 0.1, 10_000, 60_000),
            tick(1.0, 0.9, 10_400, 61_000),
        ]);
        monitor.sample().unwrap();
        assert_relative_eq!(monitor.sample().unwrap().cpu_usage, 0.9);
    }

    #[test]
    fn test_failed_tick_keeps_last_snapshot() {
        let monitor = monitor(vec![tick(2.0, 0.4, 1_000, 1_000), None]);
        let first = monitor.sample().unwrap();

        assert_eq!(
            monitor.sample(),
            Err(ProbeError::Unavailable("scripted"))
        );
        assert_eq!(monitor.snapshot(), first);
        assert_eq!(monitor.last_process_readings(), (1_000_000_000, 1_000));
    }

    #[test]
    fn test_zero_uptime_delta_falls_back_to_system_cpu() {
        let monitor = monitor(vec![
            tick(1.0, 0.2, 1_000, 5_000),
            tick(1.0, 0.2, 2_000, 5_000),
        ]);
        monitor.sample().unwrap();
        assert_relative_eq!(monitor.sample().unwrap().cpu_usage, 0.2);
    }

    /// Root statistics that count how often the diagnostic reads them.
    #[derive(Default)]
    struct CountingNode {
        reads: AtomicUsize,
    }

    impl StatisticsNode for CountingNode {
        fn pass_qps(&self) -> f64 {
            self.reads.fetch_add(1, Ordering::SeqCst);
            42.0
        }
        fn previous_pass_qps(&self) -> f64 {
            0.0
        }
        fn success_qps(&self) -> f64 {
            0.0
        }
        fn avg_rt(&self) -> f64 {
            0.0
        }
        fn min_rt(&self) -> f64 {
            0.0
        }
        fn max_success_qps(&self) -> f64 {
            0.0
        }
        fn cur_thread_num(&self) -> u32 {
            0
        }
    }

    #[test]
    fn test_high_load_diagnostic_reads_root_only_above_threshold() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Info)
            .try_init();
        // Diagnostic arguments are only evaluated when info is enabled.
        log::set_max_level(log::LevelFilter::Info);

        let root = Arc::new(CountingNode::default());
        let threshold = Arc::new(AtomicF64::new(2.0));
        let monitor = AdaptiveSystemMonitor::new(
            Arc::new(ScriptedProvider::new(vec![
                tick(1.0, 0.1, 1_000, 1_000),
                tick(3.0, 0.1, 1_100, 2_000),
                tick(2.0, 0.1, 1_200, 3_000),
            ])),
            threshold,
        )
        .with_root_node(root.clone());

        monitor.sample().unwrap();
        assert_eq!(root.reads.load(Ordering::SeqCst), 0);

        monitor.sample().unwrap();
        assert_eq!(root.reads.load(Ordering::SeqCst), 1);

        // At the threshold is not above it.
        monitor.sample().unwrap();
        assert_eq!(root.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_process_cpu_usage_edge_cases() {
        assert_relative_eq!(process_cpu_usage(2_000.0, 1_000.0, 4), 0.5);
        assert_eq!(process_cpu_usage(10.0, 0.0, 4), -1.0);
        assert_eq!(process_cpu_usage(10.0, 1_000.0, 0), -1.0);
    }
}
