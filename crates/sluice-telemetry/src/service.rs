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

//! Background sampling service for the system monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::monitoring::AdaptiveSystemMonitor;

/// Configuration for the [`SystemStatusService`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between two samples.
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Runs [`AdaptiveSystemMonitor::sample`] on a dedicated thread.
///
/// The first sample is taken as soon as the thread starts. Admission checks
/// only ever read the monitor's snapshot; they never wait for a tick.
pub struct SystemStatusService {
    config: MonitorConfig,
    monitor: Arc<AdaptiveSystemMonitor>,
    running: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SystemStatusService {
    /// Creates a stopped service around `monitor`.
    pub fn new(config: MonitorConfig, monitor: Arc<AdaptiveSystemMonitor>) -> Self {
        Self {
            config,
            monitor,
            running: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            handle: None,
        }
    }

    /// Returns the monitor this service drives.
    pub fn monitor(&self) -> &Arc<AdaptiveSystemMonitor> {
        &self.monitor
    }

    /// Returns true while the sampling thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the sampling thread. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let monitor = Arc::clone(&self.monitor);
        let running = Arc::clone(&self.running);
        let interval = self.config.interval;

        let handle = thread::spawn(move || {
            log::info!(
                "System status service thread started (interval {:?}).",
                interval
            );

            loop {
                log::trace!("Sampling system status...");
                // Failures are logged by the monitor; the last snapshot stays.
                let _ = monitor.sample();

                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            running.store(false, Ordering::SeqCst);
            log::info!("System status service thread stopped.");
        });

        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
    }

    /// Stops the sampling thread and waits for it to exit.
    ///
    /// Returns promptly even with a long interval: the thread is woken rather
    /// than left to finish its sleep.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SystemStatusService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemStatusService")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Drop for SystemStatusService {
    fn drop(&mut self) {
        self.stop();
    }
}
