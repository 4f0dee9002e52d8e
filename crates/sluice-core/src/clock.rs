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

//! Time sources for admission decisions.
//!
//! Every decision in the engine is made against a [`Clock`] rather than the
//! ambient system time, so pacing state can be driven deterministically in
//! tests and simulations.

use std::fmt::Debug;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::error::WaitInterrupted;

/// A monotonic millisecond time source that can also suspend the caller.
pub trait Clock: Send + Sync + Debug + 'static {
    /// Returns the current time in milliseconds.
    fn now_millis(&self) -> i64;

    /// Suspends the calling thread for `duration`.
    ///
    /// Returns [`WaitInterrupted`] if the wait was cancelled before it elapsed.
    fn park(&self, duration: Duration) -> Result<(), WaitInterrupted>;
}

/// The production clock.
///
/// Time is anchored to the Unix epoch when the clock is created and then
/// advanced with a monotonic [`Instant`], so wall-clock adjustments never move
/// the pacing timeline backwards.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
    epoch_offset_ms: i64,
    shutdown: Option<Receiver<()>>,
}

impl SystemClock {
    /// Creates a clock whose waits cannot be interrupted.
    pub fn new() -> Self {
        let epoch_offset_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Self {
            origin: Instant::now(),
            epoch_offset_ms,
            shutdown: None,
        }
    }

    /// Creates a clock whose waits are cancelled by `shutdown`.
    ///
    /// Sending a message wakes one parked caller; dropping every sender wakes
    /// all of them, which is how a host signals shutdown.
    pub fn with_shutdown(shutdown: Receiver<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
            ..Self::new()
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        self.epoch_offset_ms + self.origin.elapsed().as_millis() as i64
    }

    fn park(&self, duration: Duration) -> Result<(), WaitInterrupted> {
        if duration.is_zero() {
            return Ok(());
        }
        match &self.shutdown {
            None => {
                thread::sleep(duration);
                Ok(())
            }
            Some(shutdown) => match shutdown.recv_timeout(duration) {
                Err(RecvTimeoutError::Timeout) => Ok(()),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("Park of {:?} cancelled by shutdown signal", duration);
                    Err(WaitInterrupted)
                }
            },
        }
    }
}
