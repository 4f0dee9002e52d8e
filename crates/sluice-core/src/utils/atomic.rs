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

//! Lock-free floating point cells.

use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` that can be shared between threads without locking.
///
/// The value is stored as its IEEE-754 bit pattern inside an [`AtomicU64`], so
/// every load and store is a single 64-bit atomic access and readers can never
/// observe a torn value.
#[derive(Debug)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    /// Creates a new cell holding `value`.
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    /// Loads the current value.
    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.bits.load(order))
    }

    /// Stores a new value.
    pub fn store(&self, value: f64, order: Ordering) {
        self.bits.store(value.to_bits(), order);
    }

    /// Stores a new value, returning the previous one.
    pub fn swap(&self, value: f64, order: Ordering) -> f64 {
        f64::from_bits(self.bits.swap(value.to_bits(), order))
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f64_store_and_load() {
        let cell = AtomicF64::new(-1.0);
        assert_eq!(cell.load(Ordering::Relaxed), -1.0);

        cell.store(0.75, Ordering::Relaxed);
        assert_eq!(cell.load(Ordering::Relaxed), 0.75);
    }

    #[test]
    fn test_atomic_f64_swap_returns_previous() {
        let cell = AtomicF64::new(f64::MAX);
        let previous = cell.swap(4.5, Ordering::SeqCst);
        assert_eq!(previous, f64::MAX);
        assert_eq!(cell.load(Ordering::SeqCst), 4.5);
    }
}
