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

//! # Sluice Core
//!
//! Foundational crate containing the traits, rule model and core types that
//! define the admission engine's architecture.
//!
//! This crate holds the abstract "what" of admission control: the statistics a
//! decision reads, the contract every traffic-shaping controller honors, the
//! host metrics the system monitor samples, and the rules that configure it all.
//! `sluice-control` provides the decision logic, `sluice-telemetry` the adaptive
//! system monitor and `sluice-infra` the concrete platform probes.

#![warn(missing_docs)]

pub mod clock;
pub mod context;
pub mod control;
pub mod error;
pub mod node;
pub mod platform;
pub mod rule;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utils;

pub use clock::{Clock, SystemClock};
pub use context::{EntryContext, EntryType};
pub use control::TrafficShapingController;
pub use error::{BlockError, LimitType, ProbeError, RuleError, WaitInterrupted};
pub use node::{NodeResolver, StatisticsNode};
pub use platform::{SystemMetricsProvider, SystemSnapshot, SystemStatus};
pub use rule::{ControlBehavior, ControlStrategy, FlowGrade, FlowRule, SystemRule};
pub use utils::atomic::AtomicF64;
