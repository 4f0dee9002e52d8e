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

//! The public-facing SDK for the Sluice admission engine.
//!
//! [`AdmissionEngine`] owns the flow and system rule managers and the
//! background system monitor, and answers one question per entry: may this
//! unit of work proceed?

#![warn(missing_docs)]

mod engine;

pub use engine::{AdmissionEngine, EngineConfig};

/// Re-exports of the types most callers need.
pub mod prelude {
    pub use crate::{AdmissionEngine, EngineConfig};
    pub use sluice_core::{
        BlockError, Clock, ControlBehavior, ControlStrategy, EntryContext, EntryType, FlowGrade,
        FlowRule, LimitType, NodeResolver, StatisticsNode, SystemRule, SystemSnapshot,
    };
    pub use sluice_telemetry::MonitorConfig;
}
