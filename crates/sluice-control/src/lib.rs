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

//! # Sluice Control
//!
//! The decision layer of the admission engine: the traffic-shaping controllers
//! that turn a flow rule plus live statistics into a pass/block decision, the
//! flow rule manager and checker that select which statistics each rule reads,
//! and the system rule manager that sheds inbound traffic under host pressure.

#![warn(missing_docs)]

pub mod controller;
pub mod flow;
pub mod system;

pub use controller::{ControllerSettings, ShapingController};
pub use flow::{FlowRuleChecker, FlowRuleEntry, FlowRuleManager, FlowRuleSet};
pub use system::SystemRuleManager;
