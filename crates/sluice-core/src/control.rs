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

//! The contract shared by every traffic-shaping controller.

use std::fmt::Debug;

use crate::node::StatisticsNode;
use crate::rule::ControlBehavior;

/// Turns a rule plus live statistics into an admit/reject decision.
///
/// Implementations are built once per rule when a rule set is published and
/// are then shared by every thread admitting that resource. The contract is
/// total: overload is expressed as `false`, never as an error or a panic.
///
/// `can_pass` returns immediately, except for the queueing behaviors, which may
/// park the caller for at most the rule's maximum queueing time.
pub trait TrafficShapingController: Send + Sync + Debug {
    /// Decides whether `acquire_count` units may proceed.
    ///
    /// `acquire_count <= 0` always passes. `prioritized` lets a fast-fail
    /// controller borrow capacity from the next window instead of rejecting.
    fn can_pass(
        &self,
        node: Option<&dyn StatisticsNode>,
        acquire_count: i32,
        prioritized: bool,
    ) -> bool;

    /// The behavior this controller implements.
    fn behavior(&self) -> ControlBehavior;
}
