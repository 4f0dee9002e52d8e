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

//! Flat persistence record for system rules, as stored by a management dashboard.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::SystemRule;

/// A system rule bound to one application instance, with bookkeeping fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRuleEntity {
    /// Unique identifier assigned by the store.
    pub id: Option<i64>,
    /// Application name.
    pub app: String,
    /// Address of the machine the application runs on.
    pub ip: String,
    /// Port of the application instance.
    pub port: u16,
    /// Highest allowed one-minute load average.
    pub highest_system_load: Option<f64>,
    /// Highest allowed entry-point average response time, in milliseconds.
    pub avg_rt: Option<i64>,
    /// Highest allowed number of concurrent entry-point threads.
    pub max_thread: Option<i64>,
    /// Highest allowed entry-point requests per second.
    pub qps: Option<f64>,
    /// Highest allowed CPU usage fraction.
    pub highest_cpu_usage: Option<f64>,
    /// When the record was created.
    pub created_at: Option<SystemTime>,
    /// When the record was last modified.
    pub modified_at: Option<SystemTime>,
}

impl SystemRuleEntity {
    /// Builds a record for `rule` as applied on `app` at `ip:port`.
    pub fn from_system_rule(app: impl Into<String>, ip: impl Into<String>, port: u16, rule: &SystemRule) -> Self {
        Self {
            app: app.into(),
            ip: ip.into(),
            port,
            highest_system_load: rule.highest_system_load,
            avg_rt: rule.avg_rt,
            max_thread: rule.max_thread,
            qps: rule.qps,
            highest_cpu_usage: rule.highest_cpu_usage,
            ..Default::default()
        }
    }

    /// Extracts the rule this record stores.
    pub fn to_rule(&self) -> SystemRule {
        SystemRule {
            highest_system_load: self.highest_system_load,
            highest_cpu_usage: self.highest_cpu_usage,
            qps: self.qps,
            avg_rt: self.avg_rt,
            max_thread: self.max_thread,
        }
    }
}
