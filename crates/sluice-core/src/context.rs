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

//! Per-entry admission context.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::node::StatisticsNode;

/// Direction of a unit of work relative to the protected service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntryType {
    /// Inbound traffic (an API call or RPC served by this process).
    ///
    /// Subject to system protection as well as resource-scoped rules.
    In,
    /// Outbound traffic (a call this process makes to a dependency).
    ///
    /// Exempt from system protection; resource-scoped rules still apply.
    #[default]
    Out,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::In => write!(f, "IN"),
            EntryType::Out => write!(f, "OUT"),
        }
    }
}

/// Everything the decision layer needs to know about one entry.
///
/// The caller (whatever wraps business code) builds one of these per admission
/// check. The statistics handles are the nodes the caller already maintains
/// for this resource; the engine only reads them.
#[derive(Clone)]
pub struct EntryContext<'a> {
    /// Name of the resource being admitted.
    pub resource: &'a str,
    /// Direction of the entry.
    pub entry_type: EntryType,
    /// Name of the calling application, empty when unknown.
    pub origin: &'a str,
    /// Name of the invocation context (the entrance the call came through).
    pub context_name: &'a str,
    /// Statistics of the resource across every caller.
    pub cluster_node: Option<Arc<dyn StatisticsNode>>,
    /// Statistics of the resource restricted to the current origin.
    pub origin_node: Option<Arc<dyn StatisticsNode>>,
    /// Statistics of the resource restricted to the current context.
    pub chain_node: Option<Arc<dyn StatisticsNode>>,
}

impl<'a> EntryContext<'a> {
    /// Creates a context with no origin, no context name and no statistics.
    pub fn new(resource: &'a str, entry_type: EntryType) -> Self {
        Self {
            resource,
            entry_type,
            origin: "",
            context_name: "",
            cluster_node: None,
            origin_node: None,
            chain_node: None,
        }
    }

    /// Attaches the resource-wide statistics node.
    pub fn with_cluster_node(mut self, node: Arc<dyn StatisticsNode>) -> Self {
        self.cluster_node = Some(node);
        self
    }

    /// Sets the calling origin and its statistics node.
    pub fn with_origin(mut self, origin: &'a str, node: Option<Arc<dyn StatisticsNode>>) -> Self {
        self.origin = origin;
        self.origin_node = node;
        self
    }

    /// Sets the invocation context and the statistics of this resource within it.
    pub fn with_context(
        mut self,
        context_name: &'a str,
        node: Option<Arc<dyn StatisticsNode>>,
    ) -> Self {
        self.context_name = context_name;
        self.chain_node = node;
        self
    }
}

impl fmt::Debug for EntryContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryContext")
            .field("resource", &self.resource)
            .field("entry_type", &self.entry_type)
            .field("origin", &self.origin)
            .field("context_name", &self.context_name)
            .field("has_cluster_node", &self.cluster_node.is_some())
            .field("has_origin_node", &self.origin_node.is_some())
            .field("has_chain_node", &self.chain_node.is_some())
            .finish()
    }
}
