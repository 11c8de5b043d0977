// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions and the per-run input lookup.

use crate::node::NodeId;
use crate::port::PortType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One end of a link
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Node ID
    pub node: NodeId,
    /// Port name on that node
    pub port: String,
    /// Semantic type tag of the port
    #[serde(rename = "type")]
    pub port_type: PortType,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(node: impl Into<NodeId>, port: impl Into<String>, port_type: PortType) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
            port_type,
        }
    }

    /// Lookup key of this endpoint
    pub fn key(&self) -> PortKey {
        PortKey::new(self.node.clone(), self.port.clone())
    }
}

/// A directed link from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Source (output) endpoint
    pub from: Endpoint,
    /// Target (input) endpoint
    pub to: Endpoint,
}

impl Link {
    /// Create a new link
    pub fn new(from: Endpoint, to: Endpoint) -> Self {
        Self { from, to }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        &self.from.node == node_id || &self.to.node == node_id
    }

    /// Whether this link feeds the given input port
    pub fn targets(&self, node_id: &NodeId, port: &str) -> bool {
        &self.to.node == node_id && self.to.port == port
    }
}

/// `(node, port)` pair identifying an input port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortKey {
    /// Node ID
    pub node: NodeId,
    /// Port name
    pub port: String,
}

impl PortKey {
    /// Create a new key
    pub fn new(node: NodeId, port: String) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}

/// Lookup from an input port to the single link feeding it.
///
/// Built once per run. When two links target the same port the later one
/// in iteration order wins.
#[derive(Debug, Default)]
pub struct LinkIndex<'a> {
    by_target: HashMap<PortKey, &'a Link>,
}

impl<'a> LinkIndex<'a> {
    /// Index a link sequence by target port
    pub fn build(links: impl IntoIterator<Item = &'a Link>) -> Self {
        let by_target = links.into_iter().map(|link| (link.to.key(), link)).collect();
        Self { by_target }
    }

    /// Link feeding `port` on `node_id`, if any
    pub fn source(&self, node_id: &NodeId, port: &str) -> Option<&'a Link> {
        self.by_target
            .get(&PortKey::new(node_id.clone(), port.to_string()))
            .copied()
    }

    /// Number of indexed input ports
    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    /// Whether no links were indexed
    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
