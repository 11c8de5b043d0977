// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and links.

use crate::config::ConfigError;
use crate::link::Link;
use crate::node::{Node, NodeId, NodeRegistry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A workflow graph.
///
/// Node iteration follows insertion order, which every evaluation pass
/// relies on for reproducible results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Links between nodes
    #[serde(default)]
    links: Vec<Link>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            links: Vec::new(),
        }
    }

    /// Add a node to the graph, replacing any node with the same ID
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Remove a node and its links
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<Node> {
        self.links.retain(|link| !link.involves_node(node_id));
        self.nodes.shift_remove(node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all nodes of a given type, in insertion order
    pub fn nodes_of_type<'g>(&'g self, node_type: &'g str) -> impl Iterator<Item = &'g Node> + 'g {
        self.nodes.values().filter(move |n| n.node_type == node_type)
    }

    /// First node of a given type
    pub fn first_of_type(&self, node_type: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.node_type == node_type)
    }

    /// Whether any node has the given type
    pub fn has_type(&self, node_type: &str) -> bool {
        self.first_of_type(node_type).is_some()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a link.
    ///
    /// Input ports take a single link: an existing link into the same
    /// `(to.node, to.port)` is replaced and returned.
    pub fn connect(&mut self, link: Link) -> Option<Link> {
        let replaced = self
            .links
            .iter()
            .position(|l| l.targets(&link.to.node, &link.to.port))
            .map(|index| self.links.remove(index));
        self.links.push(link);
        replaced
    }

    /// Remove the link feeding an input port
    pub fn disconnect(&mut self, node_id: &NodeId, port: &str) -> Option<Link> {
        let index = self.links.iter().position(|l| l.targets(node_id, port))?;
        Some(self.links.remove(index))
    }

    /// Get all links in order
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Links leaving a node
    pub fn links_from<'g>(&'g self, node_id: &'g NodeId) -> impl Iterator<Item = &'g Link> + 'g {
        self.links.iter().filter(move |l| &l.from.node == node_id)
    }

    /// Links entering a node
    pub fn links_to_node<'g>(&'g self, node_id: &'g NodeId) -> impl Iterator<Item = &'g Link> + 'g {
        self.links.iter().filter(move |l| &l.to.node == node_id)
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Check a link against the registered port declarations.
    ///
    /// Editor-side validation only; evaluation never calls this.
    pub fn validate_link(
        &self,
        registry: &NodeRegistry,
        link: &Link,
    ) -> Result<(), ConnectionError> {
        if link.from.node == link.to.node {
            return Err(ConnectionError::SelfLoop);
        }

        let source = self
            .node(&link.from.node)
            .ok_or_else(|| ConnectionError::NodeNotFound(link.from.node.clone()))?;
        let target = self
            .node(&link.to.node)
            .ok_or_else(|| ConnectionError::NodeNotFound(link.to.node.clone()))?;

        let source_def = registry
            .get(&source.node_type)
            .ok_or_else(|| ConnectionError::UnknownNodeType(source.node_type.clone()))?;
        let target_def = registry
            .get(&target.node_type)
            .ok_or_else(|| ConnectionError::UnknownNodeType(target.node_type.clone()))?;

        let source_port = source_def
            .output(&link.from.port)
            .ok_or_else(|| ConnectionError::PortNotFound(link.from.key().to_string()))?;
        let target_port = target_def
            .input(&link.to.port)
            .ok_or_else(|| ConnectionError::PortNotFound(link.to.key().to_string()))?;

        if !source_port.can_connect(target_port) {
            return Err(ConnectionError::IncompatiblePorts {
                from: source_port.port_type.to_string(),
                to: target_port.port_type.to_string(),
            });
        }

        Ok(())
    }

    /// Load a graph from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save the graph to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when validating a link
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node type not registered
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Port not declared on the node
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Incompatible port types
    #[error("Incompatible port types: {from} -> {to}")]
    IncompatiblePorts {
        /// Source port type
        from: String,
        /// Target port type
        to: String,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::NodeOutput;
    use crate::link::Endpoint;
    use crate::node::{NodeCategory, NodeDefinition};
    use crate::port::{Port, PortType};

    fn mesh_link(from: &str, to: &str) -> Link {
        Link::new(
            Endpoint::new(from, "mesh", PortType::Mesh),
            Endpoint::new(to, "mesh", PortType::Mesh),
        )
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register(
            NodeDefinition::new("Source", NodeCategory::Input, |_, _| Ok(NodeOutput::new()))
                .with_output(Port::output("mesh", PortType::Mesh))
                .with_output(Port::output("gcode", PortType::Gcode)),
        );
        registry.register(
            NodeDefinition::new("Sink", NodeCategory::Output, |_, _| Ok(NodeOutput::new()))
                .with_input(Port::input("mesh", PortType::Mesh)),
        );
        registry
    }

    #[test]
    fn test_connect_replaces_occupied_input() {
        let mut graph = Graph::new("replace");
        graph.add_node(Node::new("a", "Source"));
        graph.add_node(Node::new("b", "Source"));
        graph.add_node(Node::new("c", "Sink"));

        assert!(graph.connect(mesh_link("a", "c")).is_none());
        let replaced = graph.connect(mesh_link("b", "c")).unwrap();

        assert_eq!(replaced.from.node, NodeId::from("a"));
        assert_eq!(graph.link_count(), 1);
        assert_eq!(graph.links()[0].from.node, NodeId::from("b"));
    }

    #[test]
    fn test_remove_node_drops_links() {
        let mut graph = Graph::new("remove");
        graph.add_node(Node::new("a", "Source"));
        graph.add_node(Node::new("c", "Sink"));
        graph.connect(mesh_link("a", "c"));

        assert!(graph.remove_node(&"a".into()).is_some());
        assert_eq!(graph.link_count(), 0);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut graph = Graph::new("order");
        for id in ["z", "a", "m"] {
            graph.add_node(Node::new(id, "Source"));
        }
        graph.remove_node(&"a".into());

        let ids: Vec<_> = graph.nodes().map(|n| n.id.as_str().to_string()).collect();
        assert_eq!(ids, ["z", "m"]);
    }

    #[test]
    fn test_validate_link() {
        let registry = registry();
        let mut graph = Graph::new("validate");
        graph.add_node(Node::new("a", "Source"));
        graph.add_node(Node::new("c", "Sink"));

        assert!(graph.validate_link(&registry, &mesh_link("a", "c")).is_ok());
        assert!(matches!(
            graph.validate_link(&registry, &mesh_link("a", "a")),
            Err(ConnectionError::SelfLoop)
        ));

        let wrong_type = Link::new(
            Endpoint::new("a", "gcode", PortType::Gcode),
            Endpoint::new("c", "mesh", PortType::Mesh),
        );
        assert!(matches!(
            graph.validate_link(&registry, &wrong_type),
            Err(ConnectionError::IncompatiblePorts { .. })
        ));
        assert!(matches!(
            graph.validate_link(&registry, &mesh_link("a", "ghost")),
            Err(ConnectionError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_ron_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.ron");

        let mut graph = Graph::new("saved");
        graph.add_node(Node::new("a", "Source").with_data(serde_json::json!({"scale": 2.0})));
        graph.add_node(Node::new("c", "Sink"));
        graph.connect(mesh_link("a", "c"));
        graph.save(&path).unwrap();

        let loaded = Graph::load(&path).unwrap();
        assert_eq!(loaded.name, "saved");
        assert_eq!(loaded.links(), graph.links());
        assert_eq!(loaded.node(&"a".into()).unwrap().number("scale"), Some(2.0));
    }
}
