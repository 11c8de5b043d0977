// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node instances and the registry of node definitions.

use crate::evaluation::{EvaluationContext, EvaluationError, NodeEvaluator, NodeOutput};
use crate::port::{Port, PortType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node ID from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random node ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Inputs (meshes, toolpaths, constants)
    Input,
    /// Machine and material setup
    Machine,
    /// Geometry operations
    Geometry,
    /// Slicing and path generation
    Slicing,
    /// Outputs (export, display)
    Output,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Registered node type name
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display name (can be customized)
    #[serde(default)]
    pub name: String,
    /// Position in the editor canvas
    #[serde(default)]
    pub position: [f32; 2],
    /// Opaque per-node configuration
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Node {
    /// Create a node with the given ID and type
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Self {
            id: id.into(),
            name: node_type.clone(),
            node_type,
            position: [0.0, 0.0],
            data: serde_json::Value::Null,
        }
    }

    /// Set the configuration data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Read a field from the configuration data
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Read a numeric field from the configuration data
    pub fn number(&self, key: &str) -> Option<f64> {
        self.field(key).and_then(serde_json::Value::as_f64)
    }
}

/// A registered node type: declared ports plus its evaluator
#[derive(Clone)]
pub struct NodeDefinition {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Declared input ports
    pub inputs: Vec<Port>,
    /// Declared output ports
    pub outputs: Vec<Port>,
    /// Evaluation function
    pub evaluator: Arc<dyn NodeEvaluator>,
}

impl NodeDefinition {
    /// Create a definition with no ports from an evaluation function
    pub fn new<F>(id: impl Into<String>, category: NodeCategory, evaluate: F) -> Self
    where
        F: Fn(&Node, &mut EvaluationContext<'_>) -> Result<NodeOutput, EvaluationError>
            + Send
            + Sync
            + 'static,
    {
        Self::from_evaluator(id, category, evaluate)
    }

    /// Create a definition with no ports from an evaluator object
    pub fn from_evaluator(
        id: impl Into<String>,
        category: NodeCategory,
        evaluator: impl NodeEvaluator + 'static,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            evaluator: Arc::new(evaluator),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an input port
    pub fn with_input(mut self, port: Port) -> Self {
        self.inputs.push(port);
        self
    }

    /// Add an output port
    pub fn with_output(mut self, port: Port) -> Self {
        self.outputs.push(port);
        self
    }

    /// Get an input port by name
    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Get an output port by name
    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Whether any declared output has the given type
    pub fn has_output_type(&self, port_type: &PortType) -> bool {
        self.outputs.iter().any(|p| &p.port_type == port_type)
    }

    /// Whether any declared output feeds preview aggregation
    pub fn produces_preview(&self) -> bool {
        self.outputs.iter().any(|p| p.port_type.is_preview_category())
    }
}

impl fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Registry of available node types
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    /// Registered definitions by type name
    types: IndexMap<String, NodeDefinition>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node definition, replacing any previous one with the same ID
    pub fn register(&mut self, definition: NodeDefinition) {
        self.types.insert(definition.id.clone(), definition);
    }

    /// Get a definition by type name
    pub fn get(&self, id: &str) -> Option<&NodeDefinition> {
        self.types.get(id)
    }

    /// Whether a type name is registered
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Get all registered definitions
    pub fn definitions(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.types.values()
    }

    /// Get definitions by category
    pub fn in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeDefinition> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Create a node instance of a registered type with a fresh ID
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        self.get(type_id).map(|def| {
            let mut node = Node::new(NodeId::generate(), def.id.clone());
            node.name = def.name.clone();
            node
        })
    }

    /// Add every definition from another registry; theirs win on conflicts
    pub fn merge(&mut self, other: NodeRegistry) {
        self.types.extend(other.types);
    }
}
