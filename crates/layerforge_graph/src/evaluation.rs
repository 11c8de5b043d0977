// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation: per-run context, memoized pull evaluation and errors.

use crate::graph::Graph;
use crate::link::LinkIndex;
use crate::node::{Node, NodeId, NodeRegistry};
use crate::port::PortValue;
use crate::preview::Preview;
use crate::profile::{MachineProfile, ProfileBase};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Global parameters shared read-only by every node in a run
pub type Params = IndexMap<String, serde_json::Value>;

/// Result of evaluating a node
#[derive(Debug, Clone, Default)]
pub struct NodeOutput {
    /// Output values by port name
    pub values: IndexMap<String, PortValue>,
}

impl NodeOutput {
    /// Create a new empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, port: impl Into<String>, value: PortValue) -> Self {
        self.set(port, value);
        self
    }

    /// Set an output value
    pub fn set(&mut self, port: impl Into<String>, value: PortValue) {
        self.values.insert(port.into(), value);
    }

    /// Get an output value
    pub fn get(&self, port: &str) -> Option<&PortValue> {
        self.values.get(port)
    }

    /// The `preview` sub-value, if the node produced one
    pub fn preview(&self) -> Option<&Arc<Preview>> {
        self.get("preview").and_then(PortValue::as_preview)
    }

    /// Whether no value was produced
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-run evaluation state.
///
/// Owns the memo cache, the link index and the resolution stack; everything
/// else is borrowed read-only for the duration of the run.
pub struct EvaluationContext<'a> {
    graph: &'a Graph,
    registry: &'a NodeRegistry,
    links: LinkIndex<'a>,
    params: &'a Params,
    profile: Arc<MachineProfile>,
    base: ProfileBase,
    cache: HashMap<NodeId, Rc<NodeOutput>>,
    stack: Vec<NodeId>,
    evaluations: usize,
}

impl<'a> EvaluationContext<'a> {
    /// Create a fresh context for one run over `graph`
    pub fn new(
        graph: &'a Graph,
        registry: &'a NodeRegistry,
        params: &'a Params,
        profile: Arc<MachineProfile>,
    ) -> Self {
        let base = ProfileBase::derive(&profile);
        Self {
            graph,
            registry,
            links: LinkIndex::build(graph.links()),
            params,
            profile,
            base,
            cache: HashMap::new(),
            stack: Vec::new(),
            evaluations: 0,
        }
    }

    /// Evaluate a node, or return its memoized result.
    ///
    /// Returns `Ok(None)` when the ID is not in the graph so dangling links
    /// resolve to "no value".
    pub fn eval_node(
        &mut self,
        node_id: &NodeId,
    ) -> Result<Option<Rc<NodeOutput>>, EvaluationError> {
        if let Some(cached) = self.cache.get(node_id) {
            return Ok(Some(Rc::clone(cached)));
        }

        let graph = self.graph;
        let Some(node) = graph.node(node_id) else {
            return Ok(None);
        };

        if self.stack.contains(node_id) {
            let mut cycle = self.stack.clone();
            cycle.push(node_id.clone());
            return Err(EvaluationError::CycleDetected(cycle));
        }

        let registry = self.registry;
        let definition = registry
            .get(&node.node_type)
            .ok_or_else(|| EvaluationError::UnknownNodeType(node.node_type.clone()))?;

        tracing::debug!(node = %node_id, node_type = %node.node_type, "evaluating node");
        self.stack.push(node_id.clone());
        let result = definition.evaluator.evaluate(node, self);
        self.stack.pop();

        let output = Rc::new(result?);
        self.evaluations += 1;
        self.cache.insert(node_id.clone(), Rc::clone(&output));
        Ok(Some(output))
    }

    /// Pull the value feeding `port` on `node_id`.
    ///
    /// Evaluates the upstream node on demand. `None` when no link feeds the
    /// port or the upstream node produced nothing for the linked port.
    pub fn get_input(
        &mut self,
        node_id: &NodeId,
        port: &str,
    ) -> Result<Option<PortValue>, EvaluationError> {
        let Some(link) = self.links.source(node_id, port) else {
            return Ok(None);
        };

        let upstream = self.eval_node(&link.from.node)?;
        Ok(upstream.and_then(|output| output.get(&link.from.port).cloned()))
    }

    /// Like [`Self::get_input`] but fails when nothing arrives
    pub fn require_input(
        &mut self,
        node_id: &NodeId,
        port: &str,
    ) -> Result<PortValue, EvaluationError> {
        self.get_input(node_id, port)?
            .ok_or_else(|| EvaluationError::MissingRequiredInput {
                node: node_id.clone(),
                port: port.to_string(),
            })
    }

    /// Memoized result of a node, without evaluating it
    pub fn cached(&self, node_id: &NodeId) -> Option<&Rc<NodeOutput>> {
        self.cache.get(node_id)
    }

    /// Number of node evaluations performed so far
    pub fn evaluation_count(&self) -> usize {
        self.evaluations
    }

    /// The graph being evaluated
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// The node registry
    pub fn registry(&self) -> &'a NodeRegistry {
        self.registry
    }

    /// The link index built for this run
    pub fn links(&self) -> &LinkIndex<'a> {
        &self.links
    }

    /// All global parameters
    pub fn params(&self) -> &'a Params {
        self.params
    }

    /// A single global parameter
    pub fn param(&self, name: &str) -> Option<&'a serde_json::Value> {
        self.params.get(name)
    }

    /// The effective machine profile for this run
    pub fn profile(&self) -> &Arc<MachineProfile> {
        &self.profile
    }

    /// Base values derived from the effective profile
    pub fn profile_base(&self) -> &ProfileBase {
        &self.base
    }
}

/// Trait for evaluating nodes
pub trait NodeEvaluator: Send + Sync {
    /// Evaluate a node and produce its outputs by port name
    fn evaluate(
        &self,
        node: &Node,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<NodeOutput, EvaluationError>;
}

impl<F> NodeEvaluator for F
where
    F: Fn(&Node, &mut EvaluationContext<'_>) -> Result<NodeOutput, EvaluationError> + Send + Sync,
{
    fn evaluate(
        &self,
        node: &Node,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<NodeOutput, EvaluationError> {
        self(node, ctx)
    }
}

/// Error during evaluation
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// Graph contains a cycle; holds the resolution path ending at the repeated node
    #[error("Cycle detected: {}", format_cycle(.0))]
    CycleDetected(Vec<NodeId>),

    /// Node type not present in the registry
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// A node's own evaluation failed
    #[error("Node {id} failed: {source}")]
    NodeFailed {
        /// Failing node
        id: NodeId,
        /// Underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A node could not run without an input
    #[error("Node {node} is missing required input '{port}'")]
    MissingRequiredInput {
        /// Node that needed the input
        node: NodeId,
        /// Unconnected or empty port
        port: String,
    },
}

impl EvaluationError {
    /// Wrap a node-local failure
    pub fn node_failed(
        id: &NodeId,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::NodeFailed {
            id: id.clone(),
            source: source.into(),
        }
    }
}

fn format_cycle(path: &[NodeId]) -> String {
    path.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" → ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{Endpoint, Link};
    use crate::node::{NodeCategory, NodeDefinition};
    use crate::port::{Port, PortType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn number_node(id: &str) -> NodeDefinition {
        NodeDefinition::new(id, NodeCategory::Input, |node, _| {
            let value = node.number("value").unwrap_or(0.0);
            Ok(NodeOutput::new().with("value", PortValue::Number(value)))
        })
        .with_output(Port::output("value", PortType::Number))
    }

    fn sum_node() -> NodeDefinition {
        NodeDefinition::new("Sum", NodeCategory::Utility, |node, ctx| {
            let a = ctx.get_input(&node.id, "a")?.and_then(|v| v.as_number()).unwrap_or(0.0);
            let b = ctx.get_input(&node.id, "b")?.and_then(|v| v.as_number()).unwrap_or(0.0);
            Ok(NodeOutput::new().with("value", PortValue::Number(a + b)))
        })
        .with_input(Port::input("a", PortType::Number))
        .with_input(Port::input("b", PortType::Number))
        .with_output(Port::output("value", PortType::Number))
    }

    fn link(from: &str, to: &str, port: &str) -> Link {
        Link::new(
            Endpoint::new(from, "value", PortType::Number),
            Endpoint::new(to, port, PortType::Number),
        )
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register(number_node("Number"));
        registry.register(sum_node());
        registry
    }

    #[test]
    fn test_pull_evaluation() {
        let mut graph = Graph::new("sum");
        graph.add_node(Node::new("a", "Number").with_data(serde_json::json!({"value": 2.0})));
        graph.add_node(Node::new("b", "Number").with_data(serde_json::json!({"value": 3.5})));
        graph.add_node(Node::new("sum", "Sum"));
        graph.connect(link("a", "sum", "a"));
        graph.connect(link("b", "sum", "b"));

        let registry = registry();
        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());
        let output = ctx.eval_node(&"sum".into()).unwrap().unwrap();

        assert_eq!(output.get("value").and_then(PortValue::as_number), Some(5.5));
        assert_eq!(ctx.evaluation_count(), 3);
    }

    #[test]
    fn test_memoized_result_is_shared() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = registry();
        registry.register(
            NodeDefinition::new("Counted", NodeCategory::Input, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(NodeOutput::new().with("value", PortValue::Number(1.0)))
            })
            .with_output(Port::output("value", PortType::Number)),
        );

        let mut graph = Graph::new("diamond");
        graph.add_node(Node::new("src", "Counted"));
        graph.add_node(Node::new("sum", "Sum"));
        graph.connect(link("src", "sum", "a"));
        graph.connect(link("src", "sum", "b"));

        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());
        let sum = ctx.eval_node(&"sum".into()).unwrap().unwrap();
        let first = ctx.eval_node(&"src".into()).unwrap().unwrap();
        let second = ctx.eval_node(&"src".into()).unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(sum.get("value").and_then(PortValue::as_number), Some(2.0));
    }

    #[test]
    fn test_cycle_reports_full_path() {
        let mut graph = Graph::new("cycle");
        graph.add_node(Node::new("A", "Sum"));
        graph.add_node(Node::new("B", "Sum"));
        graph.connect(link("A", "B", "a"));
        graph.connect(link("B", "A", "a"));

        let registry = registry();
        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());
        let err = ctx.eval_node(&"A".into()).unwrap_err();

        assert!(matches!(&err, EvaluationError::CycleDetected(path) if path.len() == 3));
        assert!(err.to_string().contains("A → B → A"));
    }

    #[test]
    fn test_unknown_type() {
        let mut graph = Graph::new("unknown");
        graph.add_node(Node::new("x", "Teleporter"));

        let registry = registry();
        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());
        let err = ctx.eval_node(&"x".into()).unwrap_err();

        assert!(matches!(err, EvaluationError::UnknownNodeType(ref t) if t == "Teleporter"));
        assert!(ctx.cached(&"x".into()).is_none());
    }

    #[test]
    fn test_missing_node_and_unlinked_port() {
        let mut graph = Graph::new("dangling");
        graph.add_node(Node::new("sum", "Sum"));
        graph.connect(link("ghost", "sum", "a"));

        let registry = registry();
        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());

        assert!(ctx.eval_node(&"ghost".into()).unwrap().is_none());
        assert!(ctx.get_input(&"sum".into(), "b").unwrap().is_none());
        let err = ctx.require_input(&"sum".into(), "a").unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::MissingRequiredInput { ref port, .. } if port == "a"
        ));
    }

    #[test]
    fn test_node_failure_wraps_source() {
        let mut registry = registry();
        registry.register(NodeDefinition::new("Broken", NodeCategory::Utility, |node, _| {
            Err(EvaluationError::node_failed(&node.id, "slicer crashed"))
        }));

        let mut graph = Graph::new("broken");
        graph.add_node(Node::new("b", "Broken"));

        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());
        let err = ctx.eval_node(&"b".into()).unwrap_err();
        assert_eq!(err.to_string(), "Node b failed: slicer crashed");
    }
}
