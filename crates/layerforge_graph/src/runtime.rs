// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph runs: profile resolution, preview/export orchestration and results.
//!
//! A run without an `Export` node is a preview run: every node that declares
//! a mesh, path, toolpath or preview output is evaluated. A run with one or
//! more `Export` nodes evaluates those (the last is primary) and then every
//! `G-code Output` node. Either way the memoized outputs are then aggregated
//! and the winning toolpath is normalized for preview.

use crate::aggregate::{collect_preview_outputs, node_candidates, OutputReducer};
use crate::config::EngineConfig;
use crate::evaluation::{EvaluationContext, EvaluationError, NodeOutput};
use crate::graph::Graph;
use crate::mesh::Mesh;
use crate::node::NodeRegistry;
use crate::nodes::{create_default_registry, EXPORT, GCODE_OUTPUT, PRINTER};
use crate::normalize::NormalizeOptions;
use crate::port::PortValue;
use crate::preview::{GcodeStats, Preview, PreviewKind};
use crate::profile::MachineProfile;
use crate::toolpath::{PathPoint, Toolpath};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Evaluates graphs against a node registry and engine configuration
#[derive(Debug, Clone)]
pub struct Engine {
    registry: NodeRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine
    pub fn new(registry: NodeRegistry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Create an engine with the built-in node library
    pub fn with_default_nodes(config: EngineConfig) -> Self {
        Self::new(create_default_registry(), config)
    }

    /// The node registry
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Mutable node registry, for hosts registering slicer nodes
    pub fn registry_mut(&mut self) -> &mut NodeRegistry {
        &mut self.registry
    }

    /// The engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the engine configuration
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    /// Evaluate a graph into one aggregated result.
    ///
    /// Any unregistered node type fails the run before a single node is
    /// evaluated. Errors from node evaluation propagate unchanged.
    pub fn evaluate_graph(&self, graph: &Graph) -> Result<EvaluationResult, EvaluationError> {
        let started = Instant::now();

        if let Some(node) = graph.nodes().find(|n| !self.registry.contains(&n.node_type)) {
            return Err(EvaluationError::UnknownNodeType(node.node_type.clone()));
        }

        let profile = Arc::new(self.resolve_profile(graph));
        let mut ctx = EvaluationContext::new(
            graph,
            &self.registry,
            &self.config.params,
            Arc::clone(&profile),
        );
        let has_export = graph.has_type(EXPORT);

        let primary = if has_export {
            evaluate_export(&mut ctx)?
        } else {
            evaluate_preview(&mut ctx)?
        };

        let options = NormalizeOptions::new(&profile).with_max_moves(self.config.max_preview_moves);
        let reducer = OutputReducer::new(has_export).seeded(primary.mesh, primary.path);
        let outputs = collect_preview_outputs(&ctx, reducer, &options);

        if !outputs.preview_warning.is_empty() {
            tracing::warn!("{}", outputs.preview_warning);
        }

        let result = EvaluationResult {
            mesh: outputs.mesh,
            path: outputs.path,
            toolpath: outputs.toolpath,
            preview: outputs.preview,
            preview_warning: outputs.preview_warning,
            gcode: primary.gcode,
            stats: primary.stats,
            evaluated_nodes: ctx.evaluation_count(),
            profile,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            graph = %graph.name,
            nodes = result.evaluated_nodes,
            path_points = result.path.len(),
            gcode_bytes = result.stats.length,
            "Graph evaluated in {:.2?}",
            result.elapsed
        );
        Ok(result)
    }

    /// Evaluate a graph and report a terminal status instead of an error
    pub fn run(&self, graph: &Graph) -> RunReport {
        let started = Instant::now();
        match self.evaluate_graph(graph) {
            Ok(result) => RunReport {
                status: RunStatus::Ok,
                elapsed: result.elapsed,
                result: Some(result),
            },
            Err(err) => {
                tracing::error!(graph = %graph.name, "Graph evaluation failed: {}", err);
                RunReport {
                    status: RunStatus::Error(err.to_string()),
                    elapsed: started.elapsed(),
                    result: None,
                }
            }
        }
    }

    /// First Printer node's data, else the configured fallback profile
    fn resolve_profile(&self, graph: &Graph) -> MachineProfile {
        let Some(printer) = graph.first_of_type(PRINTER) else {
            return self.config.fallback_profile.clone();
        };
        match MachineProfile::from_data(&printer.data) {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(
                    node = %printer.id,
                    "Invalid printer profile, using fallback: {}",
                    err
                );
                self.config.fallback_profile.clone()
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_default_nodes(EngineConfig::default())
    }
}

/// Values produced by the main pass, before aggregation
struct PrimaryOutputs {
    mesh: Option<Arc<Mesh>>,
    path: Option<Arc<Vec<PathPoint>>>,
    gcode: Arc<str>,
    stats: GcodeStats,
}

impl Default for PrimaryOutputs {
    fn default() -> Self {
        Self {
            mesh: None,
            path: None,
            gcode: Arc::from(""),
            stats: GcodeStats::default(),
        }
    }
}

impl PrimaryOutputs {
    fn from_export(output: &NodeOutput) -> Self {
        let gcode = match output.get("gcode") {
            Some(PortValue::Gcode(gcode)) => Arc::clone(gcode),
            _ => Arc::from(""),
        };
        let stats = match output.get("stats") {
            Some(PortValue::Stats(stats)) => *stats,
            _ => GcodeStats::measure(&gcode),
        };
        Self {
            mesh: output.get("mesh").and_then(PortValue::as_mesh).cloned(),
            path: output.get("path").and_then(PortValue::as_path).cloned(),
            gcode,
            stats,
        }
    }
}

fn evaluate_preview(ctx: &mut EvaluationContext<'_>) -> Result<PrimaryOutputs, EvaluationError> {
    let graph = ctx.graph();
    let registry = ctx.registry();
    let mut reducer = OutputReducer::new(false);

    for node in graph.nodes() {
        let Some(definition) = registry.get(&node.node_type) else {
            continue;
        };
        if !definition.produces_preview() {
            continue;
        }
        if let Some(output) = ctx.eval_node(&node.id)? {
            reducer.extend(node_candidates(&definition.outputs, &output));
        }
    }

    Ok(PrimaryOutputs {
        mesh: reducer.mesh().cloned(),
        path: reducer.path().cloned(),
        ..PrimaryOutputs::default()
    })
}

fn evaluate_export(ctx: &mut EvaluationContext<'_>) -> Result<PrimaryOutputs, EvaluationError> {
    let graph = ctx.graph();
    let mut primary = PrimaryOutputs::default();

    for node in graph.nodes_of_type(EXPORT) {
        if let Some(output) = ctx.eval_node(&node.id)? {
            primary = PrimaryOutputs::from_export(&output);
        }
    }
    for node in graph.nodes_of_type(GCODE_OUTPUT) {
        ctx.eval_node(&node.id)?;
    }

    Ok(primary)
}

/// Aggregated outputs of one run
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    /// Final mesh
    pub mesh: Option<Arc<Mesh>>,
    /// Machine-space preview path
    pub path: Arc<Vec<PathPoint>>,
    /// Toolpath the path was normalized from
    pub toolpath: Option<Arc<Toolpath>>,
    /// Final preview
    pub preview: Option<Arc<Preview>>,
    /// Non-empty when the preview path was decimated
    pub preview_warning: String,
    /// Exported G-code; empty for preview runs
    pub gcode: Arc<str>,
    /// Statistics of the exported G-code
    pub stats: GcodeStats,
    /// Effective machine profile
    pub profile: Arc<MachineProfile>,
    /// Number of node evaluations performed
    pub evaluated_nodes: usize,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl EvaluationResult {
    /// Whether the run produced G-code
    pub fn is_export(&self) -> bool {
        !self.gcode.is_empty()
    }

    /// Serializable summary for reporting
    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            profile: self.profile.name.clone(),
            mesh_vertices: self.mesh.as_ref().map(|m| m.vertices.len()),
            mesh_triangles: self.mesh.as_ref().map(|m| m.triangle_count()),
            path_points: self.path.len(),
            path_layers: self.path.last().map_or(0, |p| p.layer + 1),
            toolpath_moves: self.toolpath.as_ref().map(|t| t.move_count()),
            preview: self.preview.as_ref().map(|p| p.kind),
            preview_warning: self.preview_warning.clone(),
            stats: self.stats,
            evaluated_nodes: self.evaluated_nodes,
            elapsed_ms: self.elapsed.as_secs_f64() * 1000.0,
        }
    }
}

/// Compact, serializable view of an [`EvaluationResult`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    /// Effective profile name
    pub profile: String,
    /// Mesh vertex count
    pub mesh_vertices: Option<usize>,
    /// Mesh triangle count
    pub mesh_triangles: Option<usize>,
    /// Preview path length
    pub path_points: usize,
    /// Layers covered by the preview path
    pub path_layers: usize,
    /// Moves in the normalized toolpath
    pub toolpath_moves: Option<usize>,
    /// Preview kind
    pub preview: Option<PreviewKind>,
    /// Decimation warning
    #[serde(skip_serializing_if = "String::is_empty")]
    pub preview_warning: String,
    /// G-code statistics
    pub stats: GcodeStats,
    /// Node evaluations
    pub evaluated_nodes: usize,
    /// Run time in milliseconds
    pub elapsed_ms: f64,
}

/// Terminal status of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Run completed
    Ok,
    /// Run failed with this message
    Error(String),
}

/// Outcome of [`Engine::run`]
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Terminal status
    pub status: RunStatus,
    /// Wall-clock time of the run
    pub elapsed: Duration,
    /// Result of a successful run
    pub result: Option<EvaluationResult>,
}

impl RunReport {
    /// Whether the run completed
    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }
}
