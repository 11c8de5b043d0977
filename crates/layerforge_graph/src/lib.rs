// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph evaluation engine for `layerforge`.
//!
//! This crate evaluates the node graphs behind a 3D-printing workflow editor:
//! - Mesh import and transform
//! - Toolpath generation (through external slicer nodes)
//! - Live preview of meshes and toolpaths
//! - G-code export
//!
//! ## Architecture
//!
//! A run is driven by [`Engine::evaluate_graph`]:
//! - Typed input/output ports resolved through a per-run link index
//! - Memoized, cycle-checked pull evaluation ([`EvaluationContext`])
//! - Output aggregation into one preview/export result
//! - Toolpath normalization into a flat machine-space path

pub mod aggregate;
pub mod config;
pub mod evaluation;
pub mod graph;
pub mod link;
pub mod mesh;
pub mod node;
pub mod nodes;
pub mod normalize;
pub mod port;
pub mod preview;
pub mod profile;
pub mod runtime;
pub mod toolpath;

pub use config::{ConfigError, EngineConfig};
pub use evaluation::{EvaluationContext, EvaluationError, NodeEvaluator, NodeOutput};
pub use graph::{ConnectionError, Graph};
pub use link::{Endpoint, Link, LinkIndex, PortKey};
pub use mesh::Mesh;
pub use node::{Node, NodeCategory, NodeDefinition, NodeId, NodeRegistry};
pub use normalize::{toolpath_to_path, NormalizeOptions, NormalizedPath};
pub use port::{Port, PortDirection, PortType, PortValue};
pub use preview::{GcodeStats, Preview, PreviewKind};
pub use profile::{MachineProfile, Origin, ProfileBase};
pub use runtime::{Engine, EvaluationResult, RunReport, RunStatus};
pub use toolpath::{Layer, Move, MoveKind, PathPoint, PointMeta, Toolpath};
