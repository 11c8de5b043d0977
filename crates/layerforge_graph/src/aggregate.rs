// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reduction of scattered node outputs into one preview/export result.
//!
//! A graph may hold several producers of the same category (a raw path
//! generator feeding a slicer feeding a post-processor). Outputs are turned
//! into an ordered list of [`Candidate`]s and folded by [`OutputReducer`]:
//! - mesh and toolpath: last writer wins
//! - path: last writer wins, unless an Export node exists
//! - preview: toolpath preview over generic preview; a mesh preview's mesh
//!   rides along on whichever preview is chosen

use crate::evaluation::{EvaluationContext, NodeOutput};
use crate::mesh::Mesh;
use crate::normalize::{toolpath_to_path, NormalizeOptions};
use crate::port::{Port, PortType, PortValue};
use crate::preview::{Preview, PreviewKind};
use crate::toolpath::{PathPoint, Toolpath};
use std::sync::Arc;

/// One value offered to the reducer
#[derive(Debug, Clone)]
pub enum Candidate {
    /// `mesh`-typed output
    Mesh(Arc<Mesh>),
    /// `path`-typed output
    Path(Arc<Vec<PathPoint>>),
    /// `toolpath`-typed output
    Toolpath(Arc<Toolpath>),
    /// `preview`-typed output, used as fallback
    Preview(Arc<Preview>),
    /// Result `preview` whose kind is toolpath
    ToolpathPreview(Arc<Preview>),
    /// Result `preview` whose kind is mesh
    MeshPreview(Arc<Preview>),
}

impl Candidate {
    /// Candidate for a value read from a declared output port.
    ///
    /// Values whose shape does not match the declared type are ignored.
    pub fn from_port(port_type: &PortType, value: &PortValue) -> Option<Self> {
        match (port_type, value) {
            (PortType::Mesh, PortValue::Mesh(mesh)) => Some(Self::Mesh(Arc::clone(mesh))),
            (PortType::Path, PortValue::Path(path)) => Some(Self::Path(Arc::clone(path))),
            (PortType::Toolpath, PortValue::Toolpath(toolpath)) => {
                Some(Self::Toolpath(Arc::clone(toolpath)))
            }
            (PortType::Preview, PortValue::Preview(preview)) => {
                Some(Self::Preview(Arc::clone(preview)))
            }
            _ => None,
        }
    }

    /// Candidate for a result's `preview` sub-value, keyed on its kind
    pub fn from_result_preview(preview: &Arc<Preview>) -> Option<Self> {
        match preview.kind {
            PreviewKind::Toolpath => Some(Self::ToolpathPreview(Arc::clone(preview))),
            PreviewKind::Mesh => Some(Self::MeshPreview(Arc::clone(preview))),
            PreviewKind::Path | PreviewKind::Other => None,
        }
    }
}

/// Reduced values before toolpath normalization
#[derive(Debug, Clone, Default)]
pub struct Reduced {
    /// Final mesh
    pub mesh: Option<Arc<Mesh>>,
    /// Final flat path
    pub path: Option<Arc<Vec<PathPoint>>>,
    /// Toolpath to normalize, from an output or the toolpath preview
    pub toolpath: Option<Arc<Toolpath>>,
    /// Final preview
    pub preview: Option<Arc<Preview>>,
}

/// Explicit last-writer-wins reducer over ordered candidates
#[derive(Debug, Clone, Default)]
pub struct OutputReducer {
    has_export: bool,
    mesh: Option<Arc<Mesh>>,
    path: Option<Arc<Vec<PathPoint>>>,
    toolpath: Option<Arc<Toolpath>>,
    fallback_preview: Option<Arc<Preview>>,
    toolpath_preview: Option<Arc<Preview>>,
    mesh_preview: Option<Arc<Preview>>,
}

impl OutputReducer {
    /// Create a reducer; `has_export` suppresses path overrides
    pub fn new(has_export: bool) -> Self {
        Self {
            has_export,
            ..Self::default()
        }
    }

    /// Start from values already produced by the main pass
    pub fn seeded(mut self, mesh: Option<Arc<Mesh>>, path: Option<Arc<Vec<PathPoint>>>) -> Self {
        self.mesh = mesh;
        self.path = path;
        self
    }

    /// Offer one candidate
    pub fn push(&mut self, candidate: Candidate) {
        match candidate {
            Candidate::Mesh(mesh) => self.mesh = Some(mesh),
            Candidate::Path(path) => {
                if !self.has_export {
                    self.path = Some(path);
                }
            }
            Candidate::Toolpath(toolpath) => self.toolpath = Some(toolpath),
            Candidate::Preview(preview) => self.fallback_preview = Some(preview),
            Candidate::ToolpathPreview(preview) => self.toolpath_preview = Some(preview),
            Candidate::MeshPreview(preview) => self.mesh_preview = Some(preview),
        }
    }

    /// Offer every candidate in order
    pub fn extend(&mut self, candidates: impl IntoIterator<Item = Candidate>) {
        for candidate in candidates {
            self.push(candidate);
        }
    }

    /// Current mesh
    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh.as_ref()
    }

    /// Current flat path
    pub fn path(&self) -> Option<&Arc<Vec<PathPoint>>> {
        self.path.as_ref()
    }

    /// Resolve precedence and produce the reduced values
    pub fn finish(self) -> Reduced {
        let toolpath = self
            .toolpath
            .or_else(|| self.toolpath_preview.as_ref().and_then(|p| p.toolpath.clone()));

        let chosen = self.toolpath_preview.or(self.fallback_preview);
        let preview = match (chosen, self.mesh_preview) {
            (Some(chosen), Some(mesh_preview)) => match &mesh_preview.mesh {
                Some(mesh) => {
                    let mut merged = Preview::clone(&chosen);
                    merged.mesh = Some(Arc::clone(mesh));
                    Some(Arc::new(merged))
                }
                None => Some(chosen),
            },
            (chosen, mesh_preview) => chosen.or(mesh_preview),
        };

        Reduced {
            mesh: self.mesh,
            path: self.path,
            toolpath,
            preview,
        }
    }
}

/// Aggregated preview/export outputs of a run
#[derive(Debug, Clone, Default)]
pub struct PreviewOutputs {
    /// Final mesh
    pub mesh: Option<Arc<Mesh>>,
    /// Machine-space path (normalized toolpath, else the captured flat path)
    pub path: Arc<Vec<PathPoint>>,
    /// Toolpath that was normalized, if any
    pub toolpath: Option<Arc<Toolpath>>,
    /// Final preview
    pub preview: Option<Arc<Preview>>,
    /// Decimation warning from normalization
    pub preview_warning: String,
}

/// Candidates from one node's memoized output, in declared port order
pub fn node_candidates(declared: &[Port], output: &NodeOutput) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = declared
        .iter()
        .filter_map(|port| {
            output
                .get(&port.name)
                .and_then(|value| Candidate::from_port(&port.port_type, value))
        })
        .collect();
    if let Some(preview) = output.preview() {
        candidates.extend(Candidate::from_result_preview(preview));
    }
    candidates
}

/// Candidates from every memoized node, in graph order
pub fn gather_candidates(ctx: &EvaluationContext<'_>) -> Vec<Candidate> {
    let registry = ctx.registry();
    ctx.graph()
        .nodes()
        .filter_map(|node| {
            let output = ctx.cached(&node.id)?;
            let definition = registry.get(&node.node_type)?;
            if definition.outputs.is_empty() {
                return None;
            }
            Some(node_candidates(&definition.outputs, output))
        })
        .flatten()
        .collect()
}

/// Reduce every memoized output and normalize the winning toolpath
pub fn collect_preview_outputs(
    ctx: &EvaluationContext<'_>,
    reducer: OutputReducer,
    options: &NormalizeOptions<'_>,
) -> PreviewOutputs {
    let mut reducer = reducer;
    reducer.extend(gather_candidates(ctx));
    let reduced = reducer.finish();

    let (path, preview_warning) = match reduced.toolpath.as_deref() {
        Some(toolpath) => {
            let normalized = toolpath_to_path(Some(toolpath), options);
            (Arc::new(normalized.path), normalized.warning)
        }
        None => (reduced.path.unwrap_or_default(), String::new()),
    };

    PreviewOutputs {
        mesh: reduced.mesh,
        path,
        toolpath: reduced.toolpath,
        preview: reduced.preview,
        preview_warning,
    }
}
