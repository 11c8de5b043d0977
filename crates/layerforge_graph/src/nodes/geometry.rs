// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mesh input and transform nodes.

use super::{parse_data, type_mismatch, MESH_SOURCE, TRANSFORM};
use crate::evaluation::{EvaluationContext, EvaluationError, NodeOutput};
use crate::mesh::Mesh;
use crate::node::{Node, NodeCategory, NodeDefinition, NodeRegistry};
use crate::port::{Port, PortType, PortValue};
use crate::preview::Preview;
use serde::Deserialize;
use std::sync::Arc;

/// Create the geometry node registry
pub fn create_geometry_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Input Nodes
    // ========================================================================

    registry.register(
        NodeDefinition::new(MESH_SOURCE, NodeCategory::Input, evaluate_mesh_source)
            .with_description("Inline triangle mesh")
            .with_output(Port::output("mesh", PortType::Mesh))
            .with_output(Port::output("preview", PortType::Preview)),
    );

    // ========================================================================
    // Geometry Operations
    // ========================================================================

    registry.register(
        NodeDefinition::new(TRANSFORM, NodeCategory::Geometry, evaluate_transform)
            .with_description("Scale, translate and drop a mesh onto the bed")
            .with_input(Port::input("mesh", PortType::Mesh).required())
            .with_output(Port::output("mesh", PortType::Mesh)),
    );

    registry
}

fn evaluate_mesh_source(
    node: &Node,
    _ctx: &mut EvaluationContext<'_>,
) -> Result<NodeOutput, EvaluationError> {
    let mesh: Arc<Mesh> = Arc::new(parse_data(node)?);
    Ok(NodeOutput::new()
        .with("mesh", PortValue::Mesh(Arc::clone(&mesh)))
        .with("preview", PortValue::Preview(Arc::new(Preview::mesh(mesh)))))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Scale {
    Uniform(f64),
    PerAxis([f64; 3]),
}

impl Scale {
    fn factors(self) -> [f64; 3] {
        match self {
            Self::Uniform(s) => [s, s, s],
            Self::PerAxis(factors) => factors,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
struct TransformData {
    translate: [f64; 3],
    scale: Scale,
    drop_to_bed: bool,
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            translate: [0.0, 0.0, 0.0],
            scale: Scale::Uniform(1.0),
            drop_to_bed: false,
        }
    }
}

/// Applies scale, then translation, then the optional drop to the bed
fn evaluate_transform(
    node: &Node,
    ctx: &mut EvaluationContext<'_>,
) -> Result<NodeOutput, EvaluationError> {
    let transform: TransformData = parse_data(node)?;
    let input = ctx.require_input(&node.id, "mesh")?;
    let Some(mesh) = input.as_mesh() else {
        return Err(type_mismatch(node, "mesh", PortType::Mesh, &input));
    };

    let mut mesh = mesh.scaled(transform.scale.factors()).translated(transform.translate);
    if transform.drop_to_bed {
        mesh = mesh.dropped_to_bed();
    }
    Ok(NodeOutput::new().with("mesh", PortValue::Mesh(Arc::new(mesh))))
}
