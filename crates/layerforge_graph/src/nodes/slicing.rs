// SPDX-License-Identifier: MIT OR Apache-2.0
//! Toolpath and G-code source nodes.
//!
//! These stand in for external slicers: they publish a toolpath or G-code
//! held in their configuration data through the same ports a slicer would.

use super::{parse_data, type_mismatch, GCODE_SOURCE, TOOLPATH_SOURCE};
use crate::evaluation::{EvaluationContext, EvaluationError, NodeOutput};
use crate::node::{Node, NodeCategory, NodeDefinition, NodeRegistry};
use crate::port::{Port, PortType, PortValue};
use crate::preview::Preview;
use crate::toolpath::Toolpath;
use serde::Deserialize;
use std::sync::Arc;

/// Create the slicing node registry
pub fn create_slicing_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(
        NodeDefinition::new(TOOLPATH_SOURCE, NodeCategory::Slicing, evaluate_toolpath_source)
            .with_description("Toolpath from configuration data, with a toolpath preview")
            .with_input(Port::input("mesh", PortType::Mesh))
            .with_output(Port::output("toolpath", PortType::Toolpath))
            .with_output(Port::output("preview", PortType::Preview)),
    );

    registry.register(
        NodeDefinition::new(GCODE_SOURCE, NodeCategory::Slicing, evaluate_gcode_source)
            .with_description("G-code text from configuration data")
            .with_input(Port::input("toolpath", PortType::Toolpath))
            .with_output(Port::output("gcode", PortType::Gcode))
            .with_output(Port::output("toolpath", PortType::Toolpath)),
    );

    registry
}

/// A connected mesh is attached to the preview
fn evaluate_toolpath_source(
    node: &Node,
    ctx: &mut EvaluationContext<'_>,
) -> Result<NodeOutput, EvaluationError> {
    let toolpath: Arc<Toolpath> = Arc::new(parse_data(node)?);

    let mut preview = Preview::toolpath(Arc::clone(&toolpath));
    if let Some(input) = ctx.get_input(&node.id, "mesh")? {
        let Some(mesh) = input.as_mesh() else {
            return Err(type_mismatch(node, "mesh", PortType::Mesh, &input));
        };
        preview.mesh = Some(Arc::clone(mesh));
    }

    tracing::debug!(node = %node.id, moves = toolpath.move_count(), "toolpath source");
    Ok(NodeOutput::new()
        .with("toolpath", PortValue::Toolpath(toolpath))
        .with("preview", PortValue::Preview(Arc::new(preview))))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GcodeData {
    gcode: String,
    header: Option<String>,
}

/// Header comes from the node data, else the `gcode_header` parameter;
/// a connected toolpath is passed through unchanged.
fn evaluate_gcode_source(
    node: &Node,
    ctx: &mut EvaluationContext<'_>,
) -> Result<NodeOutput, EvaluationError> {
    let data: GcodeData = parse_data(node)?;
    let header = data
        .header
        .as_deref()
        .or_else(|| ctx.param("gcode_header").and_then(serde_json::Value::as_str));

    let gcode: Arc<str> = match header {
        Some(header) if !header.is_empty() => Arc::from(format!("{header}\n{}", data.gcode)),
        _ => Arc::from(data.gcode),
    };
    let mut output = NodeOutput::new().with("gcode", PortValue::Gcode(gcode));

    if let Some(input) = ctx.get_input(&node.id, "toolpath")? {
        if input.as_toolpath().is_none() {
            return Err(type_mismatch(node, "toolpath", PortType::Toolpath, &input));
        }
        output.set("toolpath", input);
    }
    Ok(output)
}
