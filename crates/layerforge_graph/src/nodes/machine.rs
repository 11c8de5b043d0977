// SPDX-License-Identifier: MIT OR Apache-2.0
//! Machine setup nodes.

use super::PRINTER;
use crate::evaluation::{EvaluationContext, EvaluationError, NodeOutput};
use crate::node::{Node, NodeCategory, NodeDefinition, NodeRegistry};
use crate::port::{Port, PortType, PortValue};
use crate::profile::MachineProfile;
use std::sync::Arc;

/// Create the machine node registry
pub fn create_machine_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(
        NodeDefinition::new(PRINTER, NodeCategory::Machine, evaluate_printer)
            .with_description("Printer bed, origin and nozzle description")
            .with_output(Port::output("profile", PortType::Profile)),
    );

    registry
}

/// Invalid data falls back to the run's profile, matching how the engine
/// resolves the effective profile.
fn evaluate_printer(
    node: &Node,
    ctx: &mut EvaluationContext<'_>,
) -> Result<NodeOutput, EvaluationError> {
    let profile = match MachineProfile::from_data(&node.data) {
        Ok(profile) => Arc::new(profile),
        Err(err) => {
            tracing::warn!(node = %node.id, "Invalid printer data, using run profile: {}", err);
            Arc::clone(ctx.profile())
        }
    };
    Ok(NodeOutput::new().with("profile", PortValue::Profile(profile)))
}
