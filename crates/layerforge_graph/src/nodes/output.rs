// SPDX-License-Identifier: MIT OR Apache-2.0
//! Export and display nodes.

use super::{type_mismatch, EXPORT, GCODE_OUTPUT};
use crate::evaluation::{EvaluationContext, EvaluationError, NodeOutput};
use crate::node::{Node, NodeCategory, NodeDefinition, NodeRegistry};
use crate::normalize::{toolpath_to_path, NormalizeOptions};
use crate::port::{Port, PortType, PortValue};
use crate::preview::GcodeStats;
use std::sync::Arc;

/// Create the output node registry
pub fn create_output_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(
        NodeDefinition::new(EXPORT, NodeCategory::Output, evaluate_export)
            .with_description("Final G-code, statistics and machine path")
            .with_input(Port::input("profile", PortType::Profile).required())
            .with_input(Port::input("gcode", PortType::Gcode).required())
            .with_input(Port::input("toolpath", PortType::Toolpath))
            .with_input(Port::input("mesh", PortType::Mesh))
            .with_output(Port::output("gcode", PortType::Gcode))
            .with_output(Port::output("stats", PortType::Stats))
            .with_output(Port::output("path", PortType::Path))
            .with_output(Port::output("mesh", PortType::Mesh)),
    );

    registry.register(
        NodeDefinition::new(GCODE_OUTPUT, NodeCategory::Output, evaluate_gcode_output)
            .with_description("Shows exported G-code")
            .with_input(Port::input("gcode", PortType::Gcode).required())
            .with_output(Port::output("lines", PortType::Number)),
    );

    registry
}

/// The export path is never decimated; `stats.layers` falls back to the
/// toolpath's layer count when the G-code carries no layer markers.
fn evaluate_export(
    node: &Node,
    ctx: &mut EvaluationContext<'_>,
) -> Result<NodeOutput, EvaluationError> {
    let input = ctx.require_input(&node.id, "profile")?;
    let Some(profile) = input.as_profile().cloned() else {
        return Err(type_mismatch(node, "profile", PortType::Profile, &input));
    };
    let gcode = match ctx.require_input(&node.id, "gcode")? {
        PortValue::Gcode(gcode) => gcode,
        other => return Err(type_mismatch(node, "gcode", PortType::Gcode, &other)),
    };

    let mut stats = GcodeStats::measure(&gcode);
    let mut output = NodeOutput::new();

    if let Some(input) = ctx.get_input(&node.id, "toolpath")? {
        let Some(toolpath) = input.as_toolpath() else {
            return Err(type_mismatch(node, "toolpath", PortType::Toolpath, &input));
        };
        if stats.layers == 0 {
            stats.layers = toolpath.layer_count();
        }
        let options = NormalizeOptions::new(&profile).with_max_moves(0);
        let normalized = toolpath_to_path(Some(toolpath), &options);
        output.set("path", PortValue::Path(Arc::new(normalized.path)));
    }

    if let Some(input) = ctx.get_input(&node.id, "mesh")? {
        if input.as_mesh().is_none() {
            return Err(type_mismatch(node, "mesh", PortType::Mesh, &input));
        }
        output.set("mesh", input);
    }

    tracing::info!(
        node = %node.id,
        profile = %profile.name,
        bytes = stats.length,
        moves = stats.moves,
        "G-code exported"
    );
    output.set("gcode", PortValue::Gcode(gcode));
    output.set("stats", PortValue::Stats(stats));
    Ok(output)
}

fn evaluate_gcode_output(
    node: &Node,
    ctx: &mut EvaluationContext<'_>,
) -> Result<NodeOutput, EvaluationError> {
    let input = ctx.require_input(&node.id, "gcode")?;
    let Some(gcode) = input.as_gcode() else {
        return Err(type_mismatch(node, "gcode", PortType::Gcode, &input));
    };
    let lines = gcode.lines().count();
    tracing::info!(node = %node.id, lines, "G-code output");
    Ok(NodeOutput::new().with("lines", PortValue::Number(lines as f64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Params;
    use crate::graph::Graph;
    use crate::link::{Endpoint, Link};
    use crate::nodes::{create_default_registry, GCODE_SOURCE, PRINTER, TOOLPATH_SOURCE};
    use crate::node::NodeId;

    fn link(from: &str, from_port: &str, to: &str, to_port: &str, port_type: PortType) -> Link {
        Link::new(
            Endpoint::new(from, from_port, port_type.clone()),
            Endpoint::new(to, to_port, port_type),
        )
    }

    fn export_graph(gcode: &str, with_toolpath: bool) -> Graph {
        let mut graph = Graph::new("export");
        let printer = serde_json::json!({"origin": "center"});
        graph.add_node(Node::new("printer", PRINTER).with_data(printer));
        let slicer = serde_json::json!({"gcode": gcode});
        graph.add_node(Node::new("slicer", GCODE_SOURCE).with_data(slicer));
        graph.add_node(Node::new("export", EXPORT));
        graph.add_node(Node::new("show", GCODE_OUTPUT));
        graph.connect(link("printer", "profile", "export", "profile", PortType::Profile));
        graph.connect(link("slicer", "gcode", "export", "gcode", PortType::Gcode));
        graph.connect(link("export", "gcode", "show", "gcode", PortType::Gcode));
        if with_toolpath {
            let layers: Vec<serde_json::Value> = (0..3)
                .map(|i| {
                    serde_json::json!({"z": 0.2 * f64::from(i + 1), "moves": [{"x": 1, "y": 2}]})
                })
                .collect();
            let toolpath = serde_json::json!({"layers": layers});
            graph.add_node(Node::new("tp", TOOLPATH_SOURCE).with_data(toolpath));
            graph.connect(link("tp", "toolpath", "export", "toolpath", PortType::Toolpath));
        }
        graph
    }

    #[test]
    fn test_export_stats_and_path() {
        let registry = create_default_registry();
        let graph = export_graph("G28\nG1 X1 Y2 E0.1\n", true);
        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());

        let output = ctx.eval_node(&NodeId::new("export")).unwrap().unwrap();
        let Some(PortValue::Stats(stats)) = output.get("stats") else {
            panic!("missing stats");
        };
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.moves, 1);
        assert_eq!(stats.layers, 3);

        let path = output.get("path").and_then(PortValue::as_path).unwrap();
        assert_eq!(path.len(), 3);
        // centre-origin profile from the Printer node, not the run profile
        assert_eq!((path[0].x, path[0].y), (1.0, 2.0));
    }

    #[test]
    fn test_export_without_toolpath_has_no_path() {
        let registry = create_default_registry();
        let graph = export_graph(";LAYER:0\nG1 X1\n", false);
        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());

        let output = ctx.eval_node(&NodeId::new("export")).unwrap().unwrap();
        assert!(output.get("path").is_none());
        assert!(matches!(output.get("stats"), Some(PortValue::Stats(s)) if s.layers == 1));
    }

    #[test]
    fn test_export_requires_gcode() {
        let registry = create_default_registry();
        let mut graph = export_graph("", false);
        graph.disconnect(&NodeId::new("export"), "gcode");
        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());

        let err = ctx.eval_node(&NodeId::new("export")).unwrap_err();
        assert_eq!(err.to_string(), "Node export is missing required input 'gcode'");
    }

    #[test]
    fn test_gcode_output_counts_lines() {
        let registry = create_default_registry();
        let graph = export_graph("G28\nG1 X1\nM104 S0", false);
        let params = Params::new();
        let mut ctx = EvaluationContext::new(&graph, &registry, &params, Arc::default());

        let output = ctx.eval_node(&NodeId::new("show")).unwrap().unwrap();
        assert!(matches!(output.get("lines"), Some(PortValue::Number(n)) if *n == 3.0));
        assert!(ctx.cached(&NodeId::new("export")).is_some());
    }
}
