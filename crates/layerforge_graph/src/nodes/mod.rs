// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node library.
//!
//! Slicing proper is done by external slicer nodes registered by the host;
//! the nodes here cover machine setup, inline geometry, toolpath and G-code
//! sources, and export.

pub mod geometry;
pub mod machine;
pub mod output;
pub mod slicing;

use crate::evaluation::EvaluationError;
use crate::node::{Node, NodeRegistry};
use crate::port::{PortType, PortValue};
use serde::de::DeserializeOwned;

/// Machine profile node
pub const PRINTER: &str = "Printer";
/// Inline mesh node
pub const MESH_SOURCE: &str = "Mesh Source";
/// Mesh transform node
pub const TRANSFORM: &str = "Transform";
/// Inline toolpath node
pub const TOOLPATH_SOURCE: &str = "Toolpath Source";
/// Inline G-code node
pub const GCODE_SOURCE: &str = "G-code Source";
/// G-code export node; its presence switches a run into export mode
pub const EXPORT: &str = "Export";
/// G-code display node
pub const GCODE_OUTPUT: &str = "G-code Output";

/// Create a registry holding every built-in node type
pub fn create_default_registry() -> NodeRegistry {
    let mut registry = machine::create_machine_registry();
    registry.merge(geometry::create_geometry_registry());
    registry.merge(slicing::create_slicing_registry());
    registry.merge(output::create_output_registry());
    registry
}

/// Deserialize a node's configuration data; `null` reads as an empty object
pub(crate) fn parse_data<T: DeserializeOwned>(node: &Node) -> Result<T, EvaluationError> {
    let data = match &node.data {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        data => data.clone(),
    };
    serde_json::from_value(data).map_err(|err| EvaluationError::node_failed(&node.id, err))
}

/// Error for an input that arrived with the wrong shape
pub(crate) fn type_mismatch(
    node: &Node,
    port: &str,
    expected: PortType,
    value: &PortValue,
) -> EvaluationError {
    EvaluationError::node_failed(
        &node.id,
        format!("input '{port}' expected {expected}, got {}", value.port_type()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeCategory;

    #[test]
    fn test_default_registry() {
        let registry = create_default_registry();
        let types = [
            PRINTER,
            MESH_SOURCE,
            TRANSFORM,
            TOOLPATH_SOURCE,
            GCODE_SOURCE,
            EXPORT,
            GCODE_OUTPUT,
        ];
        for id in types {
            assert!(registry.contains(id), "missing {id}");
        }
        assert_eq!(registry.len(), 7);
        assert_eq!(registry.in_category(NodeCategory::Output).count(), 2);
    }

    #[test]
    fn test_preview_producers() {
        let registry = create_default_registry();
        let producers: Vec<&str> = registry
            .definitions()
            .filter(|d| d.produces_preview())
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(producers, vec![MESH_SOURCE, TRANSFORM, TOOLPATH_SOURCE, GCODE_SOURCE, EXPORT]);
    }
}
