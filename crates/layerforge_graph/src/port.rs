// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::mesh::Mesh;
use crate::preview::{GcodeStats, Preview};
use crate::profile::MachineProfile;
use crate::toolpath::{PathPoint, Toolpath};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Semantic type tag carried by ports and links
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Triangle mesh
    Mesh,
    /// Flat machine-space path
    Path,
    /// Layered toolpath
    Toolpath,
    /// Machine profile
    Profile,
    /// Slicing/export rules
    Rules,
    /// G-code text
    Gcode,
    /// Preview payload
    Preview,
    /// G-code statistics
    Stats,
    /// Scalar number
    Number,
    /// Boolean value
    Bool,
    /// String value
    String,
    /// Any type (for generic nodes)
    Any,
    /// Custom type
    Custom(String),
}

impl PortType {
    /// Whether outputs of this type take part in preview aggregation
    pub fn is_preview_category(&self) -> bool {
        matches!(self, Self::Mesh | Self::Path | Self::Toolpath | Self::Preview)
    }

    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if self == other {
            return true;
        }

        // A toolpath can always be flattened into a path downstream
        matches!((self, other), (Self::Toolpath, Self::Path))
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mesh => f.write_str("mesh"),
            Self::Path => f.write_str("path"),
            Self::Toolpath => f.write_str("toolpath"),
            Self::Profile => f.write_str("profile"),
            Self::Rules => f.write_str("rules"),
            Self::Gcode => f.write_str("gcode"),
            Self::Preview => f.write_str("preview"),
            Self::Stats => f.write_str("stats"),
            Self::Number => f.write_str("number"),
            Self::Bool => f.write_str("bool"),
            Self::String => f.write_str("string"),
            Self::Any => f.write_str("any"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// A port declared by a node definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique per direction within a node
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Whether this port is required (for inputs)
    pub required: bool,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            port_type,
            required: false,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            port_type,
            required: false,
        }
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Check if a link from this port into `other` is valid
    pub fn can_connect(&self, other: &Port) -> bool {
        if self.direction == other.direction {
            return false;
        }

        let (from, to) = match self.direction {
            PortDirection::Output => (self, other),
            PortDirection::Input => (other, self),
        };
        from.port_type.can_connect_to(&to.port_type)
    }
}

/// Value flowing through a port.
///
/// Heavy payloads are reference counted so that reading an upstream value
/// through [`crate::EvaluationContext::get_input`] never deep-copies it.
#[derive(Debug, Clone)]
pub enum PortValue {
    /// Triangle mesh
    Mesh(Arc<Mesh>),
    /// Flat machine-space path
    Path(Arc<Vec<PathPoint>>),
    /// Layered toolpath
    Toolpath(Arc<Toolpath>),
    /// Machine profile
    Profile(Arc<MachineProfile>),
    /// Rule set, kept opaque
    Rules(serde_json::Value),
    /// G-code text
    Gcode(Arc<str>),
    /// Preview payload
    Preview(Arc<Preview>),
    /// G-code statistics
    Stats(GcodeStats),
    /// Number
    Number(f64),
    /// Boolean
    Bool(bool),
    /// String
    String(String),
    /// Untyped JSON value
    Json(serde_json::Value),
}

impl PortValue {
    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Mesh(_) => PortType::Mesh,
            Self::Path(_) => PortType::Path,
            Self::Toolpath(_) => PortType::Toolpath,
            Self::Profile(_) => PortType::Profile,
            Self::Rules(_) => PortType::Rules,
            Self::Gcode(_) => PortType::Gcode,
            Self::Preview(_) => PortType::Preview,
            Self::Stats(_) => PortType::Stats,
            Self::Number(_) => PortType::Number,
            Self::Bool(_) => PortType::Bool,
            Self::String(_) => PortType::String,
            Self::Json(_) => PortType::Any,
        }
    }

    /// Borrow the mesh, if this is a mesh value
    pub fn as_mesh(&self) -> Option<&Arc<Mesh>> {
        match self {
            Self::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Borrow the path, if this is a path value
    pub fn as_path(&self) -> Option<&Arc<Vec<PathPoint>>> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }

    /// Borrow the toolpath, if this is a toolpath value
    pub fn as_toolpath(&self) -> Option<&Arc<Toolpath>> {
        match self {
            Self::Toolpath(toolpath) => Some(toolpath),
            _ => None,
        }
    }

    /// Borrow the profile, if this is a profile value
    pub fn as_profile(&self) -> Option<&Arc<MachineProfile>> {
        match self {
            Self::Profile(profile) => Some(profile),
            _ => None,
        }
    }

    /// Borrow the preview, if this is a preview value
    pub fn as_preview(&self) -> Option<&Arc<Preview>> {
        match self {
            Self::Preview(preview) => Some(preview),
            _ => None,
        }
    }

    /// Borrow the G-code text, if this is a G-code value
    pub fn as_gcode(&self) -> Option<&str> {
        match self {
            Self::Gcode(text) => Some(text),
            _ => None,
        }
    }

    /// Numeric view of scalar values
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Json(value) => value.as_f64(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_compatibility() {
        assert!(PortType::Mesh.can_connect_to(&PortType::Mesh));
        assert!(PortType::Toolpath.can_connect_to(&PortType::Path));
        assert!(!PortType::Path.can_connect_to(&PortType::Toolpath));
        assert!(PortType::Gcode.can_connect_to(&PortType::Any));
        assert!(!PortType::Gcode.can_connect_to(&PortType::Mesh));
    }

    #[test]
    fn test_port_direction_check() {
        let out = Port::output("toolpath", PortType::Toolpath);
        let input = Port::input("path", PortType::Path);
        assert!(out.can_connect(&input));
        assert!(input.can_connect(&out));
        assert!(!out.can_connect(&Port::output("other", PortType::Path)));
    }

    #[test]
    fn test_value_type_tags() {
        assert_eq!(PortValue::Gcode(Arc::from("G28")).port_type(), PortType::Gcode);
        assert_eq!(PortValue::Number(1.5).as_number(), Some(1.5));
        assert_eq!(PortType::Custom("slices".into()).to_string(), "slices");
    }
}
