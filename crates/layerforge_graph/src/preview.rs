// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preview payloads and G-code statistics.

use crate::mesh::Mesh;
use crate::toolpath::{PathPoint, Toolpath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a preview shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    /// Layered toolpath preview
    Toolpath,
    /// Mesh-only preview
    Mesh,
    /// Flat path preview
    Path,
    /// Anything else
    #[default]
    #[serde(other)]
    Other,
}

/// Data handed to the preview renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    /// Preview kind
    #[serde(rename = "type", default)]
    pub kind: PreviewKind,
    /// Mesh shown alongside the path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Arc<Mesh>>,
    /// Structured toolpath
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolpath: Option<Arc<Toolpath>>,
    /// Flat machine path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Arc<Vec<PathPoint>>>,
}

impl Preview {
    /// Toolpath preview
    pub fn toolpath(toolpath: Arc<Toolpath>) -> Self {
        Self {
            kind: PreviewKind::Toolpath,
            toolpath: Some(toolpath),
            ..Self::default()
        }
    }

    /// Mesh preview
    pub fn mesh(mesh: Arc<Mesh>) -> Self {
        Self {
            kind: PreviewKind::Mesh,
            mesh: Some(mesh),
            ..Self::default()
        }
    }

    /// Flat path preview
    pub fn path(path: Arc<Vec<PathPoint>>) -> Self {
        Self {
            kind: PreviewKind::Path,
            path: Some(path),
            ..Self::default()
        }
    }
}

/// Summary statistics of exported G-code
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GcodeStats {
    /// Length of the G-code text in bytes
    pub length: usize,
    /// Number of lines
    pub lines: usize,
    /// Number of G0/G1 motion commands
    pub moves: usize,
    /// Number of layers reported by the exporter
    pub layers: usize,
}

impl GcodeStats {
    /// Measure G-code text; `layers` counts `;LAYER` markers
    pub fn measure(gcode: &str) -> Self {
        let mut stats = Self {
            length: gcode.len(),
            ..Self::default()
        };
        for line in gcode.lines() {
            stats.lines += 1;
            let line = line.trim_start();
            if line.starts_with("G0") || line.starts_with("G1") {
                stats.moves += 1;
            } else if line.starts_with(";LAYER") {
                stats.layers += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_gcode() {
        let gcode = "G28\n;LAYER:0\nG1 X1 Y1 E0.1\nG0 X2 Y2\n;LAYER:1\nG1 X3 Y3 E0.2\n";
        let stats = GcodeStats::measure(gcode);
        assert_eq!(stats.length, gcode.len());
        assert_eq!(stats.lines, 6);
        assert_eq!(stats.moves, 3);
        assert_eq!(stats.layers, 2);
        assert_eq!(GcodeStats::measure(""), GcodeStats::default());
    }

    #[test]
    fn test_preview_type_field() {
        let preview: Preview = serde_json::from_str(r#"{"type":"toolpath"}"#).unwrap();
        assert_eq!(preview.kind, PreviewKind::Toolpath);
        let other: Preview = serde_json::from_str(r#"{"type":"heatmap"}"#).unwrap();
        assert_eq!(other.kind, PreviewKind::Other);
    }
}
