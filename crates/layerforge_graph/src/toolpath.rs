// SPDX-License-Identifier: MIT OR Apache-2.0
//! Toolpath and machine path types.
//!
//! Toolpaths arrive from slicer nodes in several shapes; [`Toolpath`] accepts
//! all of them and [`crate::normalize`] flattens them into [`PathPoint`]s.

use serde::{Deserialize, Serialize};

/// Kind of a single move
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    /// Extruding move
    #[default]
    Extrude,
    /// Non-extruding positioning move
    Travel,
    /// Anything else a slicer emits
    #[serde(other)]
    Other,
}

/// Per-move or per-point metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointMeta {
    /// Feature role (`wall_outer`, `infill`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Raw slicer feature name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    /// Layer height in millimetres
    #[serde(
        default,
        rename = "layerHeight",
        alias = "layer_height",
        skip_serializing_if = "Option::is_none"
    )]
    pub layer_height: Option<f64>,
    /// Extrusion width in millimetres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Any other slicer-provided fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single move; absent coordinates inherit from the previous move
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// X coordinate
    #[serde(default)]
    pub x: Option<f64>,
    /// Y coordinate
    #[serde(default)]
    pub y: Option<f64>,
    /// Z coordinate
    #[serde(default)]
    pub z: Option<f64>,
    /// Move kind
    #[serde(default)]
    pub kind: MoveKind,
    /// Raw slicer move type (`perimeter`, `travel`, ...)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub move_type: Option<String>,
    /// Raw feature name
    #[serde(default)]
    pub feature: Option<String>,
    /// Metadata
    #[serde(default)]
    pub meta: PointMeta,
}

impl Move {
    /// Extruding move at `(x, y)`
    pub fn extrude(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Travel move to `(x, y)`
    pub fn travel(x: f64, y: f64) -> Self {
        Self {
            kind: MoveKind::Travel,
            ..Self::extrude(x, y)
        }
    }

    /// Set the raw role
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.meta.role = Some(role.into());
        self
    }
}

/// One layer of moves at height `z`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Layer height above the bed
    #[serde(default)]
    pub z: f64,
    /// Moves in print order
    #[serde(default)]
    pub moves: Vec<Move>,
}

/// Toolpath in any of the accepted shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toolpath {
    /// Already a flat point list
    Points(Vec<PathPoint>),
    /// Object wrapping a flat point list; wins over any `layers` beside it
    Wrapped {
        /// Flat points
        path: Vec<PathPoint>,
    },
    /// Layered toolpath
    Layered {
        /// Layers bottom to top
        layers: Vec<Layer>,
    },
    /// Bare move list without layers
    Moves {
        /// Moves in print order
        moves: Vec<Move>,
        /// Height of the synthetic layer
        #[serde(default)]
        z: Option<f64>,
    },
}

impl Toolpath {
    /// Layered toolpath from layers
    pub fn layered(layers: Vec<Layer>) -> Self {
        Self::Layered { layers }
    }

    /// Total number of moves (or points for flat shapes)
    pub fn move_count(&self) -> usize {
        match self {
            Self::Points(points) | Self::Wrapped { path: points } => points.len(),
            Self::Layered { layers } => layers.iter().map(|l| l.moves.len()).sum(),
            Self::Moves { moves, .. } => moves.len(),
        }
    }

    /// Number of layers
    pub fn layer_count(&self) -> usize {
        match self {
            Self::Layered { layers } => layers.len(),
            Self::Moves { .. } => 1,
            Self::Points(points) | Self::Wrapped { path: points } => {
                points.iter().map(|p| p.layer + 1).max().unwrap_or(0)
            }
        }
    }
}

/// A point of a flat machine-space path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// Machine X
    pub x: f64,
    /// Machine Y
    pub y: f64,
    /// Machine Z
    #[serde(default)]
    pub z: f64,
    /// Layer index
    #[serde(default)]
    pub layer: usize,
    /// Whether this is a travel (non-extruding) point
    #[serde(default)]
    pub travel: bool,
    /// Normalized role
    #[serde(default)]
    pub role: String,
    /// Metadata
    #[serde(default)]
    pub meta: PointMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_deserialize() {
        let layered: Toolpath = serde_json::from_str(
            r#"{"layers":[{"z":0.2,"moves":[{"x":1,"y":2,"kind":"travel"}]}]}"#,
        )
        .unwrap();
        assert_eq!(layered.move_count(), 1);
        assert!(matches!(
            &layered,
            Toolpath::Layered { layers } if layers[0].moves[0].kind == MoveKind::Travel
        ));

        let moves: Toolpath =
            serde_json::from_str(r#"{"moves":[{"x":1},{"y":2,"type":"wipe"}]}"#).unwrap();
        let Toolpath::Moves { moves, z: None } = &moves else {
            panic!("expected bare moves, got {moves:?}");
        };
        assert_eq!(moves[1].kind, MoveKind::Extrude);
        assert_eq!(moves[1].move_type.as_deref(), Some("wipe"));

        let flat: Toolpath = serde_json::from_str(r#"[{"x":1,"y":2,"z":0.2}]"#).unwrap();
        assert!(matches!(flat, Toolpath::Points(ref p) if p.len() == 1));

        let wrapped: Toolpath = serde_json::from_str(r#"{"path":[{"x":1,"y":2}]}"#).unwrap();
        assert!(matches!(wrapped, Toolpath::Wrapped { .. }));
    }

    #[test]
    fn test_kind_and_type_together() {
        let toolpath: Toolpath = serde_json::from_str(
            r#"{"layers":[{"z":0.2,"moves":[{"x":1,"kind":"extrude","type":"infill"}]}]}"#,
        )
        .unwrap();
        let Toolpath::Layered { layers } = &toolpath else {
            panic!("expected layers, got {toolpath:?}");
        };
        let mv = &layers[0].moves[0];
        assert_eq!(mv.kind, MoveKind::Extrude);
        assert_eq!(mv.move_type.as_deref(), Some("infill"));
    }

    #[test]
    fn test_path_wins_over_layers() {
        let toolpath: Toolpath =
            serde_json::from_str(r#"{"path":[{"x":1,"y":2}],"layers":[]}"#).unwrap();
        assert!(matches!(&toolpath, Toolpath::Wrapped { path } if path.len() == 1));
        assert_eq!(toolpath.move_count(), 1);
    }

    #[test]
    fn test_meta_keeps_extra_fields() {
        let meta: PointMeta =
            serde_json::from_str(r#"{"role":"perimeter","layerHeight":0.3,"speed":40}"#).unwrap();
        assert_eq!(meta.layer_height, Some(0.3));
        assert_eq!(meta.extra.get("speed").and_then(|v| v.as_f64()), Some(40.0));
    }

    #[test]
    fn test_counts() {
        let toolpath = Toolpath::layered(vec![
            Layer {
                z: 0.2,
                moves: vec![Move::extrude(0.0, 0.0), Move::travel(1.0, 1.0)],
            },
            Layer {
                z: 0.4,
                moves: vec![Move::extrude(2.0, 2.0)],
            },
        ]);
        assert_eq!(toolpath.move_count(), 3);
        assert_eq!(toolpath.layer_count(), 2);
    }
}
