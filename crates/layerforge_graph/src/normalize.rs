// SPDX-License-Identifier: MIT OR Apache-2.0
//! Toolpath normalization into a flat machine-space path.
//!
//! Turns any accepted [`Toolpath`] shape into an ordered list of
//! [`PathPoint`]s for preview and export:
//! - decimates deterministically above a move cap
//! - fills sparse coordinates from the previous kept point
//! - maps model coordinates through the machine profile
//! - classifies each point with a normalized role
//!
//! Normalization never fails; malformed input degrades to an empty path.

use crate::profile::MachineProfile;
use crate::toolpath::{Move, MoveKind, PathPoint, PointMeta, Toolpath};

/// Layer height assumed when a toolpath has a single layer
pub const DEFAULT_LAYER_HEIGHT: f64 = 0.2;

/// Default cap on previewed moves
pub const DEFAULT_MAX_MOVES: usize = 200_000;

/// Options for [`toolpath_to_path`]
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions<'p> {
    /// Keep at most about this many moves; `0` disables decimation
    pub max_moves: usize,
    /// Profile used for coordinate mapping
    pub profile: &'p MachineProfile,
}

impl<'p> NormalizeOptions<'p> {
    /// Options with the default move cap
    pub fn new(profile: &'p MachineProfile) -> Self {
        Self {
            max_moves: DEFAULT_MAX_MOVES,
            profile,
        }
    }

    /// Override the move cap
    pub fn with_max_moves(mut self, max_moves: usize) -> Self {
        self.max_moves = max_moves;
        self
    }
}

/// Normalized path plus a human-readable decimation warning
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPath {
    /// Flat machine-space points
    pub path: Vec<PathPoint>,
    /// Empty unless moves were dropped
    pub warning: String,
}

/// Flatten a toolpath into machine-space points
pub fn toolpath_to_path(
    toolpath: Option<&Toolpath>,
    options: &NormalizeOptions<'_>,
) -> NormalizedPath {
    let Some(toolpath) = toolpath else {
        return NormalizedPath::default();
    };

    let layers: Vec<(Option<f64>, &[Move])> = match toolpath {
        Toolpath::Points(points) | Toolpath::Wrapped { path: points } => {
            return NormalizedPath {
                path: points.iter().cloned().map(normalize_point).collect(),
                warning: String::new(),
            };
        }
        Toolpath::Layered { layers } => layers
            .iter()
            .map(|l| (Some(l.z), l.moves.as_slice()))
            .collect(),
        Toolpath::Moves { moves, z } => vec![(*z, moves.as_slice())],
    };

    let total: usize = layers.iter().map(|(_, moves)| moves.len()).sum();
    if total == 0 {
        return NormalizedPath::default();
    }

    let step = if options.max_moves > 0 && total > options.max_moves {
        total.div_ceil(options.max_moves)
    } else {
        1
    };
    let warning = if step > 1 {
        tracing::debug!(moves = total, step, "decimating toolpath preview");
        format!(
            "Preview decimated: {} moves exceed the {} move limit; showing every {} move.",
            format_count(total),
            format_count(options.max_moves),
            ordinal(step)
        )
    } else {
        String::new()
    };

    let heights = layer_heights(&layers);
    let mut path = Vec::with_capacity(total.div_ceil(step));
    let mut previous: Option<[f64; 3]> = None;
    let mut index = 0usize;

    for (layer_index, ((layer_z, moves), height)) in layers.iter().zip(heights).enumerate() {
        for mv in moves.iter() {
            index += 1;
            // Every step-th move, plus the last one so the path ends where the print ends
            if index % step != 0 && index != total {
                continue;
            }

            let x = mv.x.or(previous.map(|p| p[0])).unwrap_or(0.0);
            let y = mv.y.or(previous.map(|p| p[1])).unwrap_or(0.0);
            let z = mv.z.or(*layer_z).or(previous.map(|p| p[2])).unwrap_or(0.0);
            previous = Some([x, y, z]);

            let [mx, my, mz] = options.profile.to_machine(x, y, z);
            let role = move_role(mv);
            let meta = PointMeta {
                role: Some(role.clone()),
                layer_height: mv.meta.layer_height.or(Some(height)),
                ..mv.meta.clone()
            };

            path.push(PathPoint {
                x: mx,
                y: my,
                z: mz,
                layer: layer_index,
                travel: is_travel(mv),
                role,
                meta,
            });
        }
    }

    NormalizedPath { path, warning }
}

/// Normalize a raw role/feature name.
///
/// Known slicer vocabulary maps onto the preview roles; anything else is
/// lower-cased with whitespace and hyphen runs folded to `_`.
pub fn normalize_role(raw: &str) -> String {
    let mut folded = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = !folded.is_empty();
        } else {
            if pending_sep {
                folded.push('_');
                pending_sep = false;
            }
            folded.extend(ch.to_lowercase());
        }
    }

    let role = match folded.as_str() {
        "perimeter" | "outer_perimeter" | "external_perimeter" | "outer_wall" | "wall" => {
            "wall_outer"
        }
        "inner_perimeter" | "internal_perimeter" | "inner_wall" => "wall_inner",
        "solid_infill" | "top_solid_infill" | "top_surface" | "ironing" => "top",
        "bottom_solid_infill" | "bottom_surface" => "bottom",
        "sparse_infill" | "internal_infill" | "fill" => "infill",
        "support_material" | "support_interface" | "support_material_interface" => "support",
        "bridge_infill" | "overhang_perimeter" => "bridge",
        "skirt" | "brim" | "skirt_brim" | "move" => "travel",
        _ => return folded,
    };
    role.to_string()
}

/// Format an integer with thousands separators
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// English ordinal (`1st`, `2nd`, `3rd`, `4th`, `11th`, ...)
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

fn raw_role(mv: &Move) -> Option<&str> {
    mv.meta
        .role
        .as_deref()
        .or(mv.meta.feature.as_deref())
        .or(mv.feature.as_deref())
        .or(mv.move_type.as_deref())
        .filter(|r| !r.trim().is_empty())
}

fn move_role(mv: &Move) -> String {
    match raw_role(mv) {
        Some(raw) => normalize_role(raw),
        None if mv.kind == MoveKind::Travel => "travel".to_string(),
        None => "other".to_string(),
    }
}

fn names_travel(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("travel"))
}

fn is_travel(mv: &Move) -> bool {
    mv.kind == MoveKind::Travel
        || names_travel(mv.feature.as_deref())
        || names_travel(mv.meta.feature.as_deref())
        || names_travel(mv.meta.role.as_deref())
        || names_travel(mv.move_type.as_deref())
}

fn normalize_point(mut point: PathPoint) -> PathPoint {
    let raw = point
        .meta
        .role
        .clone()
        .or_else(|| Some(point.role.clone()).filter(|r| !r.trim().is_empty()))
        .or_else(|| point.meta.feature.clone());

    let role = match raw {
        Some(raw) => normalize_role(&raw),
        None if point.travel => "travel".to_string(),
        None => "other".to_string(),
    };
    point.meta.role = Some(role.clone());
    point.role = role;
    point
}

/// Height per layer: gap to the previous layer, or to the next one for the first
fn layer_heights(layers: &[(Option<f64>, &[Move])]) -> Vec<f64> {
    if layers.len() < 2 {
        return vec![DEFAULT_LAYER_HEIGHT; layers.len()];
    }
    let zs: Vec<f64> = layers.iter().map(|(z, _)| z.unwrap_or(0.0)).collect();
    (0..zs.len())
        .map(|i| if i == 0 { zs[1] - zs[0] } else { zs[i] - zs[i - 1] })
        .collect()
}
