// SPDX-License-Identifier: MIT OR Apache-2.0
//! Machine profile and model-to-machine coordinate mapping.

use serde::{Deserialize, Serialize};

/// Where the machine's coordinate origin sits on the bed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Front-left corner (most cartesian printers)
    #[default]
    Corner,
    /// Bed centre (delta printers)
    Center,
}

/// Printer description used for coordinate mapping and export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineProfile {
    /// Profile name
    pub name: String,
    /// Bed size along X in millimetres
    pub bed_width: f64,
    /// Bed size along Y in millimetres
    pub bed_depth: f64,
    /// Maximum build height in millimetres
    pub max_height: f64,
    /// Coordinate origin
    pub origin: Origin,
    /// Extra offset applied after origin mapping
    pub offset: [f64; 3],
    /// Nozzle diameter in millimetres
    pub nozzle_diameter: f64,
    /// Default layer height in millimetres
    pub layer_height: f64,
    /// Filament diameter in millimetres
    pub filament_diameter: f64,
}

impl Default for MachineProfile {
    fn default() -> Self {
        Self {
            name: "Generic 220".to_string(),
            bed_width: 220.0,
            bed_depth: 220.0,
            max_height: 250.0,
            origin: Origin::Corner,
            offset: [0.0, 0.0, 0.0],
            nozzle_diameter: 0.4,
            layer_height: 0.2,
            filament_diameter: 1.75,
        }
    }
}

impl MachineProfile {
    /// Parse a profile from node data; missing fields take defaults
    pub fn from_data(data: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if data.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(data.clone())
    }

    /// Map a model-space point (centred on the bed) into machine coordinates
    pub fn to_machine(&self, x: f64, y: f64, z: f64) -> [f64; 3] {
        let (cx, cy) = match self.origin {
            Origin::Corner => (self.bed_width / 2.0, self.bed_depth / 2.0),
            Origin::Center => (0.0, 0.0),
        };
        [
            x + cx + self.offset[0],
            y + cy + self.offset[1],
            z + self.offset[2],
        ]
    }
}

/// Base values derived from a profile once per run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileBase {
    /// Default extrusion width
    pub line_width: f64,
    /// Default layer height
    pub layer_height: f64,
    /// Bed centre in machine coordinates
    pub bed_center: [f64; 2],
}

impl ProfileBase {
    /// Derive base values from a profile
    pub fn derive(profile: &MachineProfile) -> Self {
        let [cx, cy, _] = profile.to_machine(0.0, 0.0, 0.0);
        Self {
            line_width: profile.nozzle_diameter * 1.125,
            layer_height: profile.layer_height,
            bed_center: [cx, cy],
        }
    }
}
