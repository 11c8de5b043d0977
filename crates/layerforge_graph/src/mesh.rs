// SPDX-License-Identifier: MIT OR Apache-2.0
//! Triangle mesh payload carried between nodes.

use serde::{Deserialize, Serialize};

/// Indexed triangle mesh in model space (millimetres)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Vertex positions
    pub vertices: Vec<[f64; 3]>,
    /// Triangles as vertex index triples
    #[serde(default)]
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Whether the mesh has no geometry
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Axis-aligned bounds as `(min, max)`
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(mut min, mut max), v| {
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
            (min, max)
        }))
    }

    /// Copy translated by `offset`
    pub fn translated(&self, offset: [f64; 3]) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|v| [v[0] + offset[0], v[1] + offset[1], v[2] + offset[2]])
                .collect(),
            triangles: self.triangles.clone(),
        }
    }

    /// Copy scaled per axis about the origin
    pub fn scaled(&self, factor: [f64; 3]) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|v| [v[0] * factor[0], v[1] * factor[1], v[2] * factor[2]])
                .collect(),
            triangles: self.triangles.clone(),
        }
    }

    /// Copy translated so the lowest point rests on z = 0
    pub fn dropped_to_bed(&self) -> Self {
        match self.bounds() {
            Some((min, _)) => self.translated([0.0, 0.0, -min[2]]),
            None => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetra() -> Mesh {
        Mesh {
            vertices: vec![[0.0, 0.0, 1.0], [10.0, 0.0, 1.0], [0.0, 10.0, 1.0], [0.0, 0.0, 6.0]],
            triangles: vec![[0, 1, 2], [0, 1, 3], [1, 2, 3], [0, 2, 3]],
        }
    }

    #[test]
    fn test_bounds() {
        let (min, max) = tetra().bounds().unwrap();
        assert_eq!(min, [0.0, 0.0, 1.0]);
        assert_eq!(max, [10.0, 10.0, 6.0]);
        assert!(Mesh::default().bounds().is_none());
    }

    #[test]
    fn test_transforms() {
        let mesh = tetra().scaled([2.0, 2.0, 2.0]).dropped_to_bed();
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min[2], 0.0);
        assert_relative_eq!(max[2], 10.0);
        assert_relative_eq!(max[0], 20.0);
        assert_eq!(mesh.triangle_count(), 4);
    }
}
