use crate::core::geometry::{Aabb, Ray};
use crate::core::glam::Vec3A;
use crate::MapError;

/// A square grid of vertices covering one tile, with the normals and bounds derived from it.
///
/// Vertex `i` sits in column `i % n` and row `i / n`, the same order as the tile's elevation sample grid. Columns advance
/// along local -x and rows along local -z, so vertex 0 is the `(+x, +z)` corner of the tile.
///
/// Derived data is only refreshed by [`TileMesh::rebuild`]; every mutation in this crate is followed by one.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMesh {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    indices: Vec<u32>,
    bounds: Aabb,
}

impl TileMesh {
    /// A flat grid of `edge_vertices x edge_vertices` vertices spanning `edge_length` on both horizontal axes, centered on the
    /// local origin.
    pub fn flat(edge_vertices: usize, edge_length: f32) -> Self {
        let step = edge_length / (edge_vertices - 1) as f32;
        let half = edge_length / 2.0;
        let positions = (0..edge_vertices * edge_vertices)
            .map(|i| {
                let col = (i % edge_vertices) as f32;
                let row = (i / edge_vertices) as f32;
                [half - col * step, 0.0, half - row * step]
            })
            .collect();

        let mut mesh = Self {
            positions,
            normals: Vec::new(),
            indices: grid_indices(edge_vertices),
            bounds: Aabb::new(Vec3A::ZERO, Vec3A::ZERO),
        };
        mesh.rebuild();
        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn min_height(&self) -> f32 {
        self.bounds.min.y
    }

    pub(crate) fn set_heights(&mut self, heights: impl ExactSizeIterator<Item = f32>) -> Result<(), MapError> {
        check_count(self.vertex_count(), heights.len())?;
        for (p, h) in self.positions.iter_mut().zip(heights) {
            p[1] = h;
        }
        Ok(())
    }

    pub(crate) fn set_positions(&mut self, positions: Vec<[f32; 3]>) -> Result<(), MapError> {
        check_count(self.vertex_count(), positions.len())?;
        self.positions = positions;
        Ok(())
    }

    pub(crate) fn translate_vertical(&mut self, dy: f32) {
        for p in self.positions.iter_mut() {
            p[1] += dy;
        }
    }

    /// Recomputes normals and bounds from the positions.
    pub fn rebuild(&mut self) {
        let mut normals = vec![Vec3A::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = self.triangle([tri[0], tri[1], tri[2]]);
            // Area weighted.
            let n = (b - a).cross(c - a);
            for &i in tri {
                normals[i as usize] += n;
            }
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.normalize_or_zero().to_array())
            .collect();

        if let Some(bounds) = Aabb::from_points(self.positions.iter().copied().map(Vec3A::from)) {
            self.bounds = bounds;
        }
    }

    /// The earliest time at which `ray` hits a triangle of this mesh. `ray` is in the mesh's local space.
    pub fn cast_ray(&self, ray: &Ray) -> Option<f32> {
        ray.cast_at_aabb(&self.bounds)?;

        self.indices
            .chunks_exact(3)
            .filter_map(|tri| ray.cast_at_triangle(self.triangle([tri[0], tri[1], tri[2]])))
            .min_by(|a, b| a.total_cmp(b))
    }

    fn triangle(&self, [a, b, c]: [u32; 3]) -> [Vec3A; 3] {
        [
            Vec3A::from(self.positions[a as usize]),
            Vec3A::from(self.positions[b as usize]),
            Vec3A::from(self.positions[c as usize]),
        ]
    }
}

fn check_count(expected: usize, actual: usize) -> Result<(), MapError> {
    if expected != actual {
        return Err(MapError::VertexCountMismatch { expected, actual });
    }
    Ok(())
}

/// Two triangles per grid cell, wound so that a flat grid faces +y.
fn grid_indices(n: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity(6 * (n - 1) * (n - 1));
    for row in 0..n - 1 {
        for col in 0..n - 1 {
            let a = (row * n + col) as u32;
            let b = a + 1;
            let c = a + n as u32;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }
    indices
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
