//! Displacement grids
//!
//! A displacement replaces its quad face with a `(2^p + 1)²` point grid.
//! Each point is the bilinear blend of the face corners, starting at the
//! corner nearest the recorded start position, plus its offset vector.
//! Grid index `x * n + y` steps along corner 0→1 with `x` and 0→3 with `y`,
//! so quads `(x, y) (x+1, y) (x+1, y+1) (x, y+1)` keep the face's winding.

use glam::Vec3;
use vsrc_bsp::LevelDocument;
use vsrc_common::Warning;

use super::face::{FacePolygon, reference_warning};

#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementGrid {
    pub face: u32,
    pub disp: u32,
    /// Points per edge
    pub size: usize,
    /// Displaced positions
    pub positions: Vec<Vec3>,
    /// Undisplaced positions on the face plane, for texture projection
    pub base: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Blend alpha in 0..1
    pub alphas: Vec<f32>,
    pub triangles: Vec<[u32; 3]>,
}

impl DisplacementGrid {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Vertex color carrying the blend: `(alpha, 1 - alpha, 0, 1)`
    pub fn color(&self, i: usize) -> [f32; 4] {
        let a = self.alphas[i];
        [a, 1.0 - a, 0.0, 1.0]
    }
}

/// Build the grid for a displaced face
pub fn build_displacement(
    doc: &LevelDocument,
    polygon: &FacePolygon,
) -> Result<DisplacementGrid, Warning> {
    let face = polygon.index;
    let disp = polygon.face.dispinfo;
    let info = doc
        .dispinfo(i64::from(disp))
        .map_err(|e| reference_warning(face, e))?;
    let invalid = |reason: String| Warning::InvalidDisplacement {
        face,
        disp: disp as u32,
        reason,
    };

    if polygon.points.len() != 4 {
        return Err(invalid(format!(
            "mapped to a face with {} corners",
            polygon.points.len()
        )));
    }
    if !(2..=4).contains(&info.power) {
        return Err(invalid(format!("power {} out of range", info.power)));
    }

    let start = polygon
        .points
        .iter()
        .enumerate()
        .min_by(|a, b| {
            a.1.distance_squared(info.start_position)
                .total_cmp(&b.1.distance_squared(info.start_position))
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    let corner = |k: usize| polygon.points[(start + k) % 4];
    let (p0, p1, p2, p3) = (corner(0), corner(1), corner(2), corner(3));

    let n = info.grid_size();
    let first = usize::try_from(info.disp_vert_start).map_err(|_| {
        invalid(format!("negative vertex start {}", info.disp_vert_start))
    })?;
    let verts = doc
        .disp_verts
        .get(first..first + n * n)
        .ok_or_else(|| Warning::InvalidReference {
            face,
            what: "dispvert",
            index: (first + n * n - 1) as i64,
        })?;

    let step = 1.0 / (n - 1) as f32;
    let mut positions = Vec::with_capacity(n * n);
    let mut base = Vec::with_capacity(n * n);
    let mut alphas = Vec::with_capacity(n * n);
    for x in 0..n {
        let edge_a = p0.lerp(p1, x as f32 * step);
        let edge_b = p3.lerp(p2, x as f32 * step);
        for y in 0..n {
            let vert = &verts[x * n + y];
            let flat = edge_a.lerp(edge_b, y as f32 * step);
            base.push(flat);
            positions.push(flat + vert.vec * vert.dist);
            alphas.push((vert.alpha / 255.0).clamp(0.0, 1.0));
        }
    }

    let triangles = grid_triangles(n);
    let orientation = if (p1 - p0).cross(p2 - p0).dot(polygon.normal) < 0.0 {
        -1.0
    } else {
        1.0
    };
    let normals = grid_normals(&positions, &triangles, orientation);

    Ok(DisplacementGrid {
        face,
        disp: disp as u32,
        size: n,
        positions,
        base,
        normals,
        alphas,
        triangles,
    })
}

/// Two triangles per cell, diagonal alternating in a checkerboard
pub fn grid_triangles(n: usize) -> Vec<[u32; 3]> {
    let mut triangles = Vec::with_capacity((n - 1) * (n - 1) * 2);
    for x in 0..n - 1 {
        for y in 0..n - 1 {
            let i0 = (x * n + y) as u32;
            let i1 = ((x + 1) * n + y) as u32;
            let i2 = ((x + 1) * n + y + 1) as u32;
            let i3 = (x * n + y + 1) as u32;
            if (x + y) % 2 == 0 {
                triangles.push([i0, i1, i2]);
                triangles.push([i0, i2, i3]);
            } else {
                triangles.push([i0, i1, i3]);
                triangles.push([i1, i2, i3]);
            }
        }
    }
    triangles
}

/// Area-weighted vertex normals; `orientation` is -1 when the winding's
/// cross product points against the face normal
fn grid_normals(positions: &[Vec3], triangles: &[[u32; 3]], orientation: f32) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for &[a, b, c] in triangles {
        let (pa, pb, pc) = (
            positions[a as usize],
            positions[b as usize],
            positions[c as usize],
        );
        let n = (pb - pa).cross(pc - pa);
        for i in [a, b, c] {
            normals[i as usize] += n;
        }
    }
    normals
        .into_iter()
        .map(|n| (n * orientation).normalize_or_zero())
        .collect()
}
