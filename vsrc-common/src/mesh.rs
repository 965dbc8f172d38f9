//! Engine-agnostic mesh representation handed to the asset emitter

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Maximum bone influences per vertex in the target format
pub const MAX_INFLUENCES: usize = 4;

/// One vertex of an intermediate mesh
///
/// `color` carries displacement blend alpha in its first two channels
/// (`alpha`, `1 - alpha`) and is white for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub lightmap_uv: Vec2,
    pub color: [f32; 4],
}

impl Vertex {
    pub const SIZE: usize = std::mem::size_of::<Vertex>();

    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
            lightmap_uv: Vec2::ZERO,
            color: [1.0; 4],
        }
    }
}

/// Fixed-width skin influence set; weights sum to 1
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SkinWeights {
    pub bones: [u32; MAX_INFLUENCES],
    pub weights: [f32; MAX_INFLUENCES],
}

impl SkinWeights {
    pub const SIZE: usize = std::mem::size_of::<SkinWeights>();

    /// Build from an arbitrary influence list: keep the largest four,
    /// renormalize. An empty or all-zero list binds fully to `fallback_bone`.
    pub fn from_influences(influences: &[(u32, f32)], fallback_bone: u32) -> Self {
        let mut sorted: Vec<(u32, f32)> = influences
            .iter()
            .copied()
            .filter(|(_, w)| w.is_finite() && *w > 0.0)
            .collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        sorted.truncate(MAX_INFLUENCES);

        let total: f32 = sorted.iter().map(|(_, w)| w).sum();
        let mut out = SkinWeights::default();
        if sorted.is_empty() || total <= f32::EPSILON {
            out.bones[0] = fallback_bone;
            out.weights[0] = 1.0;
            return out;
        }
        for (slot, (bone, weight)) in sorted.iter().enumerate() {
            out.bones[slot] = *bone;
            out.weights[slot] = weight / total;
        }
        out
    }

    pub fn total(&self) -> f32 {
        self.weights.iter().sum()
    }

    pub fn influence_count(&self) -> usize {
        self.weights.iter().filter(|w| **w > 0.0).count()
    }
}

/// Convex collision body as a point cloud
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConvexHull {
    pub points: Vec<Vec3>,
    /// Bone the hull follows, for skinned models
    pub bone: Option<u32>,
    /// Source contents flags (solid, player clip, npc clip, ...)
    pub contents: u32,
}

/// Triangle mesh with per-triangle material and origin tracking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    /// Material names; `triangle_materials` indexes into this
    pub materials: Vec<String>,
    pub vertices: Vec<Vertex>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
    pub triangle_materials: Vec<u32>,
    /// Originating source element per triangle (face index for levels,
    /// submesh index for models)
    pub triangle_origins: Vec<u32>,
    /// Parallel to `vertices` when the mesh is skinned
    pub skin: Option<Vec<SkinWeights>>,
    pub collision: Vec<ConvexHull>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Index of `material`, appending it if new
    pub fn material_slot(&mut self, material: &str) -> u32 {
        if let Some(i) = self.materials.iter().position(|m| m == material) {
            return i as u32;
        }
        self.materials.push(material.to_string());
        (self.materials.len() - 1) as u32
    }

    /// Append a triangle whose indices are already in `vertices`
    pub fn push_triangle(&mut self, tri: [u32; 3], material: u32, origin: u32) {
        self.indices.extend_from_slice(&tri);
        self.triangle_materials.push(material);
        self.triangle_origins.push(origin);
    }

    pub fn triangle(&self, i: usize) -> [u32; 3] {
        [
            self.indices[i * 3],
            self.indices[i * 3 + 1],
            self.indices[i * 3 + 2],
        ]
    }

    /// Check index bounds and per-triangle table lengths
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err(format!("index count {} is not a multiple of 3", self.indices.len()));
        }
        let tris = self.triangle_count();
        if self.triangle_materials.len() != tris || self.triangle_origins.len() != tris {
            return Err("per-triangle tables do not match triangle count".into());
        }
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= self.vertices.len()) {
            return Err(format!(
                "index {} out of bounds ({} vertices)",
                bad,
                self.vertices.len()
            ));
        }
        if let Some(bad) = self
            .triangle_materials
            .iter()
            .find(|&&m| m as usize >= self.materials.len())
        {
            return Err(format!("material index {} out of bounds", bad));
        }
        if let Some(skin) = &self.skin {
            if skin.len() != self.vertices.len() {
                return Err("skin weight count does not match vertex count".into());
            }
        }
        Ok(())
    }

    /// Axis-aligned bounds of all vertices
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(lo, hi), v| {
            (lo.min(v.position), hi.max(v.position))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skin_weights_keep_four_largest() {
        let w = SkinWeights::from_influences(
            &[(0, 0.1), (1, 0.4), (2, 0.05), (3, 0.2), (4, 0.25)],
            0,
        );
        assert_eq!(w.bones, [1, 4, 3, 0]);
        assert!((w.total() - 1.0).abs() < 1e-4);
        assert!((w.weights[0] - 0.4 / 0.95).abs() < 1e-5);
    }

    #[test]
    fn test_skin_weights_renormalize_under_one() {
        let w = SkinWeights::from_influences(&[(5, 0.3), (6, 0.3)], 0);
        assert_eq!(w.influence_count(), 2);
        assert!((w.weights[0] - 0.5).abs() < 1e-6);
        assert!((w.total() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_skin_weights_fallback() {
        let w = SkinWeights::from_influences(&[(3, 0.0)], 7);
        assert_eq!(w.bones[0], 7);
        assert_eq!(w.weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_mesh_material_slots_and_validate() {
        let mut mesh = Mesh::new("m");
        for p in [Vec3::ZERO, Vec3::X, Vec3::Y] {
            mesh.vertices.push(Vertex::new(p, Vec3::Z, Vec2::ZERO));
        }
        let a = mesh.material_slot("brick");
        let b = mesh.material_slot("brick");
        assert_eq!(a, b);
        mesh.push_triangle([0, 1, 2], a, 9);
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.triangle(0), [0, 1, 2]);

        mesh.push_triangle([0, 1, 3], a, 9);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_vertex_is_pod() {
        let v = [Vertex::new(Vec3::ONE, Vec3::Z, Vec2::ONE)];
        let bytes: &[u8] = bytemuck::cast_slice(&v);
        assert_eq!(bytes.len(), Vertex::SIZE);
        assert_eq!(Vertex::SIZE, 56);
    }
}
