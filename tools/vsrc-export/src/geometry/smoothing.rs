//! Smoothing-group normal averaging
//!
//! Faces carry a 32-bit smoothing mask. Vertices at the same position whose
//! masks share a bit get the average of their face normals; a zero mask
//! keeps the flat face normal.

use glam::Vec3;
use hashbrown::HashMap;
use vsrc_common::Vertex;

/// Position quantum for coincidence tests, in output units
const QUANTUM: f32 = 1e-4;

fn key(p: Vec3) -> [i64; 3] {
    let q = (p / QUANTUM).round();
    [q.x as i64, q.y as i64, q.z as i64]
}

/// Average normals in place. `groups` is parallel to `vertices`.
pub fn smooth_normals(vertices: &mut [Vertex], groups: &[u32]) {
    debug_assert_eq!(vertices.len(), groups.len());

    let mut buckets: HashMap<[i64; 3], Vec<usize>> = HashMap::new();
    for (i, v) in vertices.iter().enumerate() {
        if groups[i] != 0 {
            buckets.entry(key(v.position)).or_default().push(i);
        }
    }

    let smoothed: Vec<(usize, Vec3)> = buckets
        .values()
        .filter(|bucket| bucket.len() > 1)
        .flat_map(|bucket| {
            bucket.iter().map(|&i| {
                let sum: Vec3 = bucket
                    .iter()
                    .filter(|&&j| groups[i] & groups[j] != 0)
                    .map(|&j| vertices[j].normal)
                    .sum();
                (i, sum.normalize_or(vertices[i].normal))
            })
        })
        .collect();

    for (i, normal) in smoothed {
        vertices[i].normal = normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn vertex(p: Vec3, n: Vec3) -> Vertex {
        Vertex::new(p, n, Vec2::ZERO)
    }

    #[test]
    fn test_shared_bit_averages() {
        let mut verts = vec![
            vertex(Vec3::ZERO, Vec3::X),
            vertex(Vec3::ZERO, Vec3::Y),
            vertex(Vec3::ONE, Vec3::Z),
        ];
        smooth_normals(&mut verts, &[1, 1, 1]);
        let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!((verts[0].normal - expected).length() < 1e-6);
        assert!((verts[1].normal - expected).length() < 1e-6);
        assert_eq!(verts[2].normal, Vec3::Z);
    }

    #[test]
    fn test_disjoint_groups_stay_flat() {
        let mut verts = vec![
            vertex(Vec3::ZERO, Vec3::X),
            vertex(Vec3::ZERO, Vec3::Y),
            vertex(Vec3::ZERO, Vec3::Z),
        ];
        smooth_normals(&mut verts, &[0b01, 0b10, 0]);
        assert_eq!(verts[0].normal, Vec3::X);
        assert_eq!(verts[1].normal, Vec3::Y);
        assert_eq!(verts[2].normal, Vec3::Z);
    }
}
