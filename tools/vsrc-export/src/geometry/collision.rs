//! Brush collision hulls
//!
//! Brushes are convex intersections of half-spaces. Each non-bevel side is
//! turned into a polygon by clipping a large quad on its plane against
//! every other side; the union of polygon points is the hull. Clipping
//! runs in double precision since the seed quad spans the whole map.

use glam::{DVec3, Vec3};
use vsrc_bsp::LevelDocument;
use vsrc_bsp::lumps::{CONTENTS_MONSTERCLIP, CONTENTS_PLAYERCLIP, CONTENTS_SOLID};
use vsrc_common::{ConvexHull, CoordTransform, Diagnostics};

use super::face::WELD_EPSILON;

/// Half extent of the seed quad; larger than any legal map
const SEED_EXTENT: f64 = 65536.0;

const CLIP_EPSILON: f64 = 0.01;

pub const COLLISION_CONTENTS: i32 = CONTENTS_SOLID | CONTENTS_PLAYERCLIP | CONTENTS_MONSTERCLIP;

/// Keep the part of `polygon` behind the plane (`n·p <= d`)
pub fn clip_polygon(polygon: &[DVec3], normal: DVec3, dist: f64) -> Vec<DVec3> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, &a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        let da = normal.dot(a) - dist;
        let db = normal.dot(b) - dist;
        if da <= CLIP_EPSILON {
            out.push(a);
        }
        if (da < -CLIP_EPSILON && db > CLIP_EPSILON) || (da > CLIP_EPSILON && db < -CLIP_EPSILON) {
            out.push(a.lerp(b, da / (da - db)));
        }
    }
    out
}

fn seed_quad(normal: DVec3, dist: f64) -> Vec<DVec3> {
    let u = normal.any_orthonormal_vector() * SEED_EXTENT;
    let v = normal.cross(u);
    let center = normal * dist;
    vec![center - u - v, center + u - v, center + u + v, center - u + v]
}

/// Hull points of one brush in source space, or `None` when it is empty
pub fn brush_points(planes: &[(Vec3, f32)]) -> Option<Vec<Vec3>> {
    let mut points: Vec<Vec3> = Vec::new();
    for (i, &(normal, dist)) in planes.iter().enumerate() {
        let mut polygon = seed_quad(normal.as_dvec3(), f64::from(dist));
        for (j, &(other_normal, other_dist)) in planes.iter().enumerate() {
            if i == j || polygon.is_empty() {
                continue;
            }
            polygon = clip_polygon(&polygon, other_normal.as_dvec3(), f64::from(other_dist));
        }
        for p in polygon.into_iter().map(|p| p.as_vec3()) {
            if !points.iter().any(|q| q.distance(p) <= WELD_EPSILON) {
                points.push(p);
            }
        }
    }
    (points.len() >= 4).then_some(points)
}

/// Hulls for every solid or clip brush
pub fn brush_hulls(
    doc: &LevelDocument,
    transform: &CoordTransform,
    diag: &mut Diagnostics,
) -> Vec<ConvexHull> {
    let mut hulls = Vec::new();
    for (index, brush) in doc.brushes.iter().enumerate() {
        if brush.contents & COLLISION_CONTENTS == 0 {
            continue;
        }
        let first = brush.first_side.max(0) as usize;
        let Some(sides) = doc.brush_sides.get(first..first + brush.num_sides.max(0) as usize) else {
            diag.skipped(format!("brush {}", index), "sides out of range");
            continue;
        };

        let planes: Result<Vec<(Vec3, f32)>, _> = sides
            .iter()
            .filter(|side| side.bevel == 0)
            .map(|side| {
                doc.plane(i64::from(side.plane))
                    .map(|plane| (plane.normal, plane.dist))
            })
            .collect();
        let planes = match planes {
            Ok(planes) => planes,
            Err(e) => {
                diag.skipped(format!("brush {}", index), e.to_string());
                continue;
            }
        };

        match brush_points(&planes) {
            Some(points) => hulls.push(ConvexHull {
                points: points.into_iter().map(|p| transform.position(p)).collect(),
                bone: None,
                contents: brush.contents as u32,
            }),
            None => tracing::debug!("Brush {} has no volume", index),
        }
    }
    tracing::debug!("Built {} brush hulls", hulls.len());
    hulls
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsrc_bsp::{Brush, BrushSide, Plane};

    fn box_planes(min: Vec3, max: Vec3) -> Vec<(Vec3, f32)> {
        vec![
            (Vec3::X, max.x),
            (Vec3::NEG_X, -min.x),
            (Vec3::Y, max.y),
            (Vec3::NEG_Y, -min.y),
            (Vec3::Z, max.z),
            (Vec3::NEG_Z, -min.z),
        ]
    }

    #[test]
    fn test_clip_polygon_halves_square() {
        let square = [
            DVec3::new(-1.0, -1.0, 0.0),
            DVec3::new(1.0, -1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(-1.0, 1.0, 0.0),
        ];
        let clipped = clip_polygon(&square, DVec3::X, 0.0);
        assert_eq!(clipped.len(), 4);
        assert!(clipped.iter().all(|p| p.x <= 1e-6));
    }

    #[test]
    fn test_box_brush_has_eight_corners() {
        let points = brush_points(&box_planes(Vec3::ZERO, Vec3::new(64.0, 32.0, 16.0))).unwrap();
        assert_eq!(points.len(), 8);
        assert!(points.iter().any(|p| p.distance(Vec3::new(64.0, 32.0, 16.0)) < 1e-3));
        assert!(points.iter().all(|p| p.x >= -1e-3 && p.x <= 64.001));
    }

    #[test]
    fn test_empty_brush() {
        let mut planes = box_planes(Vec3::ZERO, Vec3::splat(16.0));
        // Contradicting side removes all volume
        planes.push((Vec3::X, -8.0));
        assert!(brush_points(&planes).is_none());
    }

    #[test]
    fn test_brush_hulls_filter_contents() {
        let mut doc = LevelDocument::default();
        for (normal, dist) in box_planes(Vec3::ZERO, Vec3::splat(16.0)) {
            doc.planes.push(Plane {
                normal,
                dist,
                kind: 0,
            });
        }
        for plane in 0..6u16 {
            doc.brush_sides.push(BrushSide {
                plane,
                texinfo: 0,
                dispinfo: -1,
                bevel: 0,
                thin: 0,
            });
        }
        doc.brushes.push(Brush {
            first_side: 0,
            num_sides: 6,
            contents: CONTENTS_PLAYERCLIP,
        });
        // Water is not collision
        doc.brushes.push(Brush {
            first_side: 0,
            num_sides: 6,
            contents: 0x20,
        });
        doc.brushes.push(Brush {
            first_side: 4,
            num_sides: 10,
            contents: CONTENTS_SOLID,
        });

        let mut diag = Diagnostics::new();
        let hulls = brush_hulls(&doc, &CoordTransform::identity(), &mut diag);
        assert_eq!(hulls.len(), 1);
        assert_eq!(hulls[0].contents, CONTENTS_PLAYERCLIP as u32);
        assert_eq!(hulls[0].points.len(), 8);
        assert_eq!(diag.len(), 1);
    }
}
