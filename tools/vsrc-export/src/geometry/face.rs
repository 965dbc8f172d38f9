//! Face polygons: edge loop, plane, texture projection

use glam::{Vec2, Vec3};
use vsrc_bsp::{Face, LevelDocument, TexInfo};
use vsrc_common::{DecodeError, Warning};

use super::surface::{SurfaceKind, classify_surface, clean_material_name};

/// Points closer than this (in source units) are the same point
pub const WELD_EPSILON: f32 = 1e-3;

/// Twice the area below which a triangle counts as collinear
const MIN_DOUBLE_AREA: f32 = 1e-4;

/// One face resolved against its lumps, ready for triangulation
#[derive(Debug, Clone)]
pub struct FacePolygon {
    pub index: u32,
    pub face: Face,
    /// Boundary loop in source winding, consecutive duplicates removed
    pub points: Vec<Vec3>,
    /// Outward normal (plane normal, flipped for back sides)
    pub normal: Vec3,
    pub dist: f32,
    pub texinfo: TexInfo,
    pub texture_size: Vec2,
    pub material: String,
    pub kind: SurfaceKind,
}

/// Turn a failed dereference into a per-face warning
pub fn reference_warning(face: u32, err: DecodeError) -> Warning {
    match err {
        DecodeError::InvalidIndex { what, index, .. } => {
            Warning::InvalidReference { face, what, index }
        }
        other => Warning::DegenerateGeometry {
            face,
            reason: other.to_string(),
        },
    }
}

/// Resolve face `index`; any bad reference or degenerate loop is a warning
pub fn face_polygon(doc: &LevelDocument, index: u32) -> Result<FacePolygon, Warning> {
    let warn = |e| reference_warning(index, e);
    let face = *vsrc_bsp::checked(&doc.faces, i64::from(index), "face").map_err(warn)?;

    let plane = doc.plane(i64::from(face.plane)).map_err(warn)?;
    let normal = if face.side != 0 {
        -plane.normal
    } else {
        plane.normal
    };
    let dist = if face.side != 0 { -plane.dist } else { plane.dist };

    let texinfo = *doc.texinfo(i64::from(face.texinfo)).map_err(warn)?;
    let texdata = doc.texdata_at(i64::from(texinfo.texdata)).map_err(warn)?;
    let raw_name = doc.texdata_name(i64::from(texinfo.texdata)).map_err(warn)?;
    let material = clean_material_name(&raw_name);
    let kind = classify_surface(&material, texinfo.flags);

    let mut points: Vec<Vec3> = Vec::with_capacity(face.num_edges.max(0) as usize);
    for vertex in doc.face_loop(&face).map_err(warn)? {
        let p = doc.vertex(i64::from(vertex)).map_err(warn)?;
        if points
            .last()
            .is_none_or(|last| last.distance(p) > WELD_EPSILON)
        {
            points.push(p);
        }
    }
    if points.len() > 1 && points[0].distance(points[points.len() - 1]) <= WELD_EPSILON {
        points.pop();
    }
    if points.len() < 3 {
        return Err(Warning::DegenerateGeometry {
            face: index,
            reason: format!("{} distinct points", points.len()),
        });
    }

    Ok(FacePolygon {
        index,
        face,
        points,
        normal,
        dist,
        texinfo,
        texture_size: Vec2::new(texdata.width.max(1) as f32, texdata.height.max(1) as f32),
        material,
        kind,
    })
}

/// Fan-triangulate a convex loop, dropping collinear triangles.
/// Triangles keep the loop's winding.
pub fn fan_triangles(points: &[Vec3]) -> Vec<[u32; 3]> {
    (1..points.len().saturating_sub(1))
        .filter(|&i| {
            let (a, b, c) = (points[0], points[i], points[i + 1]);
            (b - a).cross(c - a).length() > MIN_DOUBLE_AREA
        })
        .map(|i| [0, i as u32, i as u32 + 1])
        .collect()
}

/// Texture coordinates: project onto the texinfo basis, divide by size
pub fn texture_uv(texinfo: &TexInfo, size: Vec2, p: Vec3) -> Vec2 {
    let [s, t] = texinfo.texture_vecs;
    Vec2::new(
        (s.truncate().dot(p) + s.w) / size.x,
        (t.truncate().dot(p) + t.w) / size.y,
    )
}

/// Luxel coordinates relative to the face's lightmap rectangle
pub fn lightmap_luxel(texinfo: &TexInfo, face: &Face, p: Vec3) -> Vec2 {
    let [s, t] = texinfo.lightmap_vecs;
    Vec2::new(
        s.truncate().dot(p) + s.w - face.lightmap_mins[0] as f32,
        t.truncate().dot(p) + t.w - face.lightmap_mins[1] as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::fixtures::{LevelBuilder, quad};

    #[test]
    fn test_face_polygon_resolves_material_and_normal() {
        let mut level = LevelBuilder::new();
        let tex = level.texture("maps/test/Brick/Wall01_0_0_0", 0);
        let face = level.face(&quad(Vec3::ZERO, 64.0), tex);
        let doc = level.finish();

        let poly = face_polygon(&doc, face).unwrap();
        assert_eq!(poly.material, "brick/wall01");
        assert_eq!(poly.kind, SurfaceKind::Visible);
        assert_eq!(poly.points.len(), 4);
        assert!((poly.normal - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_back_side_flips_normal() {
        let mut level = LevelBuilder::new();
        let tex = level.texture("dev/dev_blank", 0);
        let face = level.face(&quad(Vec3::ZERO, 64.0), tex);
        let mut doc = level.finish();
        doc.faces[face as usize].side = 1;

        let poly = face_polygon(&doc, face).unwrap();
        assert!((poly.normal + Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_bad_edge_is_invalid_reference() {
        let mut level = LevelBuilder::new();
        let tex = level.texture("dev/dev_blank", 0);
        let face = level.face(&quad(Vec3::ZERO, 64.0), tex);
        let mut doc = level.finish();
        let first = doc.faces[face as usize].first_edge as usize;
        doc.surfedges[first] = 9999;

        let err = face_polygon(&doc, face).unwrap_err();
        assert_eq!(
            err,
            Warning::InvalidReference {
                face,
                what: "edge",
                index: 9999
            }
        );
    }

    #[test]
    fn test_collapsed_face_is_degenerate() {
        let mut level = LevelBuilder::new();
        let tex = level.texture("dev/dev_blank", 0);
        let p = Vec3::new(1.0, 2.0, 3.0);
        let face = level.face(&[p, p, p + Vec3::X * 1e-5], tex);
        let doc = level.finish();

        assert!(matches!(
            face_polygon(&doc, face),
            Err(Warning::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn test_fan_drops_collinear() {
        let points = [
            Vec3::ZERO,
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(20.0, 10.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ];
        let tris = fan_triangles(&points);
        assert_eq!(tris, vec![[0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn test_texture_uv_projection() {
        let mut level = LevelBuilder::new();
        let tex = level.texture("dev/dev_blank", 0);
        let doc = {
            level.face(&quad(Vec3::ZERO, 64.0), tex);
            level.finish()
        };
        let texinfo = doc.texinfos[tex as usize];
        let uv = texture_uv(&texinfo, Vec2::new(64.0, 64.0), Vec3::new(32.0, 64.0, 0.0));
        assert!((uv - Vec2::new(0.5, 1.0)).length() < 1e-6);
    }
}
