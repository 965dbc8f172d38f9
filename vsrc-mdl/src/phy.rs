//! Collision data (`.phy`)
//!
//! # Layout
//! ```text
//! header       16 bytes   size, id, solidCount, checksum
//! solid × n    size i32, then `size` bytes:
//!                 "VPHY" compact header (28 bytes) or nothing (legacy), then
//!                 IVP compact surface (48 bytes), then ledges
//! ledge        16 bytes   c_point_offset (relative to the ledge), client_data,
//!                         flags/size, n_triangles i16, reserved i16
//! triangle     16 bytes   index/material, 3 × edge { start_point u16, opposite u16 }
//! point        16 bytes   x, y, z, w (IVP space, meters)
//! text         KeyValues describing each solid, NUL terminated
//! ```
//!
//! Every ledge is one convex piece. Points are converted back to source
//! space inches.

use glam::Vec3;
use vsrc_common::{BinaryReader, DecodeError, DecodeResult, INCHES_TO_METERS};

/// `"VPHY"` little-endian
pub const VPHY_IDENT: u32 = 0x5948_5056;

const COMPACT_HEADER_SIZE: usize = 28;
const IVP_SURFACE_SIZE: usize = 48;
const LEDGE_SIZE: usize = 16;
const TRIANGLE_SIZE: usize = 16;
const POINT_SIZE: usize = 16;

/// One convex piece in source inches
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhysHull {
    pub points: Vec<Vec3>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhysSolid {
    pub index: usize,
    pub hulls: Vec<PhysHull>,
}

/// Per-solid properties from the trailing text section
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolidInfo {
    pub index: usize,
    /// Bone the solid follows
    pub name: String,
    pub parent: Option<String>,
    pub mass: Option<f32>,
    pub surface_prop: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhysicsData {
    pub checksum: i32,
    pub solids: Vec<PhysSolid>,
    pub info: Vec<SolidInfo>,
}

impl PhysicsData {
    pub fn solid_info(&self, index: usize) -> Option<&SolidInfo> {
        self.info.iter().find(|i| i.index == index)
    }

    pub fn hull_count(&self) -> usize {
        self.solids.iter().map(|s| s.hulls.len()).sum()
    }
}

/// IVP (meters, y down) → source (inches, z up)
pub fn ivp_to_source(p: Vec3) -> Vec3 {
    Vec3::new(p.x, p.z, -p.y) / INCHES_TO_METERS
}

pub fn decode_phy(data: &[u8]) -> DecodeResult<PhysicsData> {
    let mut r = BinaryReader::new(data);
    let header_size = r
        .read_i32()
        .map_err(|_| DecodeError::malformed("phy header is truncated"))?;
    let _id = r.read_i32()?;
    let solid_count = r.read_i32()?.max(0) as usize;
    let checksum = r.read_i32()?;
    if header_size < 16 {
        return Err(DecodeError::malformed(format!(
            "phy header size {}",
            header_size
        )));
    }

    r.seek(header_size as usize)?;
    let mut solids = Vec::with_capacity(solid_count.min(128));
    for index in 0..solid_count {
        let size = r.read_i32()?.max(0) as usize;
        let bytes = r.take(size)?;
        solids.push(PhysSolid {
            index,
            hulls: decode_solid(bytes)?,
        });
    }

    let tail = &data[r.position()..];
    let text_len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    let text = String::from_utf8_lossy(&tail[..text_len]);
    Ok(PhysicsData {
        checksum,
        solids,
        info: parse_solid_info(&text),
    })
}

fn decode_solid(bytes: &[u8]) -> DecodeResult<Vec<PhysHull>> {
    let mut r = BinaryReader::new(bytes);
    let surface = if r.peek(|r| r.read_u32())? == VPHY_IDENT {
        COMPACT_HEADER_SIZE
    } else {
        0
    };
    let mut ledge = surface + IVP_SURFACE_SIZE;
    // The point array follows the last ledge; the first ledge's point
    // offset bounds the ledge list until a nearer one is seen
    let mut points_start = bytes.len();
    let mut hulls = Vec::new();

    while ledge + LEDGE_SIZE <= points_start {
        r.seek(ledge)?;
        let point_offset = r.read_i32()?;
        let _client_data = r.read_i32()?;
        let _flags = r.read_u32()?;
        let triangle_count = r.read_i16()?.max(0) as usize;
        if triangle_count == 0 {
            break;
        }
        let points_at = ledge as i64 + point_offset as i64;
        if points_at < 0 {
            return Err(DecodeError::malformed(format!(
                "ledge at {} points before the solid",
                ledge
            )));
        }
        let points_at = points_at as usize;
        points_start = points_start.min(points_at);

        let mut indices: Vec<u16> = Vec::with_capacity(triangle_count * 3);
        for t in 0..triangle_count {
            let tri = ledge + LEDGE_SIZE + t * TRIANGLE_SIZE;
            for edge in 0..3 {
                r.seek(tri + 4 + edge * 4)?;
                indices.push(r.read_u16()?);
            }
        }
        indices.sort_unstable();
        indices.dedup();

        let points = indices
            .iter()
            .map(|&i| {
                r.seek(points_at + i as usize * POINT_SIZE)?;
                Ok(ivp_to_source(r.read_vec3()?))
            })
            .collect::<DecodeResult<Vec<_>>>()?;
        hulls.push(PhysHull { points });

        ledge += LEDGE_SIZE + triangle_count * TRIANGLE_SIZE;
    }
    Ok(hulls)
}

/// Read `solid { ... }` blocks from the text section
pub fn parse_solid_info(text: &str) -> Vec<SolidInfo> {
    let tokens = tokenize(text);
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let is_solid = tokens[i].eq_ignore_ascii_case("solid")
            && tokens.get(i + 1).map(String::as_str) == Some("{");
        if !is_solid {
            i += 1;
            continue;
        }
        i += 2;
        let mut info = SolidInfo::default();
        while i + 1 < tokens.len() && tokens[i] != "}" {
            let (key, value) = (&tokens[i], &tokens[i + 1]);
            match key.to_ascii_lowercase().as_str() {
                "index" => info.index = value.parse().unwrap_or(0),
                "name" => info.name = value.clone(),
                "parent" => info.parent = Some(value.clone()),
                "mass" => info.mass = value.parse().ok(),
                "surfaceprop" => info.surface_prop = Some(value.clone()),
                _ => {}
            }
            i += 2;
        }
        out.push(info);
        i += 1;
    }
    out
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => tokens.push(c.to_string()),
            '"' => tokens.push(chars.by_ref().take_while(|&c| c != '"').collect()),
            c if c.is_whitespace() => {}
            c => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || n == '{' || n == '}' || n == '"' {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                tokens.push(word);
            }
        }
    }
    tokens
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::header::tests::Writer;

    /// One VPHY solid with a single tetrahedron ledge, points in meters
    pub(crate) fn phy_bytes(points: &[[f32; 3]; 4], text: &str) -> Vec<u8> {
        let tris: [[u16; 3]; 4] = [[0, 1, 2], [0, 3, 1], [1, 3, 2], [2, 3, 0]];
        let mut solid = Writer::default();
        solid.u32(VPHY_IDENT).i16(0x100).i16(0).i32(0).vec3([0.0; 3]).i32(0);
        solid.zeros(IVP_SURFACE_SIZE);
        let ledge = solid.len();
        let point_offset = LEDGE_SIZE + tris.len() * TRIANGLE_SIZE;
        solid.i32(point_offset as i32).i32(0).u32(0).i16(tris.len() as i16).i16(0);
        for (i, t) in tris.iter().enumerate() {
            solid.u32(i as u32);
            for &v in t {
                solid.u16(v).u16(0);
            }
        }
        assert_eq!(solid.len(), ledge + point_offset);
        for p in points {
            solid.vec3(*p).f32(0.0);
        }

        let mut w = Writer::default();
        w.i32(16).i32(0).i32(1).i32(4321);
        w.i32(solid.len() as i32);
        w.buf.extend_from_slice(&solid.buf);
        w.cstr(text);
        w.buf
    }

    #[test]
    fn test_decode_single_hull() {
        let points = [
            [0.0, 0.0, 0.0],
            [0.0254, 0.0, 0.0],
            [0.0, -0.0254, 0.0],
            [0.0, 0.0, 0.0254],
        ];
        let data = phy_bytes(&points, "solid {\n\"index\" \"0\"\n\"name\" \"static_prop\"\n\"mass\" \"25.0\"\n}\n");
        let phy = decode_phy(&data).unwrap();
        assert_eq!(phy.checksum, 4321);
        assert_eq!(phy.hull_count(), 1);
        let hull = &phy.solids[0].hulls[0];
        assert_eq!(hull.points.len(), 4);
        // ivp -y is source +z
        assert!((hull.points[2] - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-4);
        assert!((hull.points[3] - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-4);
        let info = phy.solid_info(0).unwrap();
        assert_eq!(info.name, "static_prop");
        assert_eq!(info.mass, Some(25.0));
    }

    #[test]
    fn test_solid_info_blocks() {
        let info = parse_solid_info(
            "solid { \"index\" \"1\" \"name\" \"pelvis\" \"surfaceprop\" \"flesh\" }\n\
             solid { \"index\" \"2\" \"name\" \"spine\" \"parent\" \"pelvis\" }\n\
             editparams { \"rootname\" \"\" }",
        );
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].surface_prop.as_deref(), Some("flesh"));
        assert_eq!(info[1].parent.as_deref(), Some("pelvis"));
    }

    #[test]
    fn test_truncated_solid() {
        let points = [[0.0; 3]; 4];
        let data = phy_bytes(&points, "");
        assert!(decode_phy(&data[..100]).is_err());
    }
}
