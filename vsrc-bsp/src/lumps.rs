//! Fixed-size lump records
//!
//! Cross-record references are kept as the raw integers found on disk.
//! They are bounds-checked by whoever dereferences them.

use glam::{Vec3, Vec4};
use vsrc_common::{BinaryReader, DecodeResult};

use crate::header::{BspHeader, LumpKind};

/// A record stored back to back inside one lump
pub trait Record: Sized {
    const SIZE: usize;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self>;
}

/// Decode every record of a lump. Fails as a whole, never partially.
pub fn decode_lump<T: Record>(
    data: &[u8],
    header: &BspHeader,
    kind: LumpKind,
) -> DecodeResult<Vec<T>> {
    let bytes = header.lump_bytes(data, kind, T::SIZE)?;
    let count = bytes.len() / T::SIZE;
    let mut r = BinaryReader::new(bytes);
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        r.seek(i * T::SIZE)?;
        out.push(T::read(&mut r)?);
    }
    Ok(out)
}

// ============================================================================
// Surface flags (texinfo.flags)
// ============================================================================

pub const SURF_LIGHT: i32 = 0x0001;
pub const SURF_SKY2D: i32 = 0x0002;
pub const SURF_SKY: i32 = 0x0004;
pub const SURF_WARP: i32 = 0x0008;
pub const SURF_TRANS: i32 = 0x0010;
pub const SURF_TRIGGER: i32 = 0x0040;
pub const SURF_NODRAW: i32 = 0x0080;
pub const SURF_HINT: i32 = 0x0100;
pub const SURF_SKIP: i32 = 0x0200;
pub const SURF_NOLIGHT: i32 = 0x0400;
pub const SURF_BUMPLIGHT: i32 = 0x0800;

// ============================================================================
// Brush contents
// ============================================================================

pub const CONTENTS_SOLID: i32 = 0x1;
pub const CONTENTS_WINDOW: i32 = 0x2;
pub const CONTENTS_GRATE: i32 = 0x8;
pub const CONTENTS_WATER: i32 = 0x20;
pub const CONTENTS_PLAYERCLIP: i32 = 0x10000;
pub const CONTENTS_MONSTERCLIP: i32 = 0x20000;
pub const CONTENTS_DETAIL: i32 = 0x8000000;

impl Record for Vec3 {
    const SIZE: usize = 12;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        r.read_vec3()
    }
}

impl Record for i32 {
    const SIZE: usize = 4;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        r.read_i32()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
    pub kind: i32,
}

impl Plane {
    /// Signed distance of `p` from the plane
    pub fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.dist
    }
}

impl Record for Plane {
    const SIZE: usize = 20;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            normal: r.read_vec3()?,
            dist: r.read_f32()?,
            kind: r.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub v: [u16; 2],
}

impl Record for Edge {
    const SIZE: usize = 4;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            v: [r.read_u16()?, r.read_u16()?],
        })
    }
}

/// `dface_t`, 56 bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub plane: u16,
    /// Non-zero when the face points opposite to its plane normal
    pub side: u8,
    pub on_node: u8,
    pub first_edge: i32,
    pub num_edges: i16,
    pub texinfo: i16,
    pub dispinfo: i16,
    pub fog_volume: i16,
    pub styles: [u8; 4],
    /// Byte offset into the lighting lump, -1 when unlit
    pub light_offset: i32,
    pub area: f32,
    pub lightmap_mins: [i32; 2],
    pub lightmap_size: [i32; 2],
    pub original_face: i32,
    pub num_prims: u16,
    pub first_prim: u16,
    pub smoothing_groups: u32,
}

impl Face {
    pub fn has_displacement(&self) -> bool {
        self.dispinfo >= 0
    }

    pub fn has_lightmap(&self) -> bool {
        self.light_offset >= 0
    }
}

impl Record for Face {
    const SIZE: usize = 56;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            plane: r.read_u16()?,
            side: r.read_u8()?,
            on_node: r.read_u8()?,
            first_edge: r.read_i32()?,
            num_edges: r.read_i16()?,
            texinfo: r.read_i16()?,
            dispinfo: r.read_i16()?,
            fog_volume: r.read_i16()?,
            styles: r.read_array()?,
            light_offset: r.read_i32()?,
            area: r.read_f32()?,
            lightmap_mins: [r.read_i32()?, r.read_i32()?],
            lightmap_size: [r.read_i32()?, r.read_i32()?],
            original_face: r.read_i32()?,
            num_prims: r.read_u16()?,
            first_prim: r.read_u16()?,
            smoothing_groups: r.read_u32()?,
        })
    }
}

/// `texinfo_t`, 72 bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexInfo {
    /// [s, t] projection: `dot(v.xyz, p) + v.w` in texels
    pub texture_vecs: [Vec4; 2],
    /// [s, t] projection in luxels
    pub lightmap_vecs: [Vec4; 2],
    pub flags: i32,
    pub texdata: i32,
}

impl TexInfo {
    pub fn has_flag(&self, flag: i32) -> bool {
        self.flags & flag != 0
    }
}

impl Record for TexInfo {
    const SIZE: usize = 72;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            texture_vecs: [r.read_vec4()?, r.read_vec4()?],
            lightmap_vecs: [r.read_vec4()?, r.read_vec4()?],
            flags: r.read_i32()?,
            texdata: r.read_i32()?,
        })
    }
}

/// `dtexdata_t`, 32 bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexData {
    pub reflectivity: Vec3,
    pub name_id: i32,
    pub width: i32,
    pub height: i32,
    pub view_width: i32,
    pub view_height: i32,
}

impl Record for TexData {
    const SIZE: usize = 32;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            reflectivity: r.read_vec3()?,
            name_id: r.read_i32()?,
            width: r.read_i32()?,
            height: r.read_i32()?,
            view_width: r.read_i32()?,
            view_height: r.read_i32()?,
        })
    }
}

/// `dmodel_t`, 48 bytes. Model 0 is the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Model {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub head_node: i32,
    pub first_face: i32,
    pub num_faces: i32,
}

impl Record for Model {
    const SIZE: usize = 48;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            mins: r.read_vec3()?,
            maxs: r.read_vec3()?,
            origin: r.read_vec3()?,
            head_node: r.read_i32()?,
            first_face: r.read_i32()?,
            num_faces: r.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brush {
    pub first_side: i32,
    pub num_sides: i32,
    pub contents: i32,
}

impl Record for Brush {
    const SIZE: usize = 12;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            first_side: r.read_i32()?,
            num_sides: r.read_i32()?,
            contents: r.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrushSide {
    pub plane: u16,
    pub texinfo: i16,
    pub dispinfo: i16,
    pub bevel: u8,
    pub thin: u8,
}

impl Record for BrushSide {
    const SIZE: usize = 8;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            plane: r.read_u16()?,
            texinfo: r.read_i16()?,
            dispinfo: r.read_i16()?,
            bevel: r.read_u8()?,
            thin: r.read_u8()?,
        })
    }
}

/// `ddispinfo_t`, 176 bytes. Neighbour tables are not retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispInfo {
    pub start_position: Vec3,
    pub disp_vert_start: i32,
    pub disp_tri_start: i32,
    pub power: i32,
    pub min_tess: i32,
    pub smoothing_angle: f32,
    pub contents: i32,
    pub map_face: u16,
    pub lightmap_alpha_start: i32,
    pub lightmap_sample_position_start: i32,
}

impl DispInfo {
    /// Points per grid edge: 2^power + 1
    pub fn grid_size(&self) -> usize {
        (1usize << self.power.clamp(0, 8)) + 1
    }

    pub fn vertex_count(&self) -> usize {
        self.grid_size() * self.grid_size()
    }
}

impl Record for DispInfo {
    const SIZE: usize = 176;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        let start_position = r.read_vec3()?;
        let disp_vert_start = r.read_i32()?;
        let disp_tri_start = r.read_i32()?;
        let power = r.read_i32()?;
        let min_tess = r.read_i32()?;
        let smoothing_angle = r.read_f32()?;
        let contents = r.read_i32()?;
        let map_face = r.read_u16()?;
        r.skip(2)?;
        let lightmap_alpha_start = r.read_i32()?;
        let lightmap_sample_position_start = r.read_i32()?;
        // edge neighbours (48), corner neighbours (40), allowed verts (40)
        r.skip(128)?;
        Ok(Self {
            start_position,
            disp_vert_start,
            disp_tri_start,
            power,
            min_tess,
            smoothing_angle,
            contents,
            map_face,
            lightmap_alpha_start,
            lightmap_sample_position_start,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispVert {
    /// Unit offset direction
    pub vec: Vec3,
    pub dist: f32,
    /// Blend alpha, 0..255
    pub alpha: f32,
}

impl Record for DispVert {
    const SIZE: usize = 20;
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            vec: r.read_vec3()?,
            dist: r.read_f32()?,
            alpha: r.read_f32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one<T: Record>(bytes: &[u8]) -> T {
        assert_eq!(bytes.len(), T::SIZE);
        let mut r = BinaryReader::new(bytes);
        let value = T::read(&mut r).unwrap();
        assert_eq!(r.position(), T::SIZE, "record did not consume its size");
        value
    }

    fn le(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_face_layout() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&7u16.to_le_bytes());
        bytes.push(1);
        bytes.push(0);
        bytes.extend_from_slice(&100i32.to_le_bytes());
        bytes.extend_from_slice(&4i16.to_le_bytes());
        bytes.extend_from_slice(&2i16.to_le_bytes());
        bytes.extend_from_slice(&(-1i16).to_le_bytes());
        bytes.extend_from_slice(&(-1i16).to_le_bytes());
        bytes.extend_from_slice(&[0, 255, 255, 255]);
        bytes.extend_from_slice(&le(&[64]));
        bytes.extend_from_slice(&16.0f32.to_le_bytes());
        bytes.extend_from_slice(&le(&[-3, 5, 7, 8, 2]));
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0x3u32.to_le_bytes());

        let face: Face = read_one(&bytes);
        assert_eq!(face.plane, 7);
        assert_eq!(face.side, 1);
        assert_eq!(face.first_edge, 100);
        assert_eq!(face.num_edges, 4);
        assert_eq!(face.texinfo, 2);
        assert!(!face.has_displacement());
        assert_eq!(face.light_offset, 64);
        assert_eq!(face.lightmap_mins, [-3, 5]);
        assert_eq!(face.lightmap_size, [7, 8]);
        assert_eq!(face.smoothing_groups, 3);
    }

    #[test]
    fn test_dispinfo_layout() {
        let mut bytes = Vec::new();
        for f in [1.0f32, 2.0, 3.0] {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        bytes.extend_from_slice(&le(&[25, 32, 2, 0]));
        bytes.extend_from_slice(&0.0f32.to_le_bytes());
        bytes.extend_from_slice(&le(&[1]));
        bytes.extend_from_slice(&9u16.to_le_bytes());
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(&le(&[0, 0]));
        bytes.resize(176, 0);

        let disp: DispInfo = read_one(&bytes);
        assert_eq!(disp.start_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(disp.disp_vert_start, 25);
        assert_eq!(disp.power, 2);
        assert_eq!(disp.map_face, 9);
        assert_eq!(disp.grid_size(), 5);
        assert_eq!(disp.vertex_count(), 25);
    }

    #[test]
    fn test_texinfo_layout() {
        let mut bytes = Vec::new();
        for f in [1.0f32, 0.0, 0.0, 8.0, 0.0, 1.0, 0.0, 0.0] {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        for f in [0.0625f32, 0.0, 0.0, 0.0, 0.0, 0.0625, 0.0, 0.0] {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        bytes.extend_from_slice(&le(&[SURF_SKY | SURF_NOLIGHT, 3]));
        let ti: TexInfo = read_one(&bytes);
        assert_eq!(ti.texture_vecs[0].w, 8.0);
        assert_eq!(ti.lightmap_vecs[1].y, 0.0625);
        assert!(ti.has_flag(SURF_SKY));
        assert!(!ti.has_flag(SURF_NODRAW));
        assert_eq!(ti.texdata, 3);
    }

    #[test]
    fn test_plane_distance() {
        let p = Plane {
            normal: Vec3::Z,
            dist: 64.0,
            kind: 2,
        };
        assert_eq!(p.distance(Vec3::new(5.0, 5.0, 64.0)), 0.0);
        assert_eq!(p.distance(Vec3::new(0.0, 0.0, 0.0)), -64.0);
    }
}
