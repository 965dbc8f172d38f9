//! Vertex data file (`.vvd`)
//!
//! # Layout
//! ```text
//! header   64 bytes   id "IDSV", version 4, checksum, numLODs, numLODVertexes[8],
//!                     numFixups, fixupTableStart, vertexDataStart, tangentDataStart
//! fixups   12 bytes   lod, sourceVertexID, numVertexes
//! vertex   48 bytes   weights[3] f32, bones[3] u8, numbones u8, pos, normal, uv
//! tangent  16 bytes   xyz + handedness
//! ```
//!
//! Without fixups the stored array is already the LOD 0 order. With fixups,
//! the array for LOD `l` is the concatenation of every fixup range whose
//! `lod >= l`.

use glam::{Vec2, Vec3, Vec4};
use smallvec::SmallVec;
use vsrc_common::{BinaryReader, DecodeError, DecodeResult};

/// `"IDSV"` little-endian
pub const VVD_IDENT: u32 = 0x5653_4449;
pub const VVD_VERSION: i32 = 4;
pub const VVD_VERTEX_SIZE: usize = 48;
pub const MAX_LODS: usize = 8;

/// Up to three bone influences as stored on disk
pub type Influences = SmallVec<[(u8, f32); 3]>;

#[derive(Debug, Clone, PartialEq)]
pub struct StudioVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub influences: Influences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixup {
    pub lod: i32,
    pub source_vertex: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexData {
    pub checksum: i32,
    pub lod_count: usize,
    pub lod_vertex_counts: [usize; MAX_LODS],
    pub fixups: Vec<Fixup>,
    /// Raw stored order
    pub vertices: Vec<StudioVertex>,
    /// Parallel to `vertices` when present
    pub tangents: Vec<Vec4>,
}

impl VertexData {
    /// Vertex array for one LOD with fixups applied
    pub fn lod_vertices(&self, lod: usize) -> DecodeResult<Vec<StudioVertex>> {
        if self.fixups.is_empty() {
            return Ok(self.vertices.clone());
        }
        let mut out = Vec::with_capacity(self.lod_vertex_counts.get(lod).copied().unwrap_or(0));
        for fixup in self.fixups.iter().filter(|f| f.lod >= lod as i32) {
            let range = self
                .vertices
                .get(fixup.source_vertex..fixup.source_vertex + fixup.count)
                .ok_or(DecodeError::InvalidIndex {
                    what: "vvd fixup vertex",
                    index: (fixup.source_vertex + fixup.count) as i64,
                    count: self.vertices.len(),
                })?;
            out.extend_from_slice(range);
        }
        Ok(out)
    }
}

pub fn decode_vvd(data: &[u8]) -> DecodeResult<VertexData> {
    let mut r = BinaryReader::new(data);
    let ident = r
        .read_u32()
        .map_err(|_| DecodeError::malformed("vvd header is truncated"))?;
    if ident != VVD_IDENT {
        return Err(DecodeError::malformed(format!("bad vvd ident 0x{:08x}", ident)));
    }
    let version = r.read_i32()?;
    if version != VVD_VERSION {
        return Err(DecodeError::malformed(format!("vvd version {} (expected 4)", version)));
    }
    let checksum = r.read_i32()?;
    let lod_count = r.read_i32()?.clamp(0, MAX_LODS as i32) as usize;
    let mut lod_vertex_counts = [0usize; MAX_LODS];
    for count in lod_vertex_counts.iter_mut() {
        *count = r.read_i32()?.max(0) as usize;
    }
    let fixup_count = r.read_i32()?.max(0) as usize;
    let fixup_start = r.read_i32()?.max(0) as usize;
    let vertex_start = r.read_i32()?.max(0) as usize;
    let tangent_start = r.read_i32()?.max(0) as usize;

    let mut r = BinaryReader::at(data, fixup_start)?;
    let fixups = (0..fixup_count)
        .map(|_| {
            Ok(Fixup {
                lod: r.read_i32()?,
                source_vertex: r.read_i32()?.max(0) as usize,
                count: r.read_i32()?.max(0) as usize,
            })
        })
        .collect::<DecodeResult<Vec<_>>>()?;

    let vertex_count = lod_vertex_counts[0];
    let mut r = BinaryReader::at(data, vertex_start)?;
    let vertices = (0..vertex_count)
        .map(|_| read_vertex(&mut r))
        .collect::<DecodeResult<Vec<_>>>()?;

    let tangents = if tangent_start > 0 {
        let mut r = BinaryReader::at(data, tangent_start)?;
        (0..vertex_count)
            .map(|_| r.read_vec4())
            .collect::<DecodeResult<Vec<_>>>()?
    } else {
        Vec::new()
    };

    Ok(VertexData {
        checksum,
        lod_count,
        lod_vertex_counts,
        fixups,
        vertices,
        tangents,
    })
}

fn read_vertex(r: &mut BinaryReader) -> DecodeResult<StudioVertex> {
    let weights = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let bones = r.read_array::<3>()?;
    let bone_count = r.read_u8()?.min(3) as usize;
    let position = r.read_vec3()?;
    let normal = r.read_vec3()?;
    let uv = r.read_vec2()?;
    let influences = bones
        .iter()
        .zip(weights)
        .take(bone_count)
        .map(|(b, w)| (*b, w))
        .collect();
    Ok(StudioVertex {
        position,
        normal,
        uv,
        influences,
    })
}
