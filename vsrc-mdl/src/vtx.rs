//! Optimised strip data (`.vtx`, version 7)
//!
//! # Layout
//! ```text
//! FileHeader        36 bytes   version, vertCacheSize, maxBonesPerStrip u16, maxBonesPerTri u16,
//!                              maxBonesPerVert, checkSum, numLODs, materialReplacementListOffset,
//!                              numBodyParts, bodyPartOffset
//! BodyPartHeader     8 bytes   numModels, modelOffset
//! ModelHeader        8 bytes   numLODs, lodOffset
//! ModelLODHeader    12 bytes   numMeshes, meshOffset, switchPoint f32
//! MeshHeader         9 bytes   numStripGroups, stripGroupHeaderOffset, flags u8
//! StripGroupHeader  25 bytes   numVerts, vertOffset, numIndices, indexOffset, numStrips,
//!                              stripOffset, flags u8 (+ numTopologyIndices, topologyOffset)
//! StripHeader       27 bytes   numIndices, indexOffset, numVerts, vertOffset, numBones i16,
//!                              flags u8, numBoneStateChanges, boneStateChangeOffset
//!                              (+ numTopologyIndices, topologyOffset)
//! Vertex             9 bytes   boneWeightIndex[3], numBones, origMeshVertID u16, boneID[3]
//! ```
//!
//! Every offset is relative to the header that holds it and every struct is
//! packed. Newer toolchains append two topology fields to strip groups and
//! strips; that is [`VtxLayout::Extended`].

use vsrc_common::{BinaryReader, DecodeError, DecodeResult};

use crate::bones::relative_string;

pub const VTX_VERSION: i32 = 7;

pub const STRIP_IS_TRILIST: u8 = 0x01;
pub const STRIP_IS_TRISTRIP: u8 = 0x02;

const MESH_HEADER_SIZE: usize = 9;
const VERTEX_SIZE: usize = 9;
const BODYPART_HEADER_SIZE: usize = 8;
const MODEL_HEADER_SIZE: usize = 8;
const LOD_HEADER_SIZE: usize = 12;
const REPLACEMENT_LIST_SIZE: usize = 8;
const REPLACEMENT_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VtxLayout {
    Classic,
    Extended,
}

impl VtxLayout {
    /// Layout written by the toolchain that produced a given MDL version
    pub fn for_model_version(version: i32) -> Self {
        if version >= 49 {
            VtxLayout::Extended
        } else {
            VtxLayout::Classic
        }
    }

    pub fn other(self) -> Self {
        match self {
            VtxLayout::Classic => VtxLayout::Extended,
            VtxLayout::Extended => VtxLayout::Classic,
        }
    }

    fn strip_group_size(self) -> usize {
        match self {
            VtxLayout::Classic => 25,
            VtxLayout::Extended => 33,
        }
    }

    fn strip_size(self) -> usize {
        match self {
            VtxLayout::Classic => 27,
            VtxLayout::Extended => 35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripKind {
    TriList,
    TriStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripVertex {
    /// Vertex index within the owning MDL mesh
    pub orig_mesh_vertex: u16,
    pub bone_count: u8,
    pub bone_ids: [i8; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strip {
    pub kind: StripKind,
    pub index_offset: usize,
    pub index_count: usize,
    pub bone_count: i16,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StripGroup {
    pub flags: u8,
    pub vertices: Vec<StripVertex>,
    /// Indices into `vertices`
    pub indices: Vec<u16>,
    pub strips: Vec<Strip>,
}

impl StripGroup {
    /// Every strip expanded into triangles over `vertices`
    pub fn triangles(&self) -> Vec<[u16; 3]> {
        let mut out = Vec::with_capacity(self.indices.len() / 3);
        for strip in &self.strips {
            let end = strip.index_offset + strip.index_count;
            if let Some(indices) = self.indices.get(strip.index_offset..end) {
                out.extend(expand_strip(indices, strip.kind));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VtxMesh {
    pub flags: u8,
    pub strip_groups: Vec<StripGroup>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VtxLod {
    /// Screen-size threshold at which this LOD takes over
    pub switch_point: f32,
    /// Parallel to the MDL model's meshes
    pub meshes: Vec<VtxMesh>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VtxModel {
    pub lods: Vec<VtxLod>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VtxBodyPart {
    pub models: Vec<VtxModel>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialReplacement {
    pub material: i16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StripData {
    pub checksum: i32,
    pub lod_count: usize,
    pub layout: VtxLayout,
    pub body_parts: Vec<VtxBodyPart>,
    /// One list per LOD
    pub material_replacements: Vec<Vec<MaterialReplacement>>,
}

impl StripData {
    /// Name that replaces `material` at `lod`, if any
    pub fn replacement(&self, lod: usize, material: i32) -> Option<&str> {
        self.material_replacements
            .get(lod)?
            .iter()
            .find(|r| r.material as i32 == material)
            .map(|r| r.name.as_str())
    }
}

/// Expand one strip's indices into triangles.
///
/// Lists are read three at a time. Strips alternate winding so that every
/// triangle keeps the orientation of the first one. Triangles that repeat
/// an index (strip joins) are dropped.
pub fn expand_strip(indices: &[u16], kind: StripKind) -> Vec<[u16; 3]> {
    let mut out = Vec::new();
    match kind {
        StripKind::TriList => {
            for tri in indices.chunks_exact(3) {
                let tri = [tri[0], tri[1], tri[2]];
                if !is_degenerate(tri) {
                    out.push(tri);
                }
            }
        }
        StripKind::TriStrip => {
            for (i, w) in indices.windows(3).enumerate() {
                let tri = if i % 2 == 0 {
                    [w[0], w[1], w[2]]
                } else {
                    [w[1], w[0], w[2]]
                };
                if !is_degenerate(tri) {
                    out.push(tri);
                }
            }
        }
    }
    out
}

fn is_degenerate(tri: [u16; 3]) -> bool {
    tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2]
}

/// Decode with an explicit layout
pub fn decode_vtx(data: &[u8], layout: VtxLayout) -> DecodeResult<StripData> {
    let mut r = BinaryReader::new(data);
    let version = r
        .read_i32()
        .map_err(|_| DecodeError::malformed("vtx header is truncated"))?;
    if version != VTX_VERSION {
        return Err(DecodeError::malformed(format!(
            "vtx version {} (expected {})",
            version, VTX_VERSION
        )));
    }
    // vertCacheSize, maxBonesPerStrip, maxBonesPerTri, maxBonesPerVert
    r.skip(12)?;
    let checksum = r.read_i32()?;
    let lod_count = r.read_i32()?.max(0) as usize;
    let replacement_offset = r.read_i32()?.max(0) as usize;
    let body_part_count = r.read_i32()?.max(0) as usize;
    let body_part_offset = r.read_i32()?.max(0) as usize;

    let mut decoder = Decoder {
        r: BinaryReader::new(data),
        layout,
    };
    let body_parts = (0..body_part_count)
        .map(|i| decoder.body_part(body_part_offset + i * BODYPART_HEADER_SIZE))
        .collect::<DecodeResult<Vec<_>>>()?;
    let material_replacements = if replacement_offset > 0 {
        decoder.replacements(replacement_offset, lod_count)?
    } else {
        Vec::new()
    };

    Ok(StripData {
        checksum,
        lod_count,
        layout,
        body_parts,
        material_replacements,
    })
}

/// Decode with the layout expected for `model_version`, falling back to the
/// other layout when the expected one does not parse
pub fn decode_vtx_for_model(data: &[u8], model_version: i32) -> DecodeResult<StripData> {
    let preferred = VtxLayout::for_model_version(model_version);
    match decode_vtx(data, preferred) {
        Ok(strips) => Ok(strips),
        Err(first) => {
            tracing::debug!("vtx {:?} layout failed ({}), retrying", preferred, first);
            decode_vtx(data, preferred.other()).map_err(|_| first)
        }
    }
}

struct Decoder<'a> {
    r: BinaryReader<'a>,
    layout: VtxLayout,
}

impl Decoder<'_> {
    /// `(count, absolute offset)` pair at `at`, offset relative to `base`
    fn table(&mut self, at: usize, base: usize) -> DecodeResult<(usize, usize)> {
        self.r.seek(at)?;
        let count = self.r.read_i32()?.max(0) as usize;
        let offset = self.r.read_i32()?;
        Ok((count, relative(base, offset)?))
    }

    fn body_part(&mut self, at: usize) -> DecodeResult<VtxBodyPart> {
        let (count, offset) = self.table(at, at)?;
        let models = (0..count)
            .map(|i| self.model(offset + i * MODEL_HEADER_SIZE))
            .collect::<DecodeResult<Vec<_>>>()?;
        Ok(VtxBodyPart { models })
    }

    fn model(&mut self, at: usize) -> DecodeResult<VtxModel> {
        let (count, offset) = self.table(at, at)?;
        let lods = (0..count)
            .map(|i| self.lod(offset + i * LOD_HEADER_SIZE))
            .collect::<DecodeResult<Vec<_>>>()?;
        Ok(VtxModel { lods })
    }

    fn lod(&mut self, at: usize) -> DecodeResult<VtxLod> {
        let (count, offset) = self.table(at, at)?;
        let switch_point = self.r.read_f32()?;
        let meshes = (0..count)
            .map(|i| self.mesh(offset + i * MESH_HEADER_SIZE))
            .collect::<DecodeResult<Vec<_>>>()?;
        Ok(VtxLod {
            switch_point,
            meshes,
        })
    }

    fn mesh(&mut self, at: usize) -> DecodeResult<VtxMesh> {
        let (count, offset) = self.table(at, at)?;
        let flags = self.r.read_u8()?;
        let stride = self.layout.strip_group_size();
        let strip_groups = (0..count)
            .map(|i| self.strip_group(offset + i * stride))
            .collect::<DecodeResult<Vec<_>>>()?;
        Ok(VtxMesh {
            flags,
            strip_groups,
        })
    }

    fn strip_group(&mut self, at: usize) -> DecodeResult<StripGroup> {
        let (vertex_count, vertex_offset) = self.table(at, at)?;
        let (index_count, index_offset) = self.table(at + 8, at)?;
        let (strip_count, strip_offset) = self.table(at + 16, at)?;
        let flags = self.r.read_u8()?;

        let bytes = self.r.slice_at(vertex_offset, vertex_count * VERTEX_SIZE)?;
        let vertices: Vec<StripVertex> = bytes
            .chunks_exact(VERTEX_SIZE)
            .map(|v| StripVertex {
                bone_count: v[3],
                orig_mesh_vertex: u16::from_le_bytes([v[4], v[5]]),
                bone_ids: [v[6] as i8, v[7] as i8, v[8] as i8],
            })
            .collect();

        self.r.seek(index_offset)?;
        let indices = (0..index_count)
            .map(|_| self.r.read_u16())
            .collect::<DecodeResult<Vec<_>>>()?;
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(DecodeError::InvalidIndex {
                what: "vtx strip vertex",
                index: bad as i64,
                count: vertices.len(),
            });
        }

        let stride = self.layout.strip_size();
        let strips = (0..strip_count)
            .map(|i| self.strip(strip_offset + i * stride, indices.len()))
            .collect::<DecodeResult<Vec<_>>>()?;

        Ok(StripGroup {
            flags,
            vertices,
            indices,
            strips,
        })
    }

    fn strip(&mut self, at: usize, group_index_count: usize) -> DecodeResult<Strip> {
        self.r.seek(at)?;
        let index_count = self.r.read_i32()?.max(0) as usize;
        let index_offset = self.r.read_i32()?.max(0) as usize;
        // numVerts, vertOffset
        self.r.skip(8)?;
        let bone_count = self.r.read_i16()?;
        let flags = self.r.read_u8()?;
        let kind = if flags & STRIP_IS_TRISTRIP != 0 {
            StripKind::TriStrip
        } else if flags & STRIP_IS_TRILIST != 0 {
            StripKind::TriList
        } else {
            return Err(DecodeError::malformed(format!(
                "strip at {} has flags 0x{:02x}",
                at, flags
            )));
        };
        if index_offset + index_count > group_index_count {
            return Err(DecodeError::InvalidIndex {
                what: "vtx strip index range",
                index: (index_offset + index_count) as i64,
                count: group_index_count,
            });
        }
        Ok(Strip {
            kind,
            index_offset,
            index_count,
            bone_count,
        })
    }

    fn replacements(
        &mut self,
        at: usize,
        lod_count: usize,
    ) -> DecodeResult<Vec<Vec<MaterialReplacement>>> {
        let mut lists = Vec::with_capacity(lod_count.min(8));
        for lod in 0..lod_count {
            let list_at = at + lod * REPLACEMENT_LIST_SIZE;
            let (count, offset) = self.table(list_at, list_at)?;
            let mut list = Vec::with_capacity(count.min(64));
            for i in 0..count {
                let entry = offset + i * REPLACEMENT_SIZE;
                self.r.seek(entry)?;
                let material = self.r.read_i16()?;
                let name_offset = self.r.read_i32()?;
                let name = relative_string(&mut self.r, entry, name_offset)?;
                list.push(MaterialReplacement { material, name });
            }
            lists.push(list);
        }
        Ok(lists)
    }
}

fn relative(base: usize, offset: i32) -> DecodeResult<usize> {
    let at = base as i64 + offset as i64;
    if at < 0 {
        return Err(DecodeError::malformed(format!(
            "offset {} from {} points before the file",
            offset, base
        )));
    }
    Ok(at as usize)
}
