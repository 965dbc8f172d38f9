//! Body parts, their model variants, and per-material meshes
//!
//! ```text
//! mstudiobodyparts_t  16 bytes   nameindex, nummodels, base, modelindex
//! mstudiomodel_t     148 bytes   name[64], ..., nummeshes, meshindex, vertexindex
//! mstudiomesh_t      116 bytes   material, ..., numvertices, vertexoffset
//! ```
//!
//! `nameindex`, `modelindex` and `meshindex` are relative to their own
//! record. A model's `vertexindex` is a byte offset into the VVD vertex
//! array, 48 bytes per vertex.

use glam::Vec3;
use vsrc_common::{BinaryReader, DecodeResult};

use crate::bones::relative_string;
use crate::header::StudioHeader;
use crate::vvd::VVD_VERTEX_SIZE;

pub const BODYPART_RECORD_SIZE: usize = 16;
pub const MODEL_RECORD_SIZE: usize = 148;
pub const MESH_RECORD_SIZE: usize = 116;

#[derive(Debug, Clone, PartialEq)]
pub struct StudioMesh {
    /// Skin reference, mapped to a texture through the skin table
    pub material: i32,
    pub vertex_count: usize,
    /// First vertex relative to the owning model
    pub vertex_offset: usize,
    pub mesh_id: i32,
    pub center: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudioModel {
    pub name: String,
    pub radius: f32,
    pub vertex_count: usize,
    /// First vertex of this model in the VVD vertex array
    pub first_vertex: usize,
    pub meshes: Vec<StudioMesh>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyPart {
    pub name: String,
    pub base: i32,
    pub models: Vec<StudioModel>,
}

pub fn read_body_parts(data: &[u8], header: &StudioHeader) -> DecodeResult<Vec<BodyPart>> {
    let mut parts = Vec::with_capacity(header.body_parts.count.min(64));
    for i in 0..header.body_parts.count {
        let base = header.body_parts.record(i, BODYPART_RECORD_SIZE);
        let mut r = BinaryReader::at(data, base)?;
        let name_offset = r.read_i32()?;
        let model_count = r.read_i32()?.max(0) as usize;
        let part_base = r.read_i32()?;
        let model_offset = r.read_i32()?;
        let name = relative_string(&mut r, base, name_offset)?;

        let models = (0..model_count)
            .map(|m| {
                let at = base as i64 + model_offset as i64 + (m * MODEL_RECORD_SIZE) as i64;
                read_model(data, at.max(0) as usize)
            })
            .collect::<DecodeResult<Vec<_>>>()?;
        parts.push(BodyPart {
            name,
            base: part_base,
            models,
        });
    }
    Ok(parts)
}

fn read_model(data: &[u8], base: usize) -> DecodeResult<StudioModel> {
    let mut r = BinaryReader::at(data, base)?;
    let name = r.read_fixed_string(64)?;
    let _model_type = r.read_i32()?;
    let radius = r.read_f32()?;
    let mesh_count = r.read_i32()?.max(0) as usize;
    let mesh_offset = r.read_i32()?;
    let vertex_count = r.read_i32()?.max(0) as usize;
    let vertex_index = r.read_i32()?.max(0) as usize;

    let meshes = (0..mesh_count)
        .map(|m| {
            let at = base as i64 + mesh_offset as i64 + (m * MESH_RECORD_SIZE) as i64;
            read_mesh(data, at.max(0) as usize)
        })
        .collect::<DecodeResult<Vec<_>>>()?;

    Ok(StudioModel {
        name,
        radius,
        vertex_count,
        first_vertex: vertex_index / VVD_VERTEX_SIZE,
        meshes,
    })
}

fn read_mesh(data: &[u8], base: usize) -> DecodeResult<StudioMesh> {
    let mut r = BinaryReader::at(data, base)?;
    let material = r.read_i32()?;
    let _model_index = r.read_i32()?;
    let vertex_count = r.read_i32()?.max(0) as usize;
    let vertex_offset = r.read_i32()?.max(0) as usize;
    // numflexes, flexindex, materialtype, materialparam
    r.skip(16)?;
    let mesh_id = r.read_i32()?;
    let center = r.read_vec3()?;
    Ok(StudioMesh {
        material,
        vertex_count,
        vertex_offset,
        mesh_id,
        center,
    })
}
