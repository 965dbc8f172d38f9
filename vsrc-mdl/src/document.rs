//! Decoded studio model: the `.mdl` plus its companion files

use vsrc_common::{Animation, DecodeError, DecodeResult};

use crate::anim::{AnimDesc, decode_animation, read_anim_descs};
use crate::bodyparts::{BodyPart, read_body_parts};
use crate::bones::{StudioBone, read_bones};
use crate::header::StudioHeader;
use crate::phy::{PhysicsData, decode_phy};
use crate::textures::{StudioTexture, read_cd_textures, read_skins, read_textures};
use crate::vtx::{StripData, decode_vtx_for_model};
use crate::vvd::{StudioVertex, VertexData, decode_vvd};

/// Companion file extensions, in the order they are searched
pub const VTX_EXTENSIONS: [&str; 4] = [".vtx", ".dx90.vtx", ".dx80.vtx", ".sw.vtx"];

/// Raw bytes of a model and whichever companions were found
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelFiles<'a> {
    pub mdl: &'a [u8],
    pub vvd: Option<&'a [u8]>,
    pub vtx: Option<&'a [u8]>,
    pub phy: Option<&'a [u8]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDocument {
    pub header: StudioHeader,
    pub bones: Vec<StudioBone>,
    pub textures: Vec<StudioTexture>,
    pub cd_textures: Vec<String>,
    pub skins: Vec<Vec<u16>>,
    pub body_parts: Vec<BodyPart>,
    pub anim_descs: Vec<AnimDesc>,
    pub animations: Vec<Animation>,
    /// Animations stored in external `.ani` blocks
    pub external_animations: Vec<String>,
    pub vertices: Option<VertexData>,
    pub strips: Option<StripData>,
    pub physics: Option<PhysicsData>,
}

/// Triangles of one MDL mesh at one LOD
#[derive(Debug, Clone, PartialEq)]
pub struct LodMesh {
    pub body_part: usize,
    pub mesh: usize,
    /// Skin reference of the mesh
    pub material: i32,
    /// Material name that replaces the skin reference at this LOD
    pub replacement: Option<String>,
    /// Indices into [`LodGeometry::vertices`]
    pub triangles: Vec<[u32; 3]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LodGeometry {
    pub lod: usize,
    pub switch_point: f32,
    pub vertices: Vec<StudioVertex>,
    pub meshes: Vec<LodMesh>,
}

impl LodGeometry {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.triangles.len()).sum()
    }
}

/// Decode a model and its companions.
///
/// Companion checksums must match the model's; a mismatch means the files
/// come from different compiles and is reported as a malformed header.
pub fn decode_model(files: ModelFiles<'_>) -> DecodeResult<ModelDocument> {
    let data = files.mdl;
    let header = StudioHeader::read(data)?;
    let bones = read_bones(data, &header)?;
    let textures = read_textures(data, &header)?;
    let cd_textures = read_cd_textures(data, &header)?;
    let skins = read_skins(data, &header)?;
    let body_parts = read_body_parts(data, &header)?;
    let anim_descs = read_anim_descs(data, &header)?;

    let mut animations = Vec::with_capacity(anim_descs.len());
    let mut external_animations = Vec::new();
    for desc in &anim_descs {
        match decode_animation(data, desc, &bones)? {
            Some(anim) => animations.push(anim),
            None => external_animations.push(desc.name.clone()),
        }
    }

    let vertices = files.vvd.map(decode_vvd).transpose()?;
    if let Some(vvd) = &vertices {
        check_checksum("vvd", header.checksum, vvd.checksum)?;
    }
    let strips = files
        .vtx
        .map(|vtx| decode_vtx_for_model(vtx, header.version))
        .transpose()?;
    if let Some(vtx) = &strips {
        check_checksum("vtx", header.checksum, vtx.checksum)?;
    }
    let physics = files.phy.map(decode_phy).transpose()?;
    if let Some(phy) = &physics {
        check_checksum("phy", header.checksum, phy.checksum)?;
    }

    tracing::debug!(
        "Decoded model '{}' v{}: {} bones, {} body parts, {} animations",
        header.name,
        header.version,
        bones.len(),
        body_parts.len(),
        animations.len()
    );

    Ok(ModelDocument {
        header,
        bones,
        textures,
        cd_textures,
        skins,
        body_parts,
        anim_descs,
        animations,
        external_animations,
        vertices,
        strips,
        physics,
    })
}

fn check_checksum(what: &str, expected: i32, found: i32) -> DecodeResult<()> {
    if expected != found {
        return Err(DecodeError::malformed(format!(
            "{} checksum {} does not match model checksum {}",
            what, found, expected
        )));
    }
    Ok(())
}

impl ModelDocument {
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// LODs present in both the strip and vertex data
    pub fn lod_count(&self) -> usize {
        match (&self.strips, &self.vertices) {
            (Some(vtx), Some(vvd)) => vtx.lod_count.min(vvd.lod_count.max(1)),
            _ => 0,
        }
    }

    /// Texture index bound to a skin reference in a skin family. Family 0
    /// is the default; out-of-range families fall back to it.
    pub fn skin_texture(&self, family: usize, skin_ref: i32) -> Option<&StudioTexture> {
        let skin_ref = usize::try_from(skin_ref).ok()?;
        let row = self.skins.get(family).or_else(|| self.skins.first());
        let texture = match row {
            Some(row) => *row.get(skin_ref)? as usize,
            None => skin_ref,
        };
        self.textures.get(texture)
    }

    /// Candidate material paths for a texture, one per search directory
    pub fn material_candidates(&self, texture: &StudioTexture) -> Vec<String> {
        let name = texture.name.replace('\\', "/").to_ascii_lowercase();
        if self.cd_textures.is_empty() {
            return vec![name];
        }
        self.cd_textures
            .iter()
            .map(|dir| format!("{}{}", dir, name))
            .collect()
    }

    /// Triangles of every mesh at `lod`, using the first model of each
    /// body part. Vertices are the LOD 0 array every LOD indexes into.
    pub fn lod_geometry(&self, lod: usize) -> DecodeResult<LodGeometry> {
        let (Some(vvd), Some(vtx)) = (&self.vertices, &self.strips) else {
            return Err(DecodeError::malformed("model has no vertex or strip data"));
        };
        let vertices = vvd.lod_vertices(0)?;
        let mut switch_point = 0.0;
        let mut meshes = Vec::new();

        for (part_index, part) in self.body_parts.iter().enumerate() {
            let Some(model) = part.models.first() else {
                continue;
            };
            let vtx_lod = vtx
                .body_parts
                .get(part_index)
                .and_then(|p| p.models.first())
                .and_then(|m| m.lods.get(lod));
            let Some(vtx_lod) = vtx_lod else {
                continue;
            };
            switch_point = vtx_lod.switch_point;

            for (mesh_index, (mesh, vtx_mesh)) in
                model.meshes.iter().zip(&vtx_lod.meshes).enumerate()
            {
                let base = model.first_vertex + mesh.vertex_offset;
                let mut triangles = Vec::new();
                for group in &vtx_mesh.strip_groups {
                    for tri in group.triangles() {
                        let mut out = [0u32; 3];
                        for (slot, local) in out.iter_mut().zip(tri) {
                            let orig = group.vertices[local as usize].orig_mesh_vertex as usize;
                            let global = base + orig;
                            if global >= vertices.len() {
                                return Err(DecodeError::InvalidIndex {
                                    what: "model vertex",
                                    index: global as i64,
                                    count: vertices.len(),
                                });
                            }
                            *slot = global as u32;
                        }
                        triangles.push(out);
                    }
                }
                if triangles.is_empty() {
                    continue;
                }
                meshes.push(LodMesh {
                    body_part: part_index,
                    mesh: mesh_index,
                    material: mesh.material,
                    replacement: vtx.replacement(lod, mesh.material).map(str::to_string),
                    triangles,
                });
            }
        }

        Ok(LodGeometry {
            lod,
            switch_point,
            vertices,
            meshes,
        })
    }
}
