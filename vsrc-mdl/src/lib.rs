//! vsrc-mdl: decoder for compiled studio models
//!
//! A studio model is split across several files sharing a checksum:
//!
//! - `.mdl` - header, bones, textures, skin families, body parts, animations
//! - `.vvd` - vertex positions, normals, UVs and bone weights
//! - `.vtx` - per-LOD strip groups indexing into the vertex data
//! - `.phy` - convex collision pieces (optional)
//!
//! [`decode_model`] reads whichever are present into a [`ModelDocument`].
//! Everything stays in source space; conversion happens in the export tool.

mod anim;
mod bodyparts;
mod bones;
mod document;
mod header;
mod phy;
mod textures;
mod vtx;
mod vvd;

pub use anim::{
    ANIM_ALLZEROS, ANIM_DELTA, ANIM_LOOPING, AnimDesc, anim_value, decode_animation,
    quaternion48, quaternion64, read_anim_descs, vector48,
};
pub use bodyparts::{BodyPart, StudioMesh, StudioModel, read_body_parts};
pub use bones::{
    BONE_PHYSICALLY_SIMULATED, BONE_USED_BY_VERTEX_LOD0, StudioBone, read_bones,
};
pub use document::{
    LodGeometry, LodMesh, ModelDocument, ModelFiles, VTX_EXTENSIONS, decode_model,
};
pub use header::{FLAG_STATIC_PROP, MDL_IDENT, SUPPORTED_VERSIONS, StudioHeader, Table};
pub use phy::{PhysHull, PhysSolid, PhysicsData, SolidInfo, decode_phy, ivp_to_source};
pub use textures::{StudioTexture, read_cd_textures, read_skins, read_textures};
pub use vtx::{
    MaterialReplacement, Strip, StripData, StripGroup, StripKind, StripVertex, VtxBodyPart,
    VtxLayout, VtxLod, VtxMesh, VtxModel, decode_vtx, decode_vtx_for_model, expand_strip,
};
pub use vvd::{Fixup, Influences, StudioVertex, VertexData, decode_vvd};
