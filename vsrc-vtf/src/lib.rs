//! vsrc-vtf: decoder for Valve Texture Format (VTF) containers
//!
//! Handles versions 7.0 through 7.5, including the resource directory used
//! from 7.3 on. The decoder locates every mip level from the per-format size
//! formula and copies the raw bytes out. Pixel decompression is left to a
//! [`PixelCodec`](vsrc_common::PixelCodec).

mod document;
mod header;

pub use document::{TextureDocument, decode_texture, mip_level_size};
pub use header::{
    FLAG_ANISOTROPIC, FLAG_CLAMP_S, FLAG_CLAMP_T, FLAG_EIGHT_BIT_ALPHA, FLAG_ENVMAP, FLAG_NO_MIP,
    FLAG_NORMAL, FLAG_ONE_BIT_ALPHA, FLAG_POINT_SAMPLE, FLAG_SRGB, FLAG_TRILINEAR, MAX_RESOURCES,
    RESOURCE_IMAGE, RESOURCE_LOW_RES_IMAGE, RESOURCE_NO_DATA_CHUNK, ResourceData, ResourceEntry,
    VTF_MAJOR_VERSION, VTF_MAX_MINOR_VERSION, VTF_SIGNATURE, VtfHeader,
};
