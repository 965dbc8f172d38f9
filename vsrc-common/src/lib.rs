//! Shared building blocks for the Source asset decoders
//!
//! This crate is used by every format crate (`vsrc-bsp`, `vsrc-vtf`,
//! `vsrc-vmt`, `vsrc-mdl`) and by the `vsrc-export` tool.
//!
//! # Modules
//!
//! - [`reader`] - bounds-checked little-endian cursor
//! - [`error`] - [`DecodeError`], the structural failure kinds
//! - [`diagnostics`] - non-fatal warnings recorded per asset
//! - [`coord`] - source → target coordinate conversion
//! - [`mesh`], [`material`], [`texture`], [`skeleton`] - intermediate outputs
//! - [`codec`] - pixel/audio codec and asset emitter contracts

pub mod codec;
pub mod coord;
pub mod diagnostics;
pub mod error;
pub mod material;
pub mod mesh;
pub mod reader;
pub mod skeleton;
pub mod texture;

pub use codec::{Asset, AssetEmitter, AudioCodec, PcmSound, PixelCodec};
pub use coord::{CoordTransform, INCHES_TO_METERS};
pub use diagnostics::{Diagnostics, Warning};
pub use error::{DecodeError, DecodeResult};
pub use material::{Archetype, Material, SlotValue};
pub use mesh::{ConvexHull, Mesh, SkinWeights, Vertex, MAX_INFLUENCES};
pub use reader::{string_from_bytes, BinaryReader};
pub use skeleton::{Animation, Bone, BoneTrack, Skeleton, Transform};
pub use texture::{max_mip_count, mip_dimension, MipLevel, PixelFormat, Texture};
