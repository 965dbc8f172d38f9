//! vsrc-bsp: decoder for compiled Source engine levels (VBSP)
//!
//! Reads the 64-entry lump directory and decodes the lumps needed to
//! rebuild renderable geometry: planes, vertices, edges, faces, texture
//! projection, brush models, brushes and displacements. The entity lump and
//! the static prop game lump are decoded alongside.
//!
//! # Usage
//!
//! ```ignore
//! let data = std::fs::read("maps/de_example.bsp")?;
//! let level = vsrc_bsp::decode_level(&data)?;
//! for face in &level.faces {
//!     let points = level.face_loop(face)?;
//!     let material = level.texture_name(face.texinfo as i64)?;
//! }
//! ```
//!
//! Records are decoded whole: a lump whose byte length is not a multiple of
//! its record size is reported as [`DecodeError::TruncatedLump`] and nothing
//! is returned for it.
//!
//! [`DecodeError::TruncatedLump`]: vsrc_common::DecodeError::TruncatedLump

mod document;
mod entities;
mod game_lump;
mod header;
pub mod lumps;

pub use document::{KNOWN_VERSIONS, LevelDocument, checked, decode_level};
pub use entities::{Entity, parse_entities, parse_vec3};
pub use game_lump::{
    GameLump, STATIC_PROP_LUMP_ID, StaticProp, StaticProps, decode_game_lumps, decode_static_props,
};
pub use header::{BSP_IDENT, BspHeader, LUMP_COUNT, LumpEntry, LumpKind};
pub use lumps::{
    Brush, BrushSide, DispInfo, DispVert, Edge, Face, Model, Plane, Record, TexData, TexInfo,
    decode_lump,
};
