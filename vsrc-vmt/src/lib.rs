//! vsrc-vmt: parser for Valve Material Type (VMT) scripts
//!
//! A VMT is a KeyValues document whose root key names the shader:
//!
//! ```text
//! "LightmappedGeneric"
//! {
//!     "$basetexture" "concrete/floor01"
//!     "$surfaceprop" "concrete"
//!     ">=dx90" { "$bumpmap" "concrete/floor01_normal" }
//! }
//! ```
//!
//! [`parse_material`] produces a [`MaterialDocument`] with case-insensitive
//! unique keys and typed values. Translation into engine materials lives in
//! the export tool.

mod document;
mod error;
mod keyvalues;
mod lexer;
mod value;

pub use document::{
    DEFAULT_DX_LEVEL, DEFAULT_GPU_LEVEL, MaterialDocument, Param, ParseOptions, dx_condition,
    normalize_texture_path, parse_material,
};
pub use error::VmtError;
pub use keyvalues::{
    Entry, KeyValues, Node, parse_keyvalues, parse_keyvalues_document, platform_condition_holds,
};
pub use value::{Value, parse_texture_transform, parse_vector};
