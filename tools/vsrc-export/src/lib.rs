//! vsrc-export library
//!
//! Turns decoded Source assets into engine-agnostic outputs:
//!
//! - [`geometry`] - level faces, displacements, lightmaps and collision
//! - [`material`] - material scripts to archetype + slot descriptions
//! - [`model`] - studio models to skeleton, LOD meshes, animations, hulls
//! - [`texture`], [`audio`] - built-in pixel and audio codecs
//! - [`emit`], [`formats`] - the file emitter and its binary formats
//! - [`manifest`], [`convert`], [`batch`] - manifest-driven conversion,
//!   including detail, sound and soundscape scripts

pub mod audio;
pub mod batch;
pub mod convert;
pub mod emit;
pub mod formats;
pub mod geometry;
pub mod manifest;
pub mod material;
pub mod model;
pub mod texture;

pub use batch::{BatchReport, JobReport, build_all, run_jobs};
pub use emit::FileEmitter;
pub use geometry::{GeometryOptions, LevelGeometry, reconstruct_level};
pub use manifest::{AssetKind, Job, Manifest, Settings, load_manifest};
pub use material::{MaterialSet, translate_material};
pub use model::{AssembledModel, ModelOptions, assemble_model};
