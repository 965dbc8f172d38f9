//! Collaborator contracts: pixel/audio codecs and the asset emitter
//!
//! The pipeline never decompresses pixels or audio itself and never touches
//! the host engine. These traits are the seams where those collaborators
//! plug in.

use crate::material::Material;
use crate::mesh::Mesh;
use crate::skeleton::{Animation, Skeleton};
use crate::texture::{PixelFormat, Texture};

/// Decodes one image in a source pixel format to tightly packed RGBA8
pub trait PixelCodec: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn decode(
        &self,
        format: PixelFormat,
        bytes: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, Self::Error>;
}

/// Interleaved 16-bit PCM
#[derive(Debug, Clone, PartialEq)]
pub struct PcmSound {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl PcmSound {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f32 / self.sample_rate as f32
    }
}

/// Decodes a compressed sound file to PCM
pub trait AudioCodec: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn decode(&self, bytes: &[u8]) -> Result<PcmSound, Self::Error>;
}

/// Any intermediate output the emitter may receive
#[derive(Debug, Clone, Copy)]
pub enum Asset<'a> {
    Mesh(&'a Mesh),
    Material(&'a Material),
    Texture(&'a Texture),
    Skeleton(&'a Skeleton),
    Animation(&'a Animation),
    Sound(&'a PcmSound),
}

impl Asset<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Asset::Mesh(_) => "mesh",
            Asset::Material(_) => "material",
            Asset::Texture(_) => "texture",
            Asset::Skeleton(_) => "skeleton",
            Asset::Animation(_) => "animation",
            Asset::Sound(_) => "sound",
        }
    }
}

/// Persists intermediate outputs in the host engine and returns a handle
pub trait AssetEmitter {
    type Handle;
    type Error;

    fn emit(&mut self, name: &str, asset: Asset<'_>) -> Result<Self::Handle, Self::Error>;
}
