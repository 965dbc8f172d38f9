//! File emitter: writes intermediate assets under an output directory
//!
//! Asset names may contain `/`; each segment becomes a subdirectory.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use vsrc_common::{Asset, AssetEmitter};

use crate::audio::encode_wav;
use crate::formats::{write_vanim, write_vmesh, write_vskel};
use crate::texture::{RawPixelCodec, TextureFormat, decode_top_mip, encode_image};

pub const MESH_EXT: &str = "vmesh";
pub const SKELETON_EXT: &str = "vskel";
pub const ANIMATION_EXT: &str = "vanim";
pub const MATERIAL_EXT: &str = "json";
pub const SOUND_EXT: &str = "wav";

#[derive(Debug)]
pub struct FileEmitter {
    dir: PathBuf,
    texture_format: TextureFormat,
    codec: RawPixelCodec,
    written: Vec<PathBuf>,
}

impl FileEmitter {
    pub fn new(dir: impl Into<PathBuf>, texture_format: TextureFormat) -> Self {
        Self {
            dir: dir.into(),
            texture_format,
            codec: RawPixelCodec,
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every file written so far, in order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }

    /// Output path for an asset name, creating parent directories
    pub fn path_for(&self, name: &str, ext: &str) -> Result<PathBuf> {
        let relative: PathBuf = name
            .replace('\\', "/")
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .collect();
        if relative.as_os_str().is_empty() {
            anyhow::bail!("Empty asset name");
        }
        let mut path = self.dir.join(relative);
        let file = path
            .file_name()
            .map(|f| format!("{}.{}", f.to_string_lossy(), ext))
            .unwrap_or_default();
        path.set_file_name(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        Ok(path)
    }

    /// Serialize any value as pretty JSON next to the other outputs
    pub fn write_json<T: Serialize>(&mut self, name: &str, ext: &str, value: &T) -> Result<PathBuf> {
        let path = self.path_for(name, ext)?;
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), value)
            .with_context(|| format!("Failed to write {:?}", path))?;
        self.written.push(path.clone());
        Ok(path)
    }

    fn write_bytes(&mut self, path: PathBuf, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
        self.written.push(path.clone());
        Ok(path)
    }

    fn write_with<F>(&mut self, path: PathBuf, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut w = BufWriter::new(file);
        write(&mut w).with_context(|| format!("Failed to write {:?}", path))?;
        std::io::Write::flush(&mut w)?;
        self.written.push(path.clone());
        Ok(path)
    }
}

impl AssetEmitter for FileEmitter {
    type Handle = PathBuf;
    type Error = anyhow::Error;

    fn emit(&mut self, name: &str, asset: Asset<'_>) -> Result<PathBuf> {
        match asset {
            Asset::Mesh(mesh) => {
                let path = self.path_for(name, MESH_EXT)?;
                self.write_with(path, |w| write_vmesh(w, mesh))
            }
            Asset::Skeleton(skeleton) => {
                let path = self.path_for(name, SKELETON_EXT)?;
                self.write_with(path, |w| write_vskel(w, skeleton))
            }
            Asset::Animation(animation) => {
                let path = self.path_for(name, ANIMATION_EXT)?;
                self.write_with(path, |w| write_vanim(w, animation))
            }
            Asset::Material(material) => self.write_json(name, MATERIAL_EXT, material),
            Asset::Texture(texture) => {
                let image = decode_top_mip(texture, &self.codec)?;
                let bytes = encode_image(&image, self.texture_format, texture.linear)?;
                let path = self.path_for(name, self.texture_format.extension())?;
                self.write_bytes(path, &bytes)
            }
            Asset::Sound(sound) => {
                let bytes = encode_wav(sound)?;
                let path = self.path_for(name, SOUND_EXT)?;
                self.write_bytes(path, &bytes)
            }
        }
    }
}
