//! Binary output formats
//!
//! All files are POD little-endian, no magic bytes. Strings are stored as a
//! `u16` byte length followed by UTF-8.
//!
//! # `.vmesh`
//! ```text
//! 0x00: vertex_count u32
//! 0x04: index_count u32
//! 0x08: material_count u16
//! 0x0A: flags u16 (bit 0: skinned)
//! 0x0C: hull_count u32
//! 0x10: vertices      vertex_count × 56 (position, normal, uv, lightmap uv, color)
//!       skin weights  vertex_count × 32 (only when skinned)
//!       indices       index_count × u32
//!       materials     triangle_count × u32 (slot per triangle)
//!       origins       triangle_count × u32 (source face / mesh per triangle)
//!       names         material_count × string
//!       hulls         hull_count × { point_count u32, bone i32, contents u32, points }
//! ```
//!
//! # `.vskel`
//! ```text
//! 0x00: bone_count u32
//! 0x04: bones × { parent i32, translation 3f, rotation 4f, scale 3f,
//!                 inverse bind 16f (column-major), name }
//! ```
//!
//! # `.vanim`
//! ```text
//! 0x00: track_count u16
//! 0x02: flags u16 (bit 0: looping)
//! 0x04: frame_count u32
//! 0x08: fps f32
//! 0x0C: tracks × { bone u32, translation_count u32, rotation_count u32,
//!                  translations 3f each, rotations 4f each }
//! ```
//!
//! # `.vtex`
//! ```text
//! 0x00: width u16
//! 0x02: height u16
//! 0x04: format u8 (0 RGBA8, 1 BC7, 2 BC5)
//! 0x05: flags u8 (bit 0: linear)
//! 0x06: reserved u16
//! 0x08: pixel or block data
//! ```

use anyhow::{Result, bail};
use std::io::Write;
use vsrc_common::{Animation, Mesh, Skeleton};

/// `.vmesh` header (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct VMeshHeader {
    pub vertex_count: u32,
    pub index_count: u32,
    pub material_count: u16,
    pub flags: u16,
    pub hull_count: u32,
}

impl VMeshHeader {
    pub const SIZE: usize = 16;
    pub const FLAG_SKINNED: u16 = 0x1;

    pub fn new(vertex_count: u32, index_count: u32, material_count: u16, flags: u16) -> Self {
        Self {
            vertex_count,
            index_count,
            material_count,
            flags,
            hull_count: 0,
        }
    }

    pub fn is_skinned(&self) -> bool {
        self.flags & Self::FLAG_SKINNED != 0
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.index_count.to_le_bytes());
        bytes[8..10].copy_from_slice(&self.material_count.to_le_bytes());
        bytes[10..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.hull_count.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            vertex_count: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            index_count: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            material_count: u16::from_le_bytes([bytes[8], bytes[9]]),
            flags: u16::from_le_bytes([bytes[10], bytes[11]]),
            hull_count: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }
}

/// `.vskel` header (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct VSkelHeader {
    pub bone_count: u32,
}

impl VSkelHeader {
    pub const SIZE: usize = 4;

    pub fn new(bone_count: u32) -> Self {
        Self { bone_count }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        self.bone_count.to_le_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let head: [u8; 4] = bytes.get(..Self::SIZE)?.try_into().ok()?;
        Some(Self {
            bone_count: u32::from_le_bytes(head),
        })
    }
}

/// `.vanim` header (12 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct VAnimHeader {
    pub track_count: u16,
    pub flags: u16,
    pub frame_count: u32,
    pub fps: f32,
}

impl VAnimHeader {
    pub const SIZE: usize = 12;
    pub const FLAG_LOOPING: u16 = 0x1;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.track_count.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.flags.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.frame_count.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.fps.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            track_count: u16::from_le_bytes([bytes[0], bytes[1]]),
            flags: u16::from_le_bytes([bytes[2], bytes[3]]),
            frame_count: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            fps: f32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        })
    }
}

/// Encoded pixel layout of a `.vtex` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VTexFormat {
    Rgba8 = 0,
    Bc7 = 1,
    Bc5 = 2,
}

impl VTexFormat {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(VTexFormat::Rgba8),
            1 => Some(VTexFormat::Bc7),
            2 => Some(VTexFormat::Bc5),
            _ => None,
        }
    }

    /// Payload size for the given dimensions
    pub fn data_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            VTexFormat::Rgba8 => w * h * 4,
            VTexFormat::Bc7 | VTexFormat::Bc5 => w.div_ceil(4) * h.div_ceil(4) * 16,
        }
    }
}

/// `.vtex` header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct VTexHeader {
    pub width: u16,
    pub height: u16,
    pub format: VTexFormat,
    pub flags: u8,
}

impl VTexHeader {
    pub const SIZE: usize = 8;
    pub const FLAG_LINEAR: u8 = 0x1;

    pub fn new(width: u32, height: u32, format: VTexFormat, linear: bool) -> Self {
        Self {
            width: width as u16,
            height: height as u16,
            format,
            flags: if linear { Self::FLAG_LINEAR } else { 0 },
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.width.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.height.to_le_bytes());
        bytes[4] = self.format as u8;
        bytes[5] = self.flags;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            width: u16::from_le_bytes([bytes[0], bytes[1]]),
            height: u16::from_le_bytes([bytes[2], bytes[3]]),
            format: VTexFormat::from_u8(bytes[4])?,
            flags: bytes[5],
        })
    }
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| anyhow::anyhow!("String too long for u16 length prefix: {}", s.len()))?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn write_f32s<W: Write>(w: &mut W, values: &[f32]) -> Result<()> {
    w.write_all(bytemuck::cast_slice(values))?;
    Ok(())
}

/// Write a complete `.vmesh` file
pub fn write_vmesh<W: Write>(w: &mut W, mesh: &Mesh) -> Result<()> {
    if let Err(reason) = mesh.validate() {
        bail!("Mesh '{}' is inconsistent: {}", mesh.name, reason);
    }
    let material_count = u16::try_from(mesh.materials.len())
        .map_err(|_| anyhow::anyhow!("Mesh '{}' has too many materials", mesh.name))?;
    let flags = if mesh.skin.is_some() {
        VMeshHeader::FLAG_SKINNED
    } else {
        0
    };
    let mut header = VMeshHeader::new(
        mesh.vertices.len() as u32,
        mesh.indices.len() as u32,
        material_count,
        flags,
    );
    header.hull_count = mesh.collision.len() as u32;
    w.write_all(&header.to_bytes())?;

    w.write_all(bytemuck::cast_slice(&mesh.vertices))?;
    if let Some(skin) = &mesh.skin {
        w.write_all(bytemuck::cast_slice(skin))?;
    }
    for list in [&mesh.indices, &mesh.triangle_materials, &mesh.triangle_origins] {
        for v in list.iter() {
            w.write_all(&v.to_le_bytes())?;
        }
    }
    for name in &mesh.materials {
        write_string(w, name)?;
    }
    for hull in &mesh.collision {
        w.write_all(&(hull.points.len() as u32).to_le_bytes())?;
        let bone = hull.bone.map(|b| b as i32).unwrap_or(-1);
        w.write_all(&bone.to_le_bytes())?;
        w.write_all(&hull.contents.to_le_bytes())?;
        for p in &hull.points {
            write_f32s(w, &p.to_array())?;
        }
    }
    Ok(())
}

/// Write a complete `.vskel` file
pub fn write_vskel<W: Write>(w: &mut W, skeleton: &Skeleton) -> Result<()> {
    if let Err(reason) = skeleton.validate() {
        bail!("Skeleton '{}' is invalid: {}", skeleton.name, reason);
    }
    w.write_all(&VSkelHeader::new(skeleton.bones.len() as u32).to_bytes())?;
    let inverse_bind = skeleton.inverse_bind_matrices();
    for (bone, ibm) in skeleton.bones.iter().zip(&inverse_bind) {
        let parent = bone.parent.map(|p| p as i32).unwrap_or(-1);
        w.write_all(&parent.to_le_bytes())?;
        write_f32s(w, &bone.local.translation.to_array())?;
        write_f32s(w, &bone.local.rotation.to_array())?;
        write_f32s(w, &bone.local.scale.to_array())?;
        write_f32s(w, &ibm.to_cols_array())?;
        write_string(w, &bone.name)?;
    }
    Ok(())
}

/// Write a complete `.vanim` file
pub fn write_vanim<W: Write>(w: &mut W, animation: &Animation) -> Result<()> {
    if animation.frame_count == 0 {
        bail!("Animation '{}' has no frames", animation.name);
    }
    let track_count = u16::try_from(animation.tracks.len())
        .map_err(|_| anyhow::anyhow!("Animation '{}' has too many tracks", animation.name))?;
    let header = VAnimHeader {
        track_count,
        flags: if animation.looping {
            VAnimHeader::FLAG_LOOPING
        } else {
            0
        },
        frame_count: animation.frame_count,
        fps: animation.fps,
    };
    w.write_all(&header.to_bytes())?;

    for track in &animation.tracks {
        w.write_all(&(track.bone as u32).to_le_bytes())?;
        w.write_all(&(track.translations.len() as u32).to_le_bytes())?;
        w.write_all(&(track.rotations.len() as u32).to_le_bytes())?;
        for t in &track.translations {
            write_f32s(w, &t.to_array())?;
        }
        for r in &track.rotations {
            write_f32s(w, &r.to_array())?;
        }
    }
    Ok(())
}

/// Write a complete `.vtex` file
pub fn write_vtex<W: Write>(w: &mut W, header: VTexHeader, data: &[u8]) -> Result<()> {
    let expected = header
        .format
        .data_size(u32::from(header.width), u32::from(header.height));
    if data.len() != expected {
        bail!(
            "Texture payload is {} bytes, expected {} for {}x{} {:?}",
            data.len(),
            expected,
            header.width,
            header.height,
            header.format
        );
    }
    w.write_all(&header.to_bytes())?;
    w.write_all(data)?;
    Ok(())
}
