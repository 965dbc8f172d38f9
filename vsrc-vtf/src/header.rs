//! VTF header and resource directory
//!
//! # Layout
//! ```text
//! 0x00: signature    "VTF\0"
//! 0x04: version      [u32; 2]   (7, 0..=5)
//! 0x0C: header_size  u32
//! 0x10: width        u16
//! 0x12: height       u16
//! 0x14: flags        u32
//! 0x18: frames       u16
//! 0x1A: first_frame  u16
//! 0x1C: padding      [u8; 4]
//! 0x20: reflectivity [f32; 3]
//! 0x2C: padding      [u8; 4]
//! 0x30: bump_scale   f32
//! 0x34: format       i32
//! 0x38: mip_count    u8
//! 0x39: low_format   i32        (-1 = no thumbnail)
//! 0x3D: low_width    u8
//! 0x3E: low_height   u8
//! 0x3F: depth        u16        (7.2+)
//! 0x41: padding      [u8; 3]    (7.3+)
//! 0x44: resources    u32
//! 0x48: padding      [u8; 8]
//! 0x50: [ResourceEntry; resources]  { tag [u8; 3], flags u8, data u32 }
//! ```

use glam::Vec3;
use vsrc_common::{BinaryReader, DecodeError, DecodeResult, PixelFormat};

pub const VTF_SIGNATURE: [u8; 4] = *b"VTF\0";
pub const VTF_MAJOR_VERSION: u32 = 7;
pub const VTF_MAX_MINOR_VERSION: u32 = 5;

/// Resource directory entries a file may carry
pub const MAX_RESOURCES: u32 = 32;

/// Low-resolution thumbnail image
pub const RESOURCE_LOW_RES_IMAGE: [u8; 3] = [0x01, 0, 0];
/// High-resolution image data
pub const RESOURCE_IMAGE: [u8; 3] = [0x30, 0, 0];
/// Resource flag: `data` holds the value itself, not an offset
pub const RESOURCE_NO_DATA_CHUNK: u8 = 0x02;

// ============================================================================
// Texture flags
// ============================================================================

pub const FLAG_POINT_SAMPLE: u32 = 0x0000_0001;
pub const FLAG_TRILINEAR: u32 = 0x0000_0002;
pub const FLAG_CLAMP_S: u32 = 0x0000_0004;
pub const FLAG_CLAMP_T: u32 = 0x0000_0008;
pub const FLAG_ANISOTROPIC: u32 = 0x0000_0010;
pub const FLAG_SRGB: u32 = 0x0000_0040;
pub const FLAG_NORMAL: u32 = 0x0000_0080;
pub const FLAG_NO_MIP: u32 = 0x0000_0100;
pub const FLAG_ONE_BIT_ALPHA: u32 = 0x0000_1000;
pub const FLAG_EIGHT_BIT_ALPHA: u32 = 0x0000_2000;
pub const FLAG_ENVMAP: u32 = 0x0000_4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceData {
    /// Value stored directly in the directory entry
    Inline(u32),
    /// Absolute file offset of the resource payload
    Offset(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub tag: [u8; 3],
    pub flags: u8,
    pub data: ResourceData,
}

impl ResourceEntry {
    pub const SIZE: usize = 8;

    pub fn tag_string(&self) -> String {
        self.tag
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VtfHeader {
    pub version: (u32, u32),
    pub header_size: u32,
    pub width: u32,
    pub height: u32,
    pub flags: u32,
    pub frames: u32,
    pub first_frame: u16,
    pub reflectivity: Vec3,
    pub bump_scale: f32,
    pub format: PixelFormat,
    pub mip_count: u32,
    pub low_res_format: Option<PixelFormat>,
    pub low_res_width: u32,
    pub low_res_height: u32,
    pub depth: u32,
    pub resources: Vec<ResourceEntry>,
}

impl VtfHeader {
    /// Size of the fixed part of a 7.0/7.1 header
    pub const MIN_SIZE: usize = 63;

    pub fn read(data: &[u8]) -> DecodeResult<Self> {
        if data.len() < Self::MIN_SIZE {
            return Err(DecodeError::malformed(format!(
                "file is {} bytes, VTF header needs at least {}",
                data.len(),
                Self::MIN_SIZE
            )));
        }
        let mut r = BinaryReader::new(data);
        let signature: [u8; 4] = r.read_array()?;
        if signature != VTF_SIGNATURE {
            return Err(DecodeError::malformed("bad signature, expected VTF"));
        }
        let version = (r.read_u32()?, r.read_u32()?);
        if version.0 != VTF_MAJOR_VERSION || version.1 > VTF_MAX_MINOR_VERSION {
            return Err(DecodeError::malformed(format!(
                "unsupported VTF version {}.{}",
                version.0, version.1
            )));
        }
        let header_size = r.read_u32()?;
        if header_size as usize > data.len() {
            return Err(DecodeError::malformed(format!(
                "header size {} exceeds file size {}",
                header_size,
                data.len()
            )));
        }

        let width = u32::from(r.read_u16()?);
        let height = u32::from(r.read_u16()?);
        let flags = r.read_u32()?;
        let frames = u32::from(r.read_u16()?).max(1);
        let first_frame = r.read_u16()?;
        r.skip(4)?;
        let reflectivity = r.read_vec3()?;
        r.skip(4)?;
        let bump_scale = r.read_f32()?;
        let format = PixelFormat::from_raw(r.read_i32()?)?;
        let mip_count = u32::from(r.read_u8()?);
        let low_res_format = match r.read_i32()? {
            -1 => None,
            raw => Some(PixelFormat::from_raw(raw)?),
        };
        let low_res_width = u32::from(r.read_u8()?);
        let low_res_height = u32::from(r.read_u8()?);

        let depth = if version.1 >= 2 {
            u32::from(r.read_u16()?).max(1)
        } else {
            1
        };

        let mut resources = Vec::new();
        if version.1 >= 3 {
            r.seek(0x44)?;
            let count = r.read_u32()?;
            if count > MAX_RESOURCES {
                return Err(DecodeError::malformed(format!(
                    "resource directory has {} entries, maximum is {}",
                    count, MAX_RESOURCES
                )));
            }
            r.seek(0x50)?;
            for _ in 0..count {
                let tag: [u8; 3] = r.read_array()?;
                let flags = r.read_u8()?;
                let value = r.read_u32()?;
                let data = if flags & RESOURCE_NO_DATA_CHUNK != 0 {
                    ResourceData::Inline(value)
                } else {
                    ResourceData::Offset(value)
                };
                resources.push(ResourceEntry { tag, flags, data });
            }
        }

        if width == 0 || height == 0 {
            return Err(DecodeError::malformed(format!(
                "texture has zero dimension {}x{}",
                width, height
            )));
        }

        Ok(Self {
            version,
            header_size,
            width,
            height,
            flags,
            frames,
            first_frame,
            reflectivity,
            bump_scale,
            format,
            mip_count,
            low_res_format,
            low_res_width,
            low_res_height,
            depth,
            resources,
        })
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// 1 for plain textures, 6 for cube maps, 7 when an old cube map also
    /// carries a sphere map
    pub fn face_count(&self) -> u32 {
        if !self.has_flag(FLAG_ENVMAP) {
            1
        } else if self.first_frame != 0xFFFF && self.version.1 < 5 {
            7
        } else {
            6
        }
    }

    pub fn resource(&self, tag: [u8; 3]) -> Option<&ResourceEntry> {
        self.resources.iter().find(|r| r.tag == tag)
    }

    /// Normal maps and other data textures are sampled linearly
    pub fn is_linear(&self) -> bool {
        self.has_flag(FLAG_NORMAL)
    }
}
