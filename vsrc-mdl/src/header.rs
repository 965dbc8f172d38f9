//! Studio header (`studiohdr_t`)
//!
//! Only the fields the decoder follows are kept. Every table offset is
//! absolute within the `.mdl` file.

use glam::Vec3;
use vsrc_common::{BinaryReader, DecodeError, DecodeResult};

/// `"IDST"` little-endian
pub const MDL_IDENT: u32 = 0x5453_4449;

/// Studio header versions the decoder accepts
pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<i32> = 44..=49;

/// `STUDIOHDR_FLAGS_STATIC_PROP`
pub const FLAG_STATIC_PROP: u32 = 0x10;

/// Fixed part of the header up to and including the body part table
pub const HEADER_SIZE: usize = 240;

/// A counted table: `count` records starting at an absolute `offset`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Table {
    pub count: usize,
    pub offset: usize,
}

impl Table {
    fn read(r: &mut BinaryReader) -> DecodeResult<Self> {
        let count = r.read_i32()?;
        let offset = r.read_i32()?;
        Ok(Self {
            count: count.max(0) as usize,
            offset: offset.max(0) as usize,
        })
    }

    /// Absolute offset of record `index`
    pub fn record(&self, index: usize, stride: usize) -> usize {
        self.offset + index * stride
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudioHeader {
    pub version: i32,
    pub checksum: i32,
    pub name: String,
    /// Declared file length
    pub length: i32,
    pub eye_position: Vec3,
    pub illum_position: Vec3,
    pub hull_min: Vec3,
    pub hull_max: Vec3,
    pub view_min: Vec3,
    pub view_max: Vec3,
    pub flags: u32,
    pub bones: Table,
    pub bone_controllers: Table,
    pub hitbox_sets: Table,
    pub local_anims: Table,
    pub local_sequences: Table,
    pub textures: Table,
    pub cd_textures: Table,
    pub skin_ref_count: usize,
    pub skin_family_count: usize,
    pub skin_offset: usize,
    pub body_parts: Table,
}

impl StudioHeader {
    pub fn read(data: &[u8]) -> DecodeResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(DecodeError::malformed(format!(
                "studio header needs {} bytes, file has {}",
                HEADER_SIZE,
                data.len()
            )));
        }
        let mut r = BinaryReader::new(data);
        let ident = r.read_u32()?;
        if ident != MDL_IDENT {
            return Err(DecodeError::malformed(format!(
                "bad model ident 0x{:08x}",
                ident
            )));
        }
        let version = r.read_i32()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(DecodeError::UnsupportedModelVersion(version));
        }
        let checksum = r.read_i32()?;
        let name = r.read_fixed_string(64)?;
        let length = r.read_i32()?;
        let eye_position = r.read_vec3()?;
        let illum_position = r.read_vec3()?;
        let hull_min = r.read_vec3()?;
        let hull_max = r.read_vec3()?;
        let view_min = r.read_vec3()?;
        let view_max = r.read_vec3()?;
        let flags = r.read_u32()?;
        let bones = Table::read(&mut r)?;
        let bone_controllers = Table::read(&mut r)?;
        let hitbox_sets = Table::read(&mut r)?;
        let local_anims = Table::read(&mut r)?;
        let local_sequences = Table::read(&mut r)?;
        // activitylistversion, eventsindexed
        r.skip(8)?;
        let textures = Table::read(&mut r)?;
        let cd_textures = Table::read(&mut r)?;
        let skin_ref_count = r.read_i32()?.max(0) as usize;
        let skin_family_count = r.read_i32()?.max(0) as usize;
        let skin_offset = r.read_i32()?.max(0) as usize;
        let body_parts = Table::read(&mut r)?;

        Ok(Self {
            version,
            checksum,
            name,
            length,
            eye_position,
            illum_position,
            hull_min,
            hull_max,
            view_min,
            view_max,
            flags,
            bones,
            bone_controllers,
            hitbox_sets,
            local_anims,
            local_sequences,
            textures,
            cd_textures,
            skin_ref_count,
            skin_family_count,
            skin_offset,
            body_parts,
        })
    }

    pub fn is_static_prop(&self) -> bool {
        self.flags & FLAG_STATIC_PROP != 0
    }
}
