//! Texture references, search paths and skin families

use vsrc_common::{BinaryReader, DecodeResult};

use crate::bones::relative_string;
use crate::header::StudioHeader;

pub const TEXTURE_RECORD_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct StudioTexture {
    /// Material name without directory or extension
    pub name: String,
    pub flags: i32,
}

pub fn read_textures(data: &[u8], header: &StudioHeader) -> DecodeResult<Vec<StudioTexture>> {
    let mut textures = Vec::with_capacity(header.textures.count.min(256));
    for i in 0..header.textures.count {
        let base = header.textures.record(i, TEXTURE_RECORD_SIZE);
        let mut r = BinaryReader::at(data, base)?;
        let name_offset = r.read_i32()?;
        let flags = r.read_i32()?;
        let name = relative_string(&mut r, base, name_offset)?;
        textures.push(StudioTexture { name, flags });
    }
    Ok(textures)
}

/// Material directories searched in order, normalised to forward slashes
/// with a trailing `/`
pub fn read_cd_textures(data: &[u8], header: &StudioHeader) -> DecodeResult<Vec<String>> {
    let mut r = BinaryReader::at(data, header.cd_textures.offset)?;
    let mut paths = Vec::with_capacity(header.cd_textures.count.min(64));
    for _ in 0..header.cd_textures.count {
        let at = r.read_i32()?;
        let raw = r.cstring_at(at.max(0) as usize)?;
        let mut path = raw.replace('\\', "/").to_ascii_lowercase();
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }
        paths.push(path);
    }
    Ok(paths)
}

/// One row per skin family; each row maps a skin reference to a texture index
pub fn read_skins(data: &[u8], header: &StudioHeader) -> DecodeResult<Vec<Vec<u16>>> {
    let mut r = BinaryReader::at(data, header.skin_offset)?;
    let mut families = Vec::with_capacity(header.skin_family_count.min(64));
    for _ in 0..header.skin_family_count {
        let row = (0..header.skin_ref_count)
            .map(|_| r.read_i16().map(|v| v.max(0) as u16))
            .collect::<DecodeResult<Vec<_>>>()?;
        families.push(row);
    }
    Ok(families)
}
