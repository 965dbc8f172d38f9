//! Game lump directory and static prop placements
//!
//! # Layout
//! ```text
//! GAME_LUMP:  count i32, then count × { id i32, flags u16, version u16, offset i32, length i32 }
//! sprp:       dict_count i32, dict_count × [u8; 128] model names
//!             leaf_count i32, leaf_count × u16
//!             prop_count i32, prop_count × StaticProp (size depends on version)
//! ```
//!
//! Game lump offsets are absolute within the file.

use glam::Vec3;
use serde::Serialize;
use vsrc_common::{BinaryReader, DecodeError, DecodeResult};

use crate::header::{BspHeader, LumpKind};

/// `'sprp'` as a four-character code
pub const STATIC_PROP_LUMP_ID: i32 = 0x7370_7270;

const GAME_LUMP_COMPRESSED: u16 = 0x1;
const MODEL_NAME_LEN: usize = 128;
/// Fields shared by every static prop version
const STATIC_PROP_BASE_SIZE: usize = 56;

#[derive(Debug, Clone, PartialEq)]
pub struct GameLump {
    pub id: i32,
    pub flags: u16,
    pub version: u16,
    pub data: Vec<u8>,
}

impl GameLump {
    pub fn is_compressed(&self) -> bool {
        self.flags & GAME_LUMP_COMPRESSED != 0
    }

    pub fn id_string(&self) -> String {
        String::from_utf8_lossy(&self.id.to_be_bytes()).into_owned()
    }
}

/// Read the game lump directory and copy out every game lump
pub fn decode_game_lumps(data: &[u8], header: &BspHeader) -> DecodeResult<Vec<GameLump>> {
    let bytes = header.lump_bytes(data, LumpKind::GameLump, 1)?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let mut r = BinaryReader::new(bytes);
    let count = r.read_i32()?.max(0) as usize;
    let file = BinaryReader::new(data);
    let mut lumps = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let id = r.read_i32()?;
        let flags = r.read_u16()?;
        let version = r.read_u16()?;
        let offset = r.read_i32()?;
        let length = r.read_i32()?;
        let truncated = || DecodeError::TruncatedLump {
            lump: "GAME_LUMP",
            offset: offset.max(0) as usize,
            len: length.max(0) as usize,
            record_size: 1,
            size: data.len(),
        };
        if offset < 0 || length < 0 {
            return Err(truncated());
        }
        let bytes = file
            .slice_at(offset as usize, length as usize)
            .map_err(|_| truncated())?;
        lumps.push(GameLump {
            id,
            flags,
            version,
            data: bytes.to_vec(),
        });
    }
    Ok(lumps)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticProp {
    pub model: String,
    pub origin: Vec3,
    /// Pitch, yaw, roll in degrees
    pub angles: Vec3,
    pub solid: u8,
    pub flags: u8,
    pub skin: i32,
    pub fade_min: f32,
    pub fade_max: f32,
    pub lighting_origin: Vec3,
    pub forced_fade_scale: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StaticProps {
    pub version: u16,
    pub models: Vec<String>,
    pub props: Vec<StaticProp>,
}

/// Decode the `sprp` game lump, if present
pub fn decode_static_props(lumps: &[GameLump]) -> DecodeResult<Option<StaticProps>> {
    let Some(lump) = lumps.iter().find(|l| l.id == STATIC_PROP_LUMP_ID) else {
        return Ok(None);
    };
    if lump.is_compressed() {
        return Err(DecodeError::CompressedLump("sprp"));
    }
    if !matches!(lump.version, 4..=11) {
        return Err(DecodeError::malformed(format!(
            "unsupported static prop lump version {}",
            lump.version
        )));
    }

    let mut r = BinaryReader::new(&lump.data);
    let dict_count = r.read_i32()?.max(0) as usize;
    let mut models = Vec::with_capacity(dict_count.min(4096));
    for _ in 0..dict_count {
        models.push(r.read_fixed_string(MODEL_NAME_LEN)?.replace('\\', "/"));
    }
    let leaf_count = r.read_i32()?.max(0) as usize;
    r.skip(leaf_count * 2)?;
    let prop_count = r.read_i32()?.max(0) as usize;
    if prop_count == 0 {
        return Ok(Some(StaticProps {
            version: lump.version,
            models,
            props: Vec::new(),
        }));
    }

    // Record size varies between games sharing a version number, so derive
    // it from what is left.
    let record_size = r.remaining() / prop_count;
    if record_size < STATIC_PROP_BASE_SIZE || r.remaining() % prop_count != 0 {
        return Err(DecodeError::TruncatedLump {
            lump: "sprp",
            offset: r.position(),
            len: r.remaining(),
            record_size: record_size.max(STATIC_PROP_BASE_SIZE),
            size: lump.data.len(),
        });
    }

    let mut props = Vec::with_capacity(prop_count);
    for i in 0..prop_count {
        let start = r.position();
        let origin = r.read_vec3()?;
        let angles = r.read_vec3()?;
        let prop_type = r.read_u16()? as usize;
        let _first_leaf = r.read_u16()?;
        let _leaf_count = r.read_u16()?;
        let solid = r.read_u8()?;
        let flags = r.read_u8()?;
        let skin = r.read_i32()?;
        let fade_min = r.read_f32()?;
        let fade_max = r.read_f32()?;
        let lighting_origin = r.read_vec3()?;
        let forced_fade_scale = if lump.version >= 5 && record_size >= 60 {
            r.read_f32()?
        } else {
            1.0
        };
        let model = models.get(prop_type).cloned().ok_or(DecodeError::InvalidIndex {
            what: "static prop model",
            index: prop_type as i64,
            count: models.len(),
        })?;
        props.push(StaticProp {
            model,
            origin,
            angles,
            solid,
            flags,
            skin,
            fade_min,
            fade_max,
            lighting_origin,
            forced_fade_scale,
        });
        r.seek(start + record_size)?;
        tracing::trace!("static prop {} at {:?}", i, origin);
    }

    Ok(Some(StaticProps {
        version: lump.version,
        models,
        props,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprp(version: u16, record_size: usize) -> GameLump {
        let mut data = Vec::new();
        data.extend_from_slice(&1i32.to_le_bytes());
        let mut name = [0u8; MODEL_NAME_LEN];
        name[..20].copy_from_slice(b"models\\props\\box.mdl");
        data.extend_from_slice(&name);
        data.extend_from_slice(&2i32.to_le_bytes());
        data.extend_from_slice(&[1, 0, 2, 0]);
        data.extend_from_slice(&2i32.to_le_bytes());
        for i in 0..2 {
            let mut rec = Vec::new();
            for f in [i as f32 * 64.0, 0.0, 16.0, 0.0, 90.0, 0.0] {
                rec.extend_from_slice(&f.to_le_bytes());
            }
            rec.extend_from_slice(&0u16.to_le_bytes());
            rec.extend_from_slice(&0u16.to_le_bytes());
            rec.extend_from_slice(&1u16.to_le_bytes());
            rec.push(6);
            rec.push(0);
            rec.extend_from_slice(&(i as i32).to_le_bytes());
            rec.extend_from_slice(&0.0f32.to_le_bytes());
            rec.extend_from_slice(&0.0f32.to_le_bytes());
            rec.extend_from_slice(&[0u8; 12]);
            rec.extend_from_slice(&2.0f32.to_le_bytes());
            rec.resize(record_size, 0);
            data.extend_from_slice(&rec);
        }
        GameLump {
            id: STATIC_PROP_LUMP_ID,
            flags: 0,
            version,
            data,
        }
    }

    #[test]
    fn test_sprp_v6() {
        let props = decode_static_props(&[sprp(6, 64)]).unwrap().unwrap();
        assert_eq!(props.models, vec!["models/props/box.mdl"]);
        assert_eq!(props.props.len(), 2);
        assert_eq!(props.props[1].origin, Vec3::new(64.0, 0.0, 16.0));
        assert_eq!(props.props[1].angles.y, 90.0);
        assert_eq!(props.props[1].skin, 1);
        assert_eq!(props.props[0].solid, 6);
        assert_eq!(props.props[0].forced_fade_scale, 2.0);
    }

    #[test]
    fn test_sprp_v4_has_no_fade_scale() {
        let props = decode_static_props(&[sprp(4, 56)]).unwrap().unwrap();
        assert_eq!(props.props[0].forced_fade_scale, 1.0);
    }

    #[test]
    fn test_sprp_wider_records() {
        let props = decode_static_props(&[sprp(10, 76)]).unwrap().unwrap();
        assert_eq!(props.props.len(), 2);
        assert_eq!(props.props[1].skin, 1);
    }

    #[test]
    fn test_compressed_sprp() {
        let mut lump = sprp(6, 64);
        lump.flags = 1;
        assert_eq!(
            decode_static_props(&[lump]),
            Err(DecodeError::CompressedLump("sprp"))
        );
    }

    #[test]
    fn test_missing_sprp() {
        assert_eq!(decode_static_props(&[]), Ok(None));
    }

    #[test]
    fn test_id_string() {
        let lump = sprp(6, 64);
        assert_eq!(lump.id_string(), "sprp");
    }
}
