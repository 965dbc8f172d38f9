//! Local animations (`mstudioanimdesc_t` and per-bone anim records)
//!
//! # Layout
//! ```text
//! animdesc    100 bytes   baseptr, nameindex, fps f32, flags, numframes, movements,
//!                         ..., animblock @52, animindex @56, ..., sectionindex @80,
//!                         sectionframes @84
//! section       8 bytes   animblock, animindex (relative to the animdesc)
//! anim record   4 bytes   bone u8, flags u8, nextoffset i16 (0 = last), then
//!                         rotation (Quaternion64 | Quaternion48 | 3 value offsets)
//!                         position (Vector48 | 3 value offsets)
//! anim value    2 bytes   { valid u8, total u8 } run header or an i16 value
//! ```
//!
//! Value offsets are relative to the start of their 3-entry table; a zero
//! offset means the component is constant zero. Records may be split into
//! sections of `sectionframes` frames each; the final frame of a sectioned
//! animation lives in its own trailing section.

use glam::{EulerRot, Quat, Vec3};
use half::f16;
use vsrc_common::{Animation, BinaryReader, BoneTrack, DecodeResult};

use crate::bones::{StudioBone, relative_string};
use crate::header::StudioHeader;

pub const ANIMDESC_SIZE: usize = 100;

pub const ANIM_LOOPING: i32 = 0x0001;
pub const ANIM_DELTA: i32 = 0x0004;
pub const ANIM_ALLZEROS: i32 = 0x0020;

pub const ANIM_RAWROT: u8 = 0x01;
pub const ANIM_RAWPOS: u8 = 0x02;
pub const ANIM_ANIMPOS: u8 = 0x04;
pub const ANIM_ANIMROT: u8 = 0x08;
pub const ANIM_RAWROT2: u8 = 0x20;

#[derive(Debug, Clone, PartialEq)]
pub struct AnimDesc {
    /// Absolute offset of the descriptor
    pub offset: usize,
    pub name: String,
    pub fps: f32,
    pub flags: i32,
    pub frame_count: usize,
    pub anim_block: i32,
    pub anim_index: i32,
    pub section_index: i32,
    pub section_frames: usize,
}

impl AnimDesc {
    pub fn is_looping(&self) -> bool {
        self.flags & ANIM_LOOPING != 0
    }

    pub fn is_delta(&self) -> bool {
        self.flags & ANIM_DELTA != 0
    }

    /// `(block, absolute record offset, frame within the section)` for a frame
    fn locate(&self, r: &mut BinaryReader, frame: usize) -> DecodeResult<(i32, usize, usize)> {
        if self.section_frames == 0 {
            return Ok((self.anim_block, self.relative(self.anim_index), frame));
        }
        let (section, local) =
            if self.frame_count > self.section_frames && frame == self.frame_count - 1 {
                (self.frame_count / self.section_frames + 1, 0)
            } else {
                let section = frame / self.section_frames;
                (section, frame - section * self.section_frames)
            };
        let entry = self.relative(self.section_index) + section * 8;
        r.seek(entry)?;
        let block = r.read_i32()?;
        let index = r.read_i32()?;
        Ok((block, self.relative(index), local))
    }

    fn relative(&self, offset: i32) -> usize {
        (self.offset as i64 + offset as i64).max(0) as usize
    }
}

pub fn read_anim_descs(data: &[u8], header: &StudioHeader) -> DecodeResult<Vec<AnimDesc>> {
    let mut descs = Vec::with_capacity(header.local_anims.count.min(1024));
    for i in 0..header.local_anims.count {
        let offset = header.local_anims.record(i, ANIMDESC_SIZE);
        let mut r = BinaryReader::at(data, offset)?;
        let _base = r.read_i32()?;
        let name_offset = r.read_i32()?;
        let fps = r.read_f32()?;
        let flags = r.read_i32()?;
        let frame_count = r.read_i32()?.max(0) as usize;
        // movements, unused1[6]
        r.skip(32)?;
        let anim_block = r.read_i32()?;
        let anim_index = r.read_i32()?;
        // ikrules, localhierarchy
        r.skip(20)?;
        let section_index = r.read_i32()?;
        let section_frames = r.read_i32()?.max(0) as usize;
        let name = relative_string(&mut r, offset, name_offset)?;
        descs.push(AnimDesc {
            offset,
            name,
            fps,
            flags,
            frame_count,
            anim_block,
            anim_index,
            section_index,
            section_frames,
        });
    }
    Ok(descs)
}

/// Sample every frame of `desc` into per-bone tracks in source space.
///
/// Returns `None` when any frame lives in an external animation block.
pub fn decode_animation(
    data: &[u8],
    desc: &AnimDesc,
    bones: &[StudioBone],
) -> DecodeResult<Option<Animation>> {
    let mut r = BinaryReader::new(data);
    let frame_count = desc.frame_count.max(1);
    let mut tracks: Vec<BoneTrack> = (0..bones.len())
        .map(|bone| BoneTrack {
            bone,
            translations: Vec::with_capacity(frame_count),
            rotations: Vec::with_capacity(frame_count),
        })
        .collect();

    for frame in 0..frame_count {
        let mut poses: Vec<(Vec3, Quat)> = bones
            .iter()
            .map(|b| rest_pose(b, desc.is_delta()))
            .collect();

        if desc.flags & ANIM_ALLZEROS == 0 {
            let (block, mut at, local) = desc.locate(&mut r, frame)?;
            if block != 0 {
                return Ok(None);
            }
            loop {
                r.seek(at)?;
                let bone = r.read_u8()? as usize;
                let flags = r.read_u8()?;
                let next = r.read_i16()?;
                match bones.get(bone) {
                    Some(b) => {
                        poses[bone] = bone_pose(&mut r, at + 4, flags, local, b, desc.is_delta())?;
                    }
                    None => {
                        tracing::debug!("Anim record for missing bone {} in '{}'", bone, desc.name);
                    }
                }
                if next <= 0 {
                    break;
                }
                at += next as usize;
            }
        }

        for (track, (position, rotation)) in tracks.iter_mut().zip(poses) {
            track.translations.push(position);
            track.rotations.push(rotation);
        }
    }

    Ok(Some(Animation {
        name: desc.name.clone(),
        fps: desc.fps,
        frame_count: frame_count as u32,
        looping: desc.is_looping(),
        tracks,
    }))
}

fn rest_pose(bone: &StudioBone, delta: bool) -> (Vec3, Quat) {
    if delta {
        (Vec3::ZERO, Quat::IDENTITY)
    } else {
        (bone.position, bone.rotation)
    }
}

fn bone_pose(
    r: &mut BinaryReader,
    at: usize,
    flags: u8,
    frame: usize,
    bone: &StudioBone,
    delta: bool,
) -> DecodeResult<(Vec3, Quat)> {
    let (rest_position, rest_rotation) = rest_pose(bone, delta);

    let rotation = if flags & ANIM_RAWROT2 != 0 {
        r.seek(at)?;
        quaternion64(r.read_u64()?)
    } else if flags & ANIM_RAWROT != 0 {
        r.seek(at)?;
        quaternion48(r.read_array::<6>()?)
    } else if flags & ANIM_ANIMROT != 0 {
        let v = value_triplet(r, at, frame, bone.rotation_scale)?;
        let euler = if delta { v } else { v + bone.euler };
        Quat::from_euler(EulerRot::ZYX, euler.z, euler.y, euler.x)
    } else {
        rest_rotation
    };

    let mut pos_at = at;
    if flags & ANIM_RAWROT != 0 {
        pos_at += 6;
    }
    if flags & ANIM_RAWROT2 != 0 {
        pos_at += 8;
    }
    if flags & ANIM_ANIMROT != 0 {
        pos_at += 6;
    }

    let position = if flags & ANIM_RAWPOS != 0 {
        r.seek(pos_at)?;
        vector48(r.read_array::<6>()?)
    } else if flags & ANIM_ANIMPOS != 0 {
        let v = value_triplet(r, pos_at, frame, bone.position_scale)?;
        if delta { v } else { v + bone.position }
    } else {
        rest_position
    };

    Ok((position, rotation))
}

/// Three value streams addressed by the offset table at `at`
fn value_triplet(r: &mut BinaryReader, at: usize, frame: usize, scale: Vec3) -> DecodeResult<Vec3> {
    let mut out = [0.0f32; 3];
    let scale = scale.to_array();
    for axis in 0..3 {
        r.seek(at + axis * 2)?;
        let offset = r.read_i16()?;
        if offset > 0 {
            out[axis] = anim_value(r, at + offset as usize, frame, scale[axis])?;
        }
    }
    Ok(Vec3::from_array(out))
}

/// Run-length decode one value stream at `frame`.
///
/// Each run is a `{valid, total}` header followed by `valid` stored
/// values; frames past `valid` within the run repeat the last stored value.
pub fn anim_value(r: &mut BinaryReader, mut at: usize, frame: usize, scale: f32) -> DecodeResult<f32> {
    let mut k = frame;
    let valid = loop {
        r.seek(at)?;
        let valid = r.read_u8()? as usize;
        let total = r.read_u8()? as usize;
        if total == 0 {
            return Ok(0.0);
        }
        if total > k {
            break valid;
        }
        k -= total;
        at += (valid + 1) * 2;
    };
    let slot = if valid > k { k + 1 } else { valid };
    r.seek(at + slot * 2)?;
    Ok(r.read_i16()? as f32 * scale)
}

/// 16/16/15 bits for x/y/z plus the sign of w
pub fn quaternion48(bytes: [u8; 6]) -> Quat {
    let x = u16::from_le_bytes([bytes[0], bytes[1]]);
    let y = u16::from_le_bytes([bytes[2], bytes[3]]);
    let zw = u16::from_le_bytes([bytes[4], bytes[5]]);
    let x = (x as f32 - 32768.0) / 32768.0;
    let y = (y as f32 - 32768.0) / 32768.0;
    let z = ((zw & 0x7fff) as f32 - 16384.0) / 16384.0;
    with_w(x, y, z, zw & 0x8000 != 0)
}

/// 21 bits each for x/y/z plus the sign of w
pub fn quaternion64(bits: u64) -> Quat {
    const MASK: u64 = (1 << 21) - 1;
    let component = |shift: u32| (((bits >> shift) & MASK) as f32 - 1_048_576.0) / 1_048_576.5;
    with_w(component(0), component(21), component(42), bits >> 63 != 0)
}

fn with_w(x: f32, y: f32, z: f32, negative_w: bool) -> Quat {
    let w = (1.0 - x * x - y * y - z * z).max(0.0).sqrt();
    let w = if negative_w { -w } else { w };
    Quat::from_xyzw(x, y, z, w).normalize()
}

/// Three half floats
pub fn vector48(bytes: [u8; 6]) -> Vec3 {
    let h = |i: usize| f16::from_bits(u16::from_le_bytes([bytes[i], bytes[i + 1]])).to_f32();
    Vec3::new(h(0), h(2), h(4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bones::tests::write_bone;
    use crate::bones::read_bones;
    use crate::header::tests::{Writer, header_bytes};

    const EPS: f32 = 1e-4;

    fn encode_q48(q: Quat) -> [u8; 6] {
        let x = (q.x * 32768.0 + 32768.0).round() as u16;
        let y = (q.y * 32768.0 + 32768.0).round() as u16;
        let z = (q.z * 16384.0 + 16384.0).round() as u16 & 0x7fff;
        let zw = z | if q.w < 0.0 { 0x8000 } else { 0 };
        let mut out = [0u8; 6];
        out[..2].copy_from_slice(&x.to_le_bytes());
        out[2..4].copy_from_slice(&y.to_le_bytes());
        out[4..].copy_from_slice(&zw.to_le_bytes());
        out
    }

    #[test]
    fn test_rle_values() {
        // run 1: 2 stored values covering 4 frames; run 2: 1 value for 2 frames
        let mut w = Writer::default();
        w.u8(2).u8(4).i16(10).i16(20);
        w.u8(1).u8(2).i16(-5);
        let mut r = BinaryReader::new(&w.buf);
        let values: Vec<f32> = (0..6)
            .map(|f| anim_value(&mut r, 0, f, 0.5).unwrap())
            .collect();
        assert_eq!(values, vec![5.0, 10.0, 10.0, 10.0, -2.5, -2.5]);
        // past the end of the stream
        assert!(anim_value(&mut r, 0, 7, 1.0).is_err());
    }

    #[test]
    fn test_rle_zero_total_is_zero() {
        let data = [0u8, 0, 0, 0];
        let mut r = BinaryReader::new(&data);
        assert_eq!(anim_value(&mut r, 0, 3, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_quaternion48() {
        let q = quaternion48(encode_q48(Quat::IDENTITY));
        assert!(q.dot(Quat::IDENTITY).abs() > 1.0 - EPS);
        let r = Quat::from_rotation_z(1.0);
        let q = quaternion48(encode_q48(r));
        assert!(q.dot(r).abs() > 1.0 - 1e-3);
        let neg = Quat::from_xyzw(0.0, 0.6, 0.0, -0.8);
        let q = quaternion48(encode_q48(neg));
        assert!(q.w < 0.0);
    }

    #[test]
    fn test_quaternion64_identity() {
        let mid = 1u64 << 20;
        let bits = mid | (mid << 21) | (mid << 42);
        let q = quaternion64(bits);
        assert!((q.w - 1.0).abs() < EPS);
        let q = quaternion64(bits | 1 << 63);
        assert!((q.w + 1.0).abs() < EPS);
    }

    #[test]
    fn test_vector48() {
        let mut bytes = [0u8; 6];
        bytes[..2].copy_from_slice(&f16::from_f32(1.5).to_bits().to_le_bytes());
        bytes[4..].copy_from_slice(&f16::from_f32(-2.0).to_bits().to_le_bytes());
        assert_eq!(vector48(bytes), Vec3::new(1.5, 0.0, -2.0));
    }

    /// Anim records for one frame range: bone 0 raw rotation + raw
    /// position, bone 1 run-length x position over `xs`
    fn write_records(w: &mut Writer, xs: &[i16]) -> usize {
        let records = w.len();
        let q = encode_q48(Quat::from_rotation_z(0.5));
        w.u8(0).u8(ANIM_RAWROT | ANIM_RAWPOS).i16(4 + 6 + 6);
        w.buf.extend_from_slice(&q);
        for v in [1.0f32, 2.0, 3.0] {
            w.buf.extend_from_slice(&f16::from_f32(v).to_bits().to_le_bytes());
        }
        w.u8(1).u8(ANIM_ANIMPOS).i16(0);
        // x stream right after the offset table; y and z are constant zero
        w.i16(6).i16(0).i16(0);
        w.u8(xs.len() as u8).u8(xs.len() as u8);
        for &x in xs {
            w.i16(x);
        }
        records
    }

    /// Two bones and one three-frame animation. With `sectioned`, frames
    /// are split into sections of two and the last frame stands alone.
    fn animated_model(sectioned: bool) -> Vec<u8> {
        let mut w = header_bytes(48, 0);
        let table = w.len();
        write_bone(&mut w, None, -1, [0.0; 3]);
        write_bone(&mut w, None, 0, [0.0, 0.0, 4.0]);
        w.patch_i32(156, 2);
        w.patch_i32(160, table as i32);

        let desc = w.len();
        w.zeros(ANIMDESC_SIZE);
        let name_at = w.len();
        w.cstr("idle").align(4);

        if sectioned {
            let first = write_records(&mut w, &[0, 10]);
            let last = write_records(&mut w, &[99]);
            let sections = w.len();
            for at in [first, first, last] {
                w.i32(0).i32((at - desc) as i32);
            }
            w.patch_i32(desc + 80, (sections - desc) as i32);
            w.patch_i32(desc + 84, 2);
        } else {
            let records = write_records(&mut w, &[0, 10, 20]);
            w.patch_i32(desc + 56, (records - desc) as i32);
        }

        w.patch_i32(desc + 4, (name_at - desc) as i32);
        w.buf[desc + 8..desc + 12].copy_from_slice(&30.0f32.to_le_bytes());
        w.patch_i32(desc + 12, ANIM_LOOPING);
        w.patch_i32(desc + 16, 3);
        w.patch_i32(180, 1);
        w.patch_i32(184, desc as i32);
        w.buf
    }

    fn decode(data: &[u8]) -> Option<Animation> {
        let header = StudioHeader::read(data).unwrap();
        let bones = read_bones(data, &header).unwrap();
        let descs = read_anim_descs(data, &header).unwrap();
        decode_animation(data, &descs[0], &bones).unwrap()
    }

    #[test]
    fn test_decode_animation() {
        let data = animated_model(false);
        let header = StudioHeader::read(&data).unwrap();
        let descs = read_anim_descs(&data, &header).unwrap();
        assert_eq!(descs[0].name, "idle");
        assert!(descs[0].is_looping());

        let anim = decode(&data).unwrap();
        assert_eq!(anim.frame_count, 3);
        assert_eq!(anim.fps, 30.0);
        assert_eq!(anim.tracks.len(), 2);

        let root = &anim.tracks[0];
        assert_eq!(root.translations[2], Vec3::new(1.0, 2.0, 3.0));
        assert!(root.rotations[0].dot(Quat::from_rotation_z(0.5)).abs() > 1.0 - 1e-3);

        // position scale is 1 and the rest position is added
        let child = &anim.tracks[1];
        let xs: Vec<f32> = child.translations.iter().map(|t| t.x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0]);
        assert_eq!(child.translations[0].z, 4.0);
        assert_eq!(child.rotations[1], Quat::IDENTITY);
    }

    #[test]
    fn test_sectioned_animation() {
        let anim = decode(&animated_model(true)).unwrap();
        let xs: Vec<f32> = anim.tracks[1].translations.iter().map(|t| t.x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 99.0]);
    }

    #[test]
    fn test_external_block_is_skipped() {
        let mut data = animated_model(false);
        let header = StudioHeader::read(&data).unwrap();
        let desc_at = header.local_anims.offset;
        data[desc_at + 52..desc_at + 56].copy_from_slice(&1i32.to_le_bytes());
        assert_eq!(decode(&data), None);
    }

    #[test]
    fn test_all_zeros_uses_rest_pose() {
        let mut data = animated_model(false);
        let header = StudioHeader::read(&data).unwrap();
        let desc_at = header.local_anims.offset;
        data[desc_at + 12..desc_at + 16].copy_from_slice(&ANIM_ALLZEROS.to_le_bytes());
        let anim = decode(&data).unwrap();
        assert!(!anim.looping);
        assert_eq!(anim.tracks[1].translations[2], Vec3::new(0.0, 0.0, 4.0));
    }
}
