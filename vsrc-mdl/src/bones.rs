//! Bone table (`mstudiobone_t`, 216 bytes per record)

use glam::{Mat4, Quat, Vec3, Vec4};
use vsrc_common::{BinaryReader, DecodeResult};

use crate::header::StudioHeader;

pub const BONE_RECORD_SIZE: usize = 216;

pub const BONE_PHYSICALLY_SIMULATED: u32 = 0x01;
pub const BONE_USED_BY_VERTEX_LOD0: u32 = 0x400;

#[derive(Debug, Clone, PartialEq)]
pub struct StudioBone {
    pub name: String,
    /// -1 for roots
    pub parent: i32,
    pub position: Vec3,
    pub rotation: Quat,
    /// Rest rotation as radian Euler angles (x roll, y pitch, z yaw)
    pub euler: Vec3,
    /// Scales applied to compressed animation values
    pub position_scale: Vec3,
    pub rotation_scale: Vec3,
    /// Model space → bone space
    pub pose_to_bone: Mat4,
    pub flags: u32,
    pub physics_bone: i32,
    pub surface_prop: String,
    pub contents: i32,
}

impl StudioBone {
    pub fn parent_index(&self) -> Option<usize> {
        (self.parent >= 0).then_some(self.parent as usize)
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

pub fn read_bones(data: &[u8], header: &StudioHeader) -> DecodeResult<Vec<StudioBone>> {
    let mut bones = Vec::with_capacity(header.bones.count.min(256));
    for i in 0..header.bones.count {
        let base = header.bones.record(i, BONE_RECORD_SIZE);
        let mut r = BinaryReader::at(data, base)?;
        let name_offset = r.read_i32()?;
        let parent = r.read_i32()?;
        // bonecontroller[6]
        r.skip(24)?;
        let position = r.read_vec3()?;
        let rotation = r.read_quat()?;
        let euler = r.read_vec3()?;
        let position_scale = r.read_vec3()?;
        let rotation_scale = r.read_vec3()?;
        let rows = [r.read_vec4()?, r.read_vec4()?, r.read_vec4()?];
        // qAlignment
        r.skip(16)?;
        let flags = r.read_u32()?;
        // proctype, procindex
        r.skip(8)?;
        let physics_bone = r.read_i32()?;
        let surface_prop_offset = r.read_i32()?;
        let contents = r.read_i32()?;

        let name = relative_string(&mut r, base, name_offset)?;
        let surface_prop = relative_string(&mut r, base, surface_prop_offset)?;
        bones.push(StudioBone {
            name,
            parent,
            position,
            rotation: rotation.normalize(),
            euler,
            position_scale,
            rotation_scale,
            pose_to_bone: matrix3x4(rows),
            flags,
            physics_bone,
            surface_prop,
            contents,
        });
    }
    Ok(bones)
}

/// String stored at an offset relative to the start of its record.
/// A zero offset means no string.
pub(crate) fn relative_string(
    r: &mut BinaryReader,
    record: usize,
    offset: i32,
) -> DecodeResult<String> {
    if offset == 0 {
        return Ok(String::new());
    }
    let at = record as i64 + offset as i64;
    if at < 0 {
        return Ok(String::new());
    }
    r.cstring_at(at as usize)
}

/// Row-major 3x4 affine matrix as stored on disk
fn matrix3x4(rows: [Vec4; 3]) -> Mat4 {
    let [a, b, c] = rows;
    Mat4::from_cols(
        Vec4::new(a.x, b.x, c.x, 0.0),
        Vec4::new(a.y, b.y, c.y, 0.0),
        Vec4::new(a.z, b.z, c.z, 0.0),
        Vec4::new(a.w, b.w, c.w, 1.0),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::header::tests::{Writer, header_bytes};

    /// One bone record, followed by its name when one is given
    pub(crate) fn write_bone(w: &mut Writer, name: Option<&str>, parent: i32, pos: [f32; 3]) {
        let base = w.len();
        let name_offset = if name.is_some() { BONE_RECORD_SIZE as i32 } else { 0 };
        w.i32(name_offset).i32(parent).zeros(24);
        w.vec3(pos).f32(0.0).f32(0.0).f32(0.0).f32(1.0);
        w.vec3([0.0; 3]).vec3([1.0; 3]).vec3([1.0; 3]);
        // pose_to_bone: translate by -pos
        w.f32(1.0).f32(0.0).f32(0.0).f32(-pos[0]);
        w.f32(0.0).f32(1.0).f32(0.0).f32(-pos[1]);
        w.f32(0.0).f32(0.0).f32(1.0).f32(-pos[2]);
        w.zeros(16).u32(BONE_USED_BY_VERTEX_LOD0).zeros(8).i32(-1).i32(0).i32(1);
        w.zeros(base + BONE_RECORD_SIZE - w.len());
        if let Some(name) = name {
            w.cstr(name).align(4);
        }
    }

    #[test]
    fn test_read_bones() {
        let mut w = header_bytes(48, 0);
        let offset = w.len();
        write_bone(&mut w, Some("root"), -1, [1.0, 2.0, 3.0]);
        w.patch_i32(156, 1);
        w.patch_i32(160, offset as i32);
        let header = StudioHeader::read(&w.buf).unwrap();
        let bones = read_bones(&w.buf, &header).unwrap();
        assert_eq!(bones.len(), 1);
        let b = &bones[0];
        assert_eq!(b.name, "root");
        assert_eq!(b.parent_index(), None);
        assert_eq!(b.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.rotation, Quat::IDENTITY);
        assert!(b.has_flag(BONE_USED_BY_VERTEX_LOD0));
        assert_eq!(b.contents, 1);
        let p = b.pose_to_bone.transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!(p.length() < 1e-6);
    }

    #[test]
    fn test_truncated_table() {
        let mut w = header_bytes(48, 0);
        w.patch_i32(156, 2);
        w.patch_i32(160, 240);
        w.zeros(100);
        let header = StudioHeader::read(&w.buf).unwrap();
        assert!(read_bones(&w.buf, &header).is_err());
    }
}
