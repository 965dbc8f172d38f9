//! Skeleton and animation intermediate types

use glam::{Mat4, Quat, Vec3};

/// Translation + rotation + scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_mat4(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Always lower than this bone's own index
    pub parent: Option<usize>,
    /// Bind pose relative to the parent
    pub local: Transform,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub name: String,
    pub bones: Vec<Bone>,
}

impl Skeleton {
    /// Confirm topological order (parent index < child index)
    pub fn validate(&self) -> Result<(), String> {
        for (i, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= i {
                    return Err(format!(
                        "bone {} '{}' has parent {} which does not precede it",
                        i, bone.name, parent
                    ));
                }
            }
        }
        Ok(())
    }

    /// Model-space bind transforms for every bone
    pub fn world_transforms(&self) -> Vec<Mat4> {
        let mut out: Vec<Mat4> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let local = bone.local.to_mat4();
            let world = match bone.parent.and_then(|p| out.get(p)) {
                Some(parent) => *parent * local,
                None => local,
            };
            out.push(world);
        }
        out
    }

    /// Inverse bind matrices, one per bone
    pub fn inverse_bind_matrices(&self) -> Vec<Mat4> {
        self.world_transforms()
            .into_iter()
            .map(|m| m.inverse())
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name.eq_ignore_ascii_case(name))
    }
}

/// Per-bone keyframes sampled at the animation frame rate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneTrack {
    pub bone: usize,
    pub translations: Vec<Vec3>,
    pub rotations: Vec<Quat>,
}

impl BoneTrack {
    /// Local transform at `frame`, clamping to the last key
    pub fn sample(&self, frame: usize, rest: &Transform) -> Transform {
        let translation = clamp_key(&self.translations, frame).unwrap_or(rest.translation);
        let rotation = clamp_key(&self.rotations, frame).unwrap_or(rest.rotation);
        Transform {
            translation,
            rotation,
            scale: rest.scale,
        }
    }
}

fn clamp_key<T: Copy>(keys: &[T], frame: usize) -> Option<T> {
    keys.get(frame.min(keys.len().saturating_sub(1))).copied()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    pub name: String,
    pub fps: f32,
    pub frame_count: u32,
    pub looping: bool,
    pub tracks: Vec<BoneTrack>,
}

impl Animation {
    pub fn duration(&self) -> f32 {
        if self.fps <= 0.0 || self.frame_count < 2 {
            return 0.0;
        }
        (self.frame_count - 1) as f32 / self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(name: &str, parent: Option<usize>, t: Vec3) -> Bone {
        Bone {
            name: name.into(),
            parent,
            local: Transform::new(t, Quat::IDENTITY),
        }
    }

    #[test]
    fn test_validate_order() {
        let ok = Skeleton {
            name: "s".into(),
            bones: vec![bone("root", None, Vec3::ZERO), bone("a", Some(0), Vec3::X)],
        };
        assert!(ok.validate().is_ok());

        let bad = Skeleton {
            name: "s".into(),
            bones: vec![bone("a", Some(1), Vec3::X), bone("root", None, Vec3::ZERO)],
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_world_transforms_accumulate() {
        let s = Skeleton {
            name: "s".into(),
            bones: vec![
                bone("root", None, Vec3::new(1.0, 0.0, 0.0)),
                bone("child", Some(0), Vec3::new(0.0, 2.0, 0.0)),
            ],
        };
        let world = s.world_transforms();
        let p = world[1].transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
        let inv = s.inverse_bind_matrices();
        assert!((inv[1].transform_point3(p)).length() < 1e-6);
        assert_eq!(s.find("CHILD"), Some(1));
    }

    #[test]
    fn test_track_sample_clamps() {
        let track = BoneTrack {
            bone: 0,
            translations: vec![Vec3::X, Vec3::Y],
            rotations: vec![],
        };
        let rest = Transform::new(Vec3::Z, Quat::from_rotation_x(1.0));
        let t = track.sample(5, &rest);
        assert_eq!(t.translation, Vec3::Y);
        assert_eq!(t.rotation, rest.rotation);
    }
}
