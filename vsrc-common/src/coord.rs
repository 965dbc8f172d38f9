//! Source → target coordinate conversion
//!
//! Source space is right-handed, Z-up, measured in inches. The target basis
//! and unit scale are configurable; the default maps to right-handed Y-up
//! meters. A basis with negative determinant mirrors the scene, in which
//! case triangle winding must be reversed to keep front faces outward.

use glam::{Mat3, Quat, Vec3};

/// One inch in meters
pub const INCHES_TO_METERS: f32 = 0.0254;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordTransform {
    basis: Mat3,
    scale: f32,
}

impl Default for CoordTransform {
    fn default() -> Self {
        Self::y_up(INCHES_TO_METERS)
    }
}

impl CoordTransform {
    /// Keep source axes and units
    pub fn identity() -> Self {
        Self {
            basis: Mat3::IDENTITY,
            scale: 1.0,
        }
    }

    /// Right-handed Y-up: (x, y, z) → (x, z, -y)
    pub fn y_up(scale: f32) -> Self {
        Self {
            basis: Mat3::from_cols(Vec3::X, Vec3::NEG_Z, Vec3::Y),
            scale,
        }
    }

    /// Keep Z-up axes, only rescale
    pub fn z_up(scale: f32) -> Self {
        Self {
            basis: Mat3::IDENTITY,
            scale,
        }
    }

    /// Arbitrary basis; columns are the images of source X, Y, Z
    pub fn from_basis(basis: Mat3, scale: f32) -> Self {
        Self { basis, scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn basis(&self) -> Mat3 {
        self.basis
    }

    pub fn position(&self, p: Vec3) -> Vec3 {
        self.basis * p * self.scale
    }

    /// Directions and normals; not scaled
    pub fn direction(&self, d: Vec3) -> Vec3 {
        (self.basis * d).normalize_or_zero()
    }

    /// Conjugate a rotation into the target basis
    pub fn rotation(&self, q: Quat) -> Quat {
        let m = self.basis * Mat3::from_quat(q) * self.basis.transpose();
        Quat::from_mat3(&m).normalize()
    }

    /// True when the basis is a reflection and winding must be reversed
    pub fn flips_winding(&self) -> bool {
        self.basis.determinant() < 0.0
    }

    /// Apply the winding rule to one triangle
    pub fn triangle(&self, tri: [u32; 3]) -> [u32; 3] {
        if self.flips_winding() {
            [tri[0], tri[2], tri[1]]
        } else {
            tri
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_y_up_maps_source_up_to_target_up() {
        let t = CoordTransform::y_up(1.0);
        let up = t.position(Vec3::Z);
        assert!((up - Vec3::Y).length() < EPS);
        let fwd = t.position(Vec3::Y);
        assert!((fwd - Vec3::NEG_Z).length() < EPS);
        assert!(!t.flips_winding());
    }

    #[test]
    fn test_scale_applies_to_positions_only() {
        let t = CoordTransform::default();
        let p = t.position(Vec3::new(100.0, 0.0, 0.0));
        assert!((p.x - 2.54).abs() < EPS);
        let d = t.direction(Vec3::new(2.0, 0.0, 0.0));
        assert!((d - Vec3::X).length() < EPS);
    }

    #[test]
    fn test_rotation_conjugation() {
        let t = CoordTransform::y_up(1.0);
        // 90° about source Z becomes 90° about target Y
        let q = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let r = t.rotation(q);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        assert!(r.dot(expected).abs() > 1.0 - EPS);
    }

    #[test]
    fn test_mirror_flips_winding() {
        let t = CoordTransform::from_basis(Mat3::from_cols(Vec3::Y, Vec3::X, Vec3::Z), 1.0);
        assert!(t.flips_winding());
        assert_eq!(t.triangle([0, 1, 2]), [0, 2, 1]);
        // Mirrored rotations are still proper rotations
        let r = t.rotation(Quat::from_rotation_x(0.3));
        assert!((r.length() - 1.0).abs() < EPS);
    }
}
