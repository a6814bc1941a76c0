//! Math type re-exports and baking-specific helpers.
//!
//! This module re-exports types from `glam` and provides the small
//! shading helpers shared by the host kernels.

pub use glam::{UVec2, Vec2, Vec3, Vec4};

use std::f32::consts::PI;

/// Orthonormal tangent frame around a unit normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TangentFrame {
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub normal: Vec3,
}

impl TangentFrame {
    /// Build a frame from a unit normal.
    ///
    /// A +Z normal yields the identity frame so tangent-space rays are
    /// used untouched on flat surfaces.
    #[inline]
    pub fn from_normal(normal: Vec3) -> Self {
        let (tangent, bitangent) = if (normal - Vec3::Z).length_squared() < 1e-12 {
            (Vec3::X, Vec3::Y)
        } else {
            normal.any_orthonormal_pair()
        };
        Self { tangent, bitangent, normal }
    }

    /// Transform a tangent-space direction to world space.
    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
    }
}

/// Solid angle of a cone of the given half angle (radians).
#[inline]
pub fn cone_solid_angle(half_angle: f32) -> f32 {
    2.0 * PI * (1.0 - half_angle.cos())
}

/// Van der Corput radical inverse in base 2.
#[inline]
pub fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = bits.rotate_right(16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xAAAA_AAAA) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xCCCC_CCCC) >> 2);
    bits = ((bits & 0x0F0F_0F0F) << 4) | ((bits & 0xF0F0_F0F0) >> 4);
    bits = ((bits & 0x00FF_00FF) << 8) | ((bits & 0xFF00_FF00) >> 8);
    bits as f32 * 2.328_306_4e-10 // 1 / 2^32
}

/// Hammersley point `i` of a sequence of `n`.
#[inline]
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radical_inverse() {
        assert_eq!(radical_inverse_vdc(0), 0.0);
        assert_eq!(radical_inverse_vdc(1), 0.5);
        assert_eq!(radical_inverse_vdc(2), 0.25);
        assert_eq!(radical_inverse_vdc(3), 0.75);
    }

    #[test]
    fn test_flat_frame_is_identity() {
        let frame = TangentFrame::from_normal(Vec3::Z);
        let v = Vec3::new(0.3, -0.2, 0.9);
        assert_eq!(frame.to_world(v), v);
    }

    #[test]
    fn test_frame_orthonormal() {
        let n = Vec3::new(0.3, 0.4, 0.866).normalize();
        let f = TangentFrame::from_normal(n);
        assert!(f.tangent.dot(n).abs() < 1e-5);
        assert!(f.bitangent.dot(n).abs() < 1e-5);
        assert!(f.tangent.dot(f.bitangent).abs() < 1e-5);
        assert!((f.to_world(Vec3::Z) - n).length() < 1e-5);
    }

    #[test]
    fn test_hemisphere_solid_angle() {
        let omega = cone_solid_angle(std::f32::consts::FRAC_PI_2);
        assert!((omega - 2.0 * PI).abs() < 1e-5);
    }
}
