//! Real spherical harmonics basis up to band 2.

use glam::Vec3;

/// Number of coefficients for bands 0..=2.
pub const SH_COEFFS_COUNT: usize = 9;

// Normalization constants
const C0: f32 = 0.282_094_8; // 1/(2 sqrt(pi))
const C1: f32 = 0.488_602_5; // sqrt(3/(4 pi))
const C2: f32 = 1.092_548_4; // sqrt(15/(4 pi))
const C3: f32 = 0.315_391_57; // sqrt(5/(16 pi))
const C4: f32 = 0.546_274_2; // sqrt(15/(16 pi))

/// Evaluate the 9 basis functions for a unit direction.
#[inline]
pub fn sh_basis(dir: Vec3) -> [f32; SH_COEFFS_COUNT] {
    let Vec3 { x, y, z } = dir;
    [
        C0,
        C1 * y,
        C1 * z,
        C1 * x,
        C2 * x * y,
        C2 * y * z,
        C3 * (3.0 * z * z - 1.0),
        C2 * x * z,
        C4 * (x * x - y * y),
    ]
}

/// Cosine lobe convolution factor per coefficient (Ramamoorthi & Hanrahan).
pub(crate) fn cosine_lobe_band(index: usize) -> f32 {
    use std::f32::consts::PI;
    match index {
        0 => PI,
        1..=3 => 2.0 * PI / 3.0,
        _ => PI / 4.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band0_constant() {
        let a = sh_basis(Vec3::X);
        let b = sh_basis(Vec3::NEG_Z);
        assert_eq!(a[0], b[0]);
    }

    #[test]
    fn test_band1_follows_axes() {
        let up = sh_basis(Vec3::Z);
        assert!((up[2] - C1).abs() < 1e-6);
        assert!(up[1].abs() < 1e-6);
        assert!(up[3].abs() < 1e-6);
        // Y20 peaks along the pole
        assert!((up[6] - 2.0 * C3).abs() < 1e-6);
    }
}
