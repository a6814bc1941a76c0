//! SH environment coefficients and their GPU layout.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::basis::{cosine_lobe_band, sh_basis, SH_COEFFS_COUNT};

/// RGB radiance environment projected on 9 SH coefficients.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShEnvironment {
    /// Coefficients in (l, m) order, one RGB triple each.
    pub coeffs: [Vec3; SH_COEFFS_COUNT],
}

/// Constant buffer layout of an environment.
///
/// Uses vec4 packing for GPU alignment: rgb holds the coefficient, w is unused.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShUniform {
    pub sh: [Vec4; SH_COEFFS_COUNT],
}

impl Default for ShEnvironment {
    /// Soft blue sky over a dim brown ground.
    fn default() -> Self {
        Self::sky(Vec3::new(0.6, 0.75, 1.0), Vec3::new(0.25, 0.2, 0.15))
    }
}

impl ShEnvironment {
    /// Black environment.
    pub const ZERO: Self = Self { coeffs: [Vec3::ZERO; SH_COEFFS_COUNT] };

    /// Build from raw coefficients.
    pub fn from_coeffs(coeffs: [Vec3; SH_COEFFS_COUNT]) -> Self {
        Self { coeffs }
    }

    /// Constant radiance in every direction.
    pub fn uniform(radiance: Vec3) -> Self {
        let mut env = Self::ZERO;
        env.coeffs[0] = radiance / sh_basis(Vec3::Z)[0];
        env
    }

    /// Linear gradient between the zenith (+Z) and the nadir (-Z).
    ///
    /// Radiance is `mix(down, up, 0.5 + 0.5 * z)`, which projects exactly on bands 0 and 1.
    pub fn sky(up: Vec3, down: Vec3) -> Self {
        let basis_up = sh_basis(Vec3::Z);
        let mut env = Self::ZERO;
        env.coeffs[0] = 0.5 * (up + down) / basis_up[0];
        env.coeffs[2] = 0.5 * (up - down) / basis_up[2];
        env
    }

    /// Radiance arriving from `dir` (unit vector).
    #[inline]
    pub fn radiance(&self, dir: Vec3) -> Vec3 {
        let basis = sh_basis(dir);
        self.coeffs
            .iter()
            .zip(basis)
            .fold(Vec3::ZERO, |acc, (c, y)| acc + *c * y)
    }

    /// Irradiance received by an unoccluded surface with the given normal.
    #[inline]
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        let basis = sh_basis(normal);
        self.coeffs
            .iter()
            .zip(basis)
            .enumerate()
            .fold(Vec3::ZERO, |acc, (i, (c, y))| acc + *c * (y * cosine_lobe_band(i)))
    }

    /// GPU layout of the coefficients.
    pub fn to_uniform(&self) -> ShUniform {
        let mut uniform = ShUniform::zeroed();
        for (dst, src) in uniform.sh.iter_mut().zip(self.coeffs.iter()) {
            *dst = src.extend(0.0);
        }
        uniform
    }

    /// Rebuild an environment from its GPU layout.
    pub fn from_uniform(uniform: &ShUniform) -> Self {
        let mut env = Self::ZERO;
        for (dst, src) in env.coeffs.iter_mut().zip(uniform.sh.iter()) {
            *dst = src.truncate();
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_uniform_radiance() {
        let env = ShEnvironment::uniform(Vec3::new(1.0, 0.5, 0.25));
        for dir in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::NEG_Z] {
            let l = env.radiance(dir);
            assert!((l - Vec3::new(1.0, 0.5, 0.25)).abs().max_element() < 1e-5);
        }
    }

    #[test]
    fn test_uniform_irradiance_is_pi_radiance() {
        let env = ShEnvironment::uniform(Vec3::ONE);
        let e = env.irradiance(Vec3::Z);
        assert!((e - Vec3::splat(PI)).abs().max_element() < 1e-4);
    }

    #[test]
    fn test_sky_gradient_endpoints() {
        let up = Vec3::new(1.0, 1.0, 1.0);
        let down = Vec3::new(0.0, 0.0, 0.0);
        let env = ShEnvironment::sky(up, down);
        assert!((env.radiance(Vec3::Z) - up).abs().max_element() < 1e-5);
        assert!((env.radiance(Vec3::NEG_Z) - down).abs().max_element() < 1e-5);
        assert!((env.radiance(Vec3::X) - 0.5 * up).abs().max_element() < 1e-5);
    }

    #[test]
    fn test_uniform_layout_roundtrip() {
        let env = ShEnvironment::default();
        let back = ShEnvironment::from_uniform(&env.to_uniform());
        assert_eq!(env, back);
        assert_eq!(std::mem::size_of::<ShUniform>(), 9 * 16);
    }
}
