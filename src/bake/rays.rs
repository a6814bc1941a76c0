//! Sample directions shared by every ray-marching pass.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec3;

use super::MAX_THREADS;
use crate::backend::GpuRay;
use crate::util::{cone_solid_angle, hammersley};

/// Unit directions over a cone around +Z (tangent space).
///
/// A pure function of `(count, half_angle)`: equal inputs give bit-identical
/// sets, which is what makes a persisted adjacency map reusable.
#[derive(Clone, Debug, PartialEq)]
pub struct RaySet {
    directions: Vec<Vec3>,
    half_angle: f32,
    solid_angle: f32,
}

impl RaySet {
    /// Generate `count` rays (clamped to `[1, MAX_THREADS]`) over a cone of
    /// `half_angle` radians (clamped to a hemisphere).
    pub fn generate(count: u32, half_angle: f32) -> Self {
        let n = count.clamp(1, MAX_THREADS);
        let half_angle = half_angle.clamp(0.0, FRAC_PI_2);
        let cos_max = half_angle.cos();

        let directions = (0..n)
            .map(|i| {
                let p = hammersley(i, n);
                let cos_theta = 1.0 - p.y * (1.0 - cos_max);
                let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
                let (sin_phi, cos_phi) = (TAU * p.x).sin_cos();
                // Cap around +Y, then (x, y, z) -> (x, -z, y) to point it along +Z
                let y_up = Vec3::new(sin_theta * cos_phi, cos_theta, sin_theta * sin_phi);
                Vec3::new(y_up.x, -y_up.z, y_up.y)
            })
            .collect();

        Self { directions, half_angle, solid_angle: cone_solid_angle(half_angle) }
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.directions.len() as u32
    }

    #[inline]
    pub fn directions(&self) -> &[Vec3] {
        &self.directions
    }

    #[inline]
    pub fn half_angle(&self) -> f32 {
        self.half_angle
    }

    /// Solid angle covered by the cone.
    #[inline]
    pub fn solid_angle(&self) -> f32 {
        self.solid_angle
    }

    /// Monte-Carlo weight of a single ray.
    #[inline]
    pub fn weight(&self) -> f32 {
        self.solid_angle / self.directions.len() as f32
    }

    /// Average of `cos(theta)` over the set (1/2 for a full hemisphere).
    pub fn mean_cos_theta(&self) -> f32 {
        self.directions.iter().map(|d| d.z).sum::<f32>() / self.directions.len() as f32
    }

    /// Layout uploaded to the ray buffer.
    pub fn to_gpu(&self) -> Vec<GpuRay> {
        self.directions.iter().map(|d| [d.x, d.y, d.z, 0.0]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = RaySet::generate(257, 1.2);
        let b = RaySet::generate(257, 1.2);
        let bits = |s: &RaySet| s.directions().iter().flat_map(|d| d.to_array().map(f32::to_bits)).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_count_clamped() {
        assert_eq!(RaySet::generate(0, 1.0).count(), 1);
        assert_eq!(RaySet::generate(5000, 1.0).count(), MAX_THREADS);
    }

    #[test]
    fn test_rays_inside_cone() {
        let half = 0.6f32;
        let set = RaySet::generate(128, half);
        for d in set.directions() {
            assert!((d.length() - 1.0).abs() < 1e-5);
            assert!(d.z >= half.cos() - 1e-5);
        }
    }

    #[test]
    fn test_hemisphere_statistics() {
        let set = RaySet::generate(1024, FRAC_PI_2);
        assert!((set.mean_cos_theta() - 0.5).abs() < 1e-2);
        assert!((set.solid_angle() - TAU).abs() < 1e-5);
        assert!((set.weight() * 1024.0 - TAU).abs() < 1e-4);
        assert_eq!(set.to_gpu()[3][3], 0.0);
    }
}
