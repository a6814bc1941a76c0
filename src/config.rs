//! Bake parameters, persisted as JSON.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use sh_environment::ShEnvironment;

use crate::bake::MAX_THREADS;
use crate::util::{Error, Result};

/// Scanlines processed per dispatch by the bilateral and occlusion passes,
/// expressed for a 1024-wide image.
pub const MAX_LINES: u32 = 16;

/// Scanlines per ground-truth batch.
pub const SCANLINES_COUNT: u32 = 64;

/// Bins of the AO histograms.
pub const HISTOGRAM_SIZE: usize = 100;

/// Every parameter of a bake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    // Rays
    pub rays_count: u32,
    pub cone_angle_deg: f32, // full aperture, 0-180 degrees
    pub max_steps: u32,
    pub tile: bool,

    // Surface scale
    pub texture_size_cm: f32,
    pub displacement_cm: f32,

    // Bilateral pre-filter
    pub bilateral_radius: f32,
    pub bilateral_tolerance: f32,

    // Light transport
    pub albedo: f32,
    pub reflectance: Vec3,
    pub environment: ShEnvironment,

    // Batching
    pub max_batch_elements: u32,
    pub ground_truth_scanlines: u32,

    // Histograms
    pub histogram_bins: usize,

    // Progress attributed to the bilateral pass (percent)
    pub preprocess_share: f32,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            rays_count: MAX_THREADS,
            cone_angle_deg: 160.0,
            max_steps: 200,
            tile: true,
            texture_size_cm: 100.0,
            displacement_cm: 45.0,
            bilateral_radius: 1.0,
            bilateral_tolerance: 0.2,
            albedo: 1.0,
            reflectance: Vec3::ONE,
            environment: ShEnvironment::default(),
            max_batch_elements: MAX_LINES * 1024,
            ground_truth_scanlines: SCANLINES_COUNT,
            histogram_bins: HISTOGRAM_SIZE,
            preprocess_share: 50.0,
        }
    }
}

impl BakeConfig {
    /// Load a configuration file; missing keys take their default value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check every parameter is usable.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, v: f32) -> Result<()> {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(Error::Config(format!("{name} must be positive, got {v}")))
            }
        }

        if self.rays_count == 0 {
            return Err(Error::Config("rays_count must be at least 1".into()));
        }
        if !(self.cone_angle_deg > 0.0 && self.cone_angle_deg <= 180.0) {
            return Err(Error::Config(format!(
                "cone_angle_deg must be in (0, 180], got {}",
                self.cone_angle_deg
            )));
        }
        positive("texture_size_cm", self.texture_size_cm)?;
        if !(self.displacement_cm >= 0.0 && self.displacement_cm.is_finite()) {
            return Err(Error::Config(format!(
                "displacement_cm must be non-negative, got {}",
                self.displacement_cm
            )));
        }
        if self.max_steps == 0 {
            return Err(Error::Config("max_steps must be at least 1".into()));
        }
        if self.max_batch_elements == 0 || self.ground_truth_scanlines == 0 {
            return Err(Error::Config("batch sizes must be at least 1".into()));
        }
        if self.histogram_bins == 0 {
            return Err(Error::Config("histogram_bins must be at least 1".into()));
        }
        if !(0.0..=100.0).contains(&self.preprocess_share) {
            return Err(Error::Config(format!(
                "preprocess_share must be a percentage, got {}",
                self.preprocess_share
            )));
        }
        Ok(())
    }

    /// Rays count as used by the kernels.
    #[inline]
    pub fn clamped_rays_count(&self) -> u32 {
        self.rays_count.clamp(1, MAX_THREADS)
    }

    /// Half angle of the sampling cone in radians.
    #[inline]
    pub fn cone_half_angle(&self) -> f32 {
        0.5 * self.cone_angle_deg.to_radians()
    }

    #[inline]
    pub fn texture_size_mm(&self) -> f32 {
        10.0 * self.texture_size_cm
    }

    #[inline]
    pub fn displacement_mm(&self) -> f32 {
        10.0 * self.displacement_cm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BakeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_batch_elements, 16 * 1024);
        assert_eq!(config.texture_size_mm(), 1000.0);
        assert_eq!(config.displacement_mm(), 450.0);
        assert!((config.cone_half_angle() - 80f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BakeConfig = serde_json::from_str(r#"{ "rays_count": 64, "tile": false }"#).unwrap();
        assert_eq!(config.rays_count, 64);
        assert!(!config.tile);
        assert_eq!(config.max_steps, 200);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bake.json");
        let config = BakeConfig { rays_count: 32, albedo: 0.5, ..Default::default() };
        config.save(&path).unwrap();
        assert_eq!(BakeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects() {
        let bad = BakeConfig { cone_angle_deg: 0.0, ..Default::default() };
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
        let bad = BakeConfig { preprocess_share: 120.0, ..Default::default() };
        assert!(bad.validate().is_err());
        assert_eq!(BakeConfig { rays_count: 5000, ..Default::default() }.clamped_rays_count(), MAX_THREADS);
    }
}
