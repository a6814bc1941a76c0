//! Input surface: height field and optional normal field.

mod load;

use glam::{Vec3, Vec4};

use crate::util::{Dimensions, Error, Result};

pub use load::{load_height_field, load_normal_field, save_raw_field, RAW_EXTENSIONS};

/// Displacement samples of one surface.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    dims: Dimensions,
    /// Normalized heights in [0, 1], row-major
    samples: Vec<f32>,
    /// Size of a texel (mm)
    texel_size_mm: f32,
    /// Height of a sample at 1.0 (mm)
    displacement_mm: f32,
    tile: bool,
}

impl HeightField {
    pub fn new(
        dims: Dimensions,
        samples: Vec<f32>,
        texel_size_mm: f32,
        displacement_mm: f32,
        tile: bool,
    ) -> Result<Self> {
        if dims.is_empty() {
            return Err(Error::invalid(format!("empty height field {dims}")));
        }
        if samples.len() != dims.num_pixels() {
            return Err(Error::invalid(format!(
                "{} height samples for a {dims} field",
                samples.len()
            )));
        }
        if !(texel_size_mm > 0.0 && texel_size_mm.is_finite()) {
            return Err(Error::Config(format!("texel size must be positive, got {texel_size_mm} mm")));
        }
        if !(displacement_mm >= 0.0 && displacement_mm.is_finite()) {
            return Err(Error::Config(format!("displacement must be non-negative, got {displacement_mm} mm")));
        }
        Ok(Self { dims, samples, texel_size_mm, displacement_mm, tile })
    }

    /// Flat field at height 0.
    pub fn flat(dims: Dimensions, texel_size_mm: f32, displacement_mm: f32, tile: bool) -> Result<Self> {
        Self::new(dims, vec![0.0; dims.num_pixels()], texel_size_mm, displacement_mm, tile)
    }

    /// Same geometry, different samples (e.g. after filtering).
    pub fn with_samples(&self, samples: Vec<f32>) -> Result<Self> {
        Self::new(self.dims, samples, self.texel_size_mm, self.displacement_mm, self.tile)
    }

    #[inline]
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn texel_size_mm(&self) -> f32 {
        self.texel_size_mm
    }

    #[inline]
    pub fn displacement_mm(&self) -> f32 {
        self.displacement_mm
    }

    #[inline]
    pub fn tile(&self) -> bool {
        self.tile
    }

    /// Height of a pixel in millimeters.
    #[inline]
    pub fn height_mm(&self, x: u32, y: u32) -> f32 {
        self.samples[self.dims.index(x, y) as usize] * self.displacement_mm
    }

    /// Fail unless `dims` matches this field.
    pub fn check_dims(&self, dims: Dimensions) -> Result<()> {
        if dims != self.dims {
            return Err(Error::dimension_mismatch(self.dims.as_tuple(), dims.as_tuple()));
        }
        Ok(())
    }
}

/// Unit normals of one surface.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalField {
    dims: Dimensions,
    normals: Vec<Vec3>,
}

impl NormalField {
    /// Build a field, normalizing every sample. Degenerate samples become +Z.
    pub fn new(dims: Dimensions, normals: Vec<Vec3>) -> Result<Self> {
        if normals.len() != dims.num_pixels() {
            return Err(Error::invalid(format!(
                "{} normals for a {dims} field",
                normals.len()
            )));
        }
        let normals = normals.into_iter().map(|n| n.try_normalize().unwrap_or(Vec3::Z)).collect();
        Ok(Self { dims, normals })
    }

    /// (0, 0, 1) everywhere.
    pub fn flat(dims: Dimensions) -> Self {
        Self { dims, normals: vec![Vec3::Z; dims.num_pixels()] }
    }

    #[inline]
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    #[inline]
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// RGBA32F texels `(x, y, z, 1)`.
    pub fn to_texels(&self) -> Vec<Vec4> {
        self.normals.iter().map(|n| n.extend(1.0)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_field_validation() {
        let dims = Dimensions::new(2, 2);
        assert!(HeightField::new(dims, vec![0.0; 3], 1.0, 1.0, true).is_err());
        assert!(HeightField::new(dims, vec![0.0; 4], 0.0, 1.0, true).is_err());
        assert!(HeightField::new(Dimensions::new(0, 2), vec![], 1.0, 1.0, true).is_err());

        let field = HeightField::new(dims, vec![0.0, 0.5, 1.0, 0.25], 2.0, 10.0, false).unwrap();
        assert_eq!(field.height_mm(0, 1), 10.0);
        assert!(field.check_dims(Dimensions::new(2, 2)).is_ok());
        assert!(matches!(
            field.check_dims(Dimensions::new(4, 4)),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_normals_are_normalized() {
        let dims = Dimensions::new(2, 1);
        let field = NormalField::new(dims, vec![Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO]).unwrap();
        assert_eq!(field.normals(), &[Vec3::Z, Vec3::Z]);
        assert_eq!(field.to_texels()[0], Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(NormalField::flat(dims), field);
    }
}
