//! `.AO` files: AO plane plus every illuminance plane of a baseline bake.
//!
//! ```text
//! u32 W, u32 H
//! W*H x f32 AO
//! u32 count (= 1 + MAX_BOUNCE)
//! count x (W*H x f32 illuminance)
//! ```

use std::path::Path;

use tracing::debug;

use super::stream::{IStream, OStream};
use crate::bake::BOUNCE_PLANES;
use crate::util::{Dimensions, Error, Result};

/// File extension, without the dot.
pub const EXTENSION: &str = "AO";

#[derive(Clone, Debug, PartialEq)]
pub struct AoFile {
    pub dims: Dimensions,
    pub ao: Vec<f32>,
    /// Plane 0 is direct lighting, plane `b` the contribution of bounce `b`
    pub planes: Vec<Vec<f32>>,
}

impl AoFile {
    pub fn new(dims: Dimensions, ao: Vec<f32>, planes: Vec<Vec<f32>>) -> Result<Self> {
        let pixels = dims.num_pixels();
        if ao.len() != pixels {
            return Err(Error::invalid(format!("{} AO values for a {dims} field", ao.len())));
        }
        if planes.len() != BOUNCE_PLANES {
            return Err(Error::invalid(format!(
                "{} illuminance planes, expected {BOUNCE_PLANES}",
                planes.len()
            )));
        }
        if let Some(bad) = planes.iter().position(|p| p.len() != pixels) {
            return Err(Error::invalid(format!("illuminance plane {bad} does not cover {dims}")));
        }
        Ok(Self { dims, ao, planes })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = OStream::create(path.as_ref())?;
        out.write_u32(self.dims.width)?;
        out.write_u32(self.dims.height)?;
        out.write_f32_slice(&self.ao)?;
        out.write_u32(self.planes.len() as u32)?;
        for plane in &self.planes {
            out.write_f32_slice(plane)?;
        }
        out.flush()?;
        debug!(path = %path.as_ref().display(), bytes = out.pos(), "wrote AO file");
        Ok(())
    }

    /// Load a bake made for a height field of dimensions `expected`.
    pub fn load(path: impl AsRef<Path>, expected: Dimensions) -> Result<Self> {
        let mut input = IStream::open(path.as_ref())?;
        let dims = Dimensions::new(input.read_u32()?, input.read_u32()?);
        if dims != expected {
            return Err(Error::dimension_mismatch(expected.as_tuple(), dims.as_tuple()));
        }
        let pixels = dims.num_pixels();
        let ao = input.read_f32_vec(pixels)?;

        let count = input.read_u32()? as usize;
        if count != BOUNCE_PLANES {
            return Err(Error::invalid(format!("{count} illuminance planes, expected {BOUNCE_PLANES}")));
        }
        input.ensure((count * pixels * 4) as u64)?;
        let planes = (0..count)
            .map(|_| input.read_f32_vec(pixels))
            .collect::<Result<Vec<_>>>()?;

        Self::new(dims, ao, planes)
    }
}
