//! `.groundTruth` files: RGBA irradiance planes of a ground-truth render.
//!
//! ```text
//! u32 W, u32 H, u32 count
//! count x (W*H x 4 f32)
//! ```

use std::path::Path;

use glam::Vec4;

use super::stream::{IStream, OStream};
use crate::util::{Dimensions, Error, Result};

/// File extension, without the dot.
pub const EXTENSION: &str = "groundTruth";

pub fn save(path: impl AsRef<Path>, dims: Dimensions, planes: &[Vec<Vec4>]) -> Result<()> {
    let mut out = OStream::create(path)?;
    out.write_u32(dims.width)?;
    out.write_u32(dims.height)?;
    out.write_u32(planes.len() as u32)?;
    for plane in planes {
        if plane.len() != dims.num_pixels() {
            return Err(Error::invalid(format!("ground truth plane does not cover {dims}")));
        }
        out.write_f32_slice(bytemuck::cast_slice(plane))?;
    }
    out.flush()
}

/// Load the planes rendered for a field of dimensions `expected`.
pub fn load(path: impl AsRef<Path>, expected: Dimensions) -> Result<Vec<Vec<Vec4>>> {
    let mut input = IStream::open(path)?;
    let dims = Dimensions::new(input.read_u32()?, input.read_u32()?);
    if dims != expected {
        return Err(Error::dimension_mismatch(expected.as_tuple(), dims.as_tuple()));
    }
    let count = input.read_u32()? as usize;
    let pixels = dims.num_pixels();
    input.ensure((count * pixels * 16) as u64)?;
    (0..count)
        .map(|_| -> Result<Vec<Vec4>> {
            let words = input.read_f32_vec(pixels * 4)?;
            Ok(bytemuck::pod_collect_to_vec(&words))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dims = Dimensions::new(2, 1);
        let planes = vec![
            vec![Vec4::new(1.0, 2.0, 3.0, 0.0), Vec4::ZERO],
            vec![Vec4::splat(0.25), Vec4::new(0.0, 0.0, 9.0, 0.0)],
        ];
        let tmp = tempfile::NamedTempFile::new().unwrap();
        save(tmp.path(), dims, &planes).unwrap();
        assert_eq!(load(tmp.path(), dims).unwrap(), planes);
        assert!(load(tmp.path(), Dimensions::new(1, 2)).is_err());
    }
}
