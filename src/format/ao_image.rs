//! Grayscale preview of a bake: AO over 2π, 8 bits per pixel.

use std::path::Path;

use image::{GrayImage, ImageError, Luma};
use tracing::debug;

use super::IndirectMap;
use crate::util::{Error, Result};

/// Build the preview image of `map`.
pub fn ao_image(map: &IndirectMap) -> GrayImage {
    let dims = map.dims;
    GrayImage::from_fn(dims.width, dims.height, |x, y| {
        let value = map.ao[dims.index(x, y) as usize].normalized();
        Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

/// Write the preview of `map` to `path`; the format follows the extension.
pub fn save_ao_image(path: impl AsRef<Path>, map: &IndirectMap) -> Result<()> {
    let path = path.as_ref();
    ao_image(map).save(path).map_err(|e| match e {
        ImageError::IoError(io) => Error::Io(io),
        other => Error::invalid(format!("{}: {other}", path.display())),
    })?;
    debug!(path = %path.display(), dims = %map.dims, "wrote AO image");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::AoValue;
    use crate::util::Dimensions;
    use std::f32::consts::TAU;

    #[test]
    fn test_ao_image_levels() {
        let dims = Dimensions::new(3, 1);
        let ao = vec![AoValue::new(0.0, 1.0), AoValue::new(TAU / 2.0, 1.0), AoValue::new(TAU, 1.0)];
        let map = IndirectMap::new(dims, 1, ao, vec![0, 1, 2]).unwrap();
        let img = ao_image(&map);
        assert_eq!(img.dimensions(), (3, 1));
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(1, 0).0, [128]);
        assert_eq!(img.get_pixel(2, 0).0, [255]);
    }
}
