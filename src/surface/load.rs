//! Height / normal map loading.
//!
//! Raw fields (`.f32`, `.raw`) are `u32 W, u32 H, u32 channels` followed by
//! `W*H*channels` little-endian f32. Anything else is decoded as an image
//! when the `image-io` feature is enabled; image texels are taken as linear.

use std::path::Path;

use glam::Vec3;
use tracing::{debug, info};

use super::{HeightField, NormalField};
use crate::format::{IStream, OStream};
use crate::util::{Dimensions, Error, Result};

/// Extensions recognized as raw f32 fields.
pub const RAW_EXTENSIONS: [&str; 2] = ["f32", "raw"];

fn is_raw(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| RAW_EXTENSIONS.iter().any(|r| r.eq_ignore_ascii_case(e)))
}

/// Write a raw field.
pub fn save_raw_field(path: impl AsRef<Path>, dims: Dimensions, channels: u32, data: &[f32]) -> Result<()> {
    if data.len() != dims.num_pixels() * channels as usize {
        return Err(Error::invalid(format!(
            "{} values for a {dims} field of {channels} channels",
            data.len()
        )));
    }
    let mut out = OStream::create(path)?;
    out.write_u32(dims.width)?;
    out.write_u32(dims.height)?;
    out.write_u32(channels)?;
    out.write_f32_slice(data)?;
    out.flush()
}

fn load_raw(path: &Path, channels: u32) -> Result<(Dimensions, Vec<f32>)> {
    let mut input = IStream::open(path)?;
    let dims = Dimensions::new(input.read_u32()?, input.read_u32()?);
    let found = input.read_u32()?;
    if found != channels {
        return Err(Error::invalid(format!(
            "{}: raw field has {found} channels, expected {channels}",
            path.display()
        )));
    }
    let data = input.read_f32_vec(dims.num_pixels() * channels as usize)?;
    Ok((dims, data))
}

/// Decode an image into linear RGBA f32.
#[cfg(feature = "image-io")]
fn decode_rgba(path: &Path) -> Result<(Dimensions, Vec<f32>)> {
    let reader = image::ImageReader::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    let img = reader
        .decode()
        .map_err(|e| Error::invalid(format!("{}: {e}", path.display())))?;
    let rgba = img.to_rgba32f();
    let dims = Dimensions::new(rgba.width(), rgba.height());
    Ok((dims, rgba.into_raw()))
}

#[cfg(not(feature = "image-io"))]
fn decode_rgba(path: &Path) -> Result<(Dimensions, Vec<f32>)> {
    Err(Error::invalid(format!(
        "{}: image maps need the `image-io` feature, use a raw .f32 field instead",
        path.display()
    )))
}

/// Load a height map.
///
/// Image heights come from the green channel. The texel size spreads
/// `texture_size_mm` over the largest image side.
pub fn load_height_field(
    path: impl AsRef<Path>,
    texture_size_mm: f32,
    displacement_mm: f32,
    tile: bool,
) -> Result<HeightField> {
    let path = path.as_ref();
    let (dims, samples) = if is_raw(path) {
        load_raw(path, 1)?
    } else {
        let (dims, rgba) = decode_rgba(path)?;
        (dims, rgba.chunks_exact(4).map(|px| px[1]).collect())
    };
    let texel_size_mm = texture_size_mm / dims.width.max(dims.height).max(1) as f32;
    info!(path = %path.display(), %dims, texel_size_mm, "loaded height map");
    HeightField::new(dims, samples, texel_size_mm, displacement_mm, tile)
}

/// Load a normal map.
///
/// Image normals are decoded as `(2r - 1, 1 - 2g, 2b - 1)`; raw fields hold
/// the xyz components directly.
pub fn load_normal_field(path: impl AsRef<Path>) -> Result<NormalField> {
    let path = path.as_ref();
    let (dims, normals) = if is_raw(path) {
        let (dims, xyz) = load_raw(path, 3)?;
        (dims, xyz.chunks_exact(3).map(Vec3::from_slice).collect())
    } else {
        let (dims, rgba) = decode_rgba(path)?;
        let normals = rgba
            .chunks_exact(4)
            .map(|px| Vec3::new(2.0 * px[0] - 1.0, 1.0 - 2.0 * px[1], 2.0 * px[2] - 1.0))
            .collect();
        (dims, normals)
    };
    debug!(path = %path.display(), %dims, "loaded normal map");
    NormalField::new(dims, normals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_height_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("height.f32");
        let dims = Dimensions::new(4, 2);
        save_raw_field(&path, dims, 1, &[0.5; 8]).unwrap();

        let field = load_height_field(&path, 1000.0, 450.0, true).unwrap();
        assert_eq!(field.dims(), dims);
        assert_eq!(field.texel_size_mm(), 250.0);
        assert_eq!(field.height_mm(3, 1), 225.0);

        // Normals need 3 channels
        assert!(load_normal_field(&path).is_err());
    }

    #[test]
    fn test_raw_normal_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normal.RAW");
        save_raw_field(&path, Dimensions::new(1, 1), 3, &[0.0, 0.0, 3.0]).unwrap();
        let field = load_normal_field(&path).unwrap();
        assert_eq!(field.normals(), &[Vec3::Z]);
    }

    #[test]
    fn test_missing_map() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_height_field(dir.path().join("nope.f32"), 1.0, 1.0, false).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
