//! `.indirectMap` files: the contract between the occlusion pass and every
//! light transport stage.
//!
//! ```text
//! u32 W, u32 H, u32 rays
//! W*H     x (f32 AO, f32 E0)        row-major
//! W*H*rays x u32 adjacency index    row-major pixel, then ray ascending
//! ```

use std::path::Path;

use tracing::debug;

use super::stream::{IStream, OStream};
use crate::bake::{AoValue, MAX_THREADS};
use crate::util::{Dimensions, Error, Result};

/// File extension, without the dot.
pub const EXTENSION: &str = "indirectMap";

/// AO seed values and adjacency map of one bake.
#[derive(Clone, Debug, PartialEq)]
pub struct IndirectMap {
    pub dims: Dimensions,
    pub rays_count: u32,
    /// One value per pixel
    pub ao: Vec<AoValue>,
    /// `indices[pixel * rays_count + ray]` is the pixel hit by `ray`, or `pixel` on a miss
    pub indices: Vec<u32>,
}

impl IndirectMap {
    /// Assemble a map, checking every length against the dimensions.
    pub fn new(dims: Dimensions, rays_count: u32, ao: Vec<AoValue>, indices: Vec<u32>) -> Result<Self> {
        if rays_count == 0 || rays_count > MAX_THREADS {
            return Err(Error::invalid(format!("rays count {rays_count} outside [1, {MAX_THREADS}]")));
        }
        if ao.len() != dims.num_pixels() {
            return Err(Error::invalid(format!(
                "{} AO values for a {dims} map",
                ao.len()
            )));
        }
        if indices.len() != dims.num_pixels() * rays_count as usize {
            return Err(Error::invalid(format!(
                "{} adjacency entries for a {dims} map with {rays_count} rays",
                indices.len()
            )));
        }
        let pixels = dims.num_pixels();
        if let Some(at) = indices.iter().position(|&i| i as usize >= pixels) {
            return Err(Error::invalid(format!(
                "adjacency entry {at} points at pixel {} of a {dims} map",
                indices[at]
            )));
        }
        Ok(Self { dims, rays_count, ao, indices })
    }

    /// Adjacency entries of one pixel, ray index ascending.
    #[inline]
    pub fn neighbours(&self, pixel: usize) -> &[u32] {
        let n = self.rays_count as usize;
        &self.indices[pixel * n..(pixel + 1) * n]
    }

    /// Adjacency entries of scanlines `rows`.
    pub fn rows(&self, rows: std::ops::Range<u32>) -> &[u32] {
        let stride = self.dims.width as usize * self.rays_count as usize;
        &self.indices[rows.start as usize * stride..rows.end as usize * stride]
    }

    /// AO plane.
    pub fn ao_plane(&self) -> Vec<f32> {
        self.ao.iter().map(|v| v.ao).collect()
    }

    /// Direct illuminance plane (bounce 0).
    pub fn illuminance_plane(&self) -> Vec<f32> {
        self.ao.iter().map(|v| v.illuminance).collect()
    }

    /// Write the map to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = OStream::create(path.as_ref())?;
        out.write_u32(self.dims.width)?;
        out.write_u32(self.dims.height)?;
        out.write_u32(self.rays_count)?;
        out.write_f32_slice(bytemuck::cast_slice(&self.ao))?;
        out.write_u32_slice(&self.indices)?;
        out.flush()?;
        debug!(path = %path.as_ref().display(), bytes = out.pos(), "wrote indirect map");
        Ok(())
    }

    /// Read the header only: dimensions and rays count.
    pub fn read_header(path: impl AsRef<Path>) -> Result<(Dimensions, u32)> {
        let mut input = IStream::open(path)?;
        let dims = Dimensions::new(input.read_u32()?, input.read_u32()?);
        Ok((dims, input.read_u32()?))
    }

    /// Load a map produced for a height field of dimensions `expected`.
    ///
    /// A header that does not match fails before any payload is read.
    pub fn load(path: impl AsRef<Path>, expected: Dimensions) -> Result<Self> {
        let mut input = IStream::open(path.as_ref())?;
        let dims = Dimensions::new(input.read_u32()?, input.read_u32()?);
        if dims != expected {
            return Err(Error::dimension_mismatch(expected.as_tuple(), dims.as_tuple()));
        }
        let rays_count = input.read_u32()?;
        if rays_count == 0 || rays_count > MAX_THREADS {
            return Err(Error::invalid(format!("rays count {rays_count} outside [1, {MAX_THREADS}]")));
        }

        let pixels = dims.num_pixels();
        let entries = pixels * rays_count as usize;
        input.ensure((pixels * 8 + entries * 4) as u64)?;

        let ao_words = input.read_f32_vec(pixels * 2)?;
        let ao = bytemuck::pod_collect_to_vec(&ao_words);
        let indices = input.read_u32_vec(entries)?;
        debug!(path = %path.as_ref().display(), %dims, rays_count, "loaded indirect map");

        Self::new(dims, rays_count, ao, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbours_and_rows() {
        let dims = Dimensions::new(2, 2);
        let map = IndirectMap::new(dims, 2, vec![AoValue::default(); 4], (0..8).collect()).unwrap();
        assert_eq!(map.neighbours(1), &[2, 3]);
        assert_eq!(map.rows(1..2), &[4, 5, 6, 7]);
    }

    #[test]
    fn test_new_rejects_bad_lengths() {
        let dims = Dimensions::new(2, 2);
        assert!(IndirectMap::new(dims, 2, vec![AoValue::default(); 3], vec![0; 8]).is_err());
        assert!(IndirectMap::new(dims, 2, vec![AoValue::default(); 4], vec![0; 7]).is_err());
        assert!(IndirectMap::new(dims, 0, vec![AoValue::default(); 4], vec![]).is_err());
        assert!(IndirectMap::new(dims, 2, vec![AoValue::default(); 4], vec![0, 1, 2, 3, 4, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_truncated_payload() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut out = OStream::create(file.path()).unwrap();
        for v in [2u32, 2, 1] {
            out.write_u32(v).unwrap();
        }
        out.write_f32_slice(&[0.0; 8]).unwrap();
        out.write_u32_slice(&[0, 1]).unwrap(); // 2 of 4 entries
        out.flush().unwrap();
        drop(out);

        let err = IndirectMap::load(file.path(), Dimensions::new(2, 2)).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof(_)));
    }
}
