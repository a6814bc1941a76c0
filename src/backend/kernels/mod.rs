//! CPU kernels behind [`HostBackend`](super::HostBackend).
//!
//! A kernel receives the resolved bindings of one dispatch and writes the
//! rows it covers. Rows are independent, so each kernel spreads them over
//! the rayon pool.

pub mod bilateral;
pub mod ground_truth;
pub mod indirect;
pub mod occlusion;

use std::ops::Range;

use glam::Vec3;

use super::host::HostTexture;
use super::GpuRay;
use crate::util::{Dimensions, Error, Result};

/// Rows of the image touched by a dispatch starting at `y0`.
pub(crate) fn row_range(y0: u32, grid_y: u32, dims: Dimensions) -> Range<u32> {
    let start = y0.min(dims.height);
    let end = y0.saturating_add(grid_y).min(dims.height);
    start..end
}

/// Columns of the image touched by a dispatch.
#[inline]
pub(crate) fn column_count(grid_x: u32, dims: Dimensions) -> u32 {
    grid_x.min(dims.width)
}

/// Unit normal stored at a pixel of an RGBA32F normal texture.
#[inline]
pub(crate) fn normal_at(normals: &HostTexture, pixel: usize) -> Vec3 {
    Vec3::from_slice(&normals.data[pixel * 4..pixel * 4 + 3])
}

/// Tangent-space direction of a ray.
#[inline]
pub(crate) fn ray_dir(ray: &GpuRay) -> Vec3 {
    Vec3::new(ray[0], ray[1], ray[2])
}

/// Check a structured input carries enough elements.
pub(crate) fn expect_len<T>(what: &str, items: &[T], needed: usize) -> Result<()> {
    if items.len() < needed {
        return Err(Error::backend(format!(
            "{what} holds {} elements, dispatch needs {needed}",
            items.len()
        )));
    }
    Ok(())
}

/// Check every adjacency entry names a pixel of the image.
pub(crate) fn expect_indices(what: &str, indices: &[u32], pixels: usize) -> Result<()> {
    match indices.iter().position(|&i| i as usize >= pixels) {
        Some(at) => Err(Error::backend(format!(
            "{what} entry {at} points at pixel {} of {pixels}",
            indices[at]
        ))),
        None => Ok(()),
    }
}

/// Geometry of a height-field march.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MarchParams {
    pub dims: Dimensions,
    pub texel_size: f32,
    pub displacement: f32,
    pub max_steps: u32,
    pub tile: bool,
}

impl MarchParams {
    /// World-space position of the surface sample at the center of a pixel.
    #[inline]
    pub fn origin(&self, heights: &[f32], x: u32, y: u32) -> Vec3 {
        let h = heights[self.dims.index(x, y) as usize];
        Vec3::new(
            (x as f32 + 0.5) * self.texel_size,
            (y as f32 + 0.5) * self.texel_size,
            h * self.displacement,
        )
    }

    /// March `dir` from `origin` one texel at a time (horizontally).
    ///
    /// Returns the index of the first pixel whose surface lies above the
    /// ray, or `None` when the ray escapes over the displacement ceiling,
    /// leaves a non-tiled domain or runs out of steps.
    pub fn march(&self, heights: &[f32], origin: Vec3, dir: Vec3) -> Option<u32> {
        let horizontal = dir.truncate().length();
        if horizontal < 1e-6 {
            return None;
        }
        let step = dir * (self.texel_size / horizontal);
        let mut pos = origin;
        for _ in 0..self.max_steps {
            pos += step;
            if pos.z >= self.displacement {
                return None;
            }
            let px = (pos.x / self.texel_size).floor() as i32;
            let py = (pos.y / self.texel_size).floor() as i32;
            let (x, y) = self.dims.resolve(px, py, self.tile)?;
            let index = self.dims.index(x, y);
            if pos.z < heights[index as usize] * self.displacement {
                return Some(index);
            }
        }
        None
    }
}
