//! Edge-aware smoothing of a scalar texture.

use rayon::prelude::*;

use super::{column_count, row_range};
use crate::backend::host::HostTexture;
use crate::backend::{CbFilter, TexelFormat};
use crate::util::Result;

/// Largest kernel half-width, in texels.
pub const MAX_KERNEL_RADIUS: i32 = 32;

/// Half-width of the window covering 3 sigma of the spatial falloff.
pub(crate) fn kernel_radius(sigma_radius: f32) -> i32 {
    let sigma = (-0.5 / sigma_radius).sqrt();
    if !sigma.is_finite() {
        return 0;
    }
    ((3.0 * sigma).ceil() as i32).clamp(0, MAX_KERNEL_RADIUS)
}

pub(crate) fn run(cb: &CbFilter, source: &HostTexture, target: &mut HostTexture, grid: (u32, u32)) -> Result<()> {
    let dims = source.dims;
    source.expect(TexelFormat::R32F, dims)?;
    target.expect(TexelFormat::R32F, dims)?;

    let rows = row_range(cb.y0, grid.1, dims);
    let columns = column_count(grid.0, dims);
    let radius = kernel_radius(cb.sigma_radius);
    let tile = cb.tile != 0;
    let w = dims.width as usize;
    let src = &source.data;

    target.data[rows.start as usize * w..rows.end as usize * w]
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(row, out)| {
            let y = rows.start + row as u32;
            for x in 0..columns {
                let center = src[dims.index(x, y) as usize];
                let mut sum = 0.0f32;
                let mut weights = 0.0f32;
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        let (sx, sy) = dims.wrap_or_clamp(x as i32 + dx, y as i32 + dy, tile);
                        let value = src[dims.index(sx, sy) as usize];
                        let d2 = (dx * dx + dy * dy) as f32;
                        let dv = value - center;
                        let weight = (cb.sigma_radius * d2).exp() * (cb.sigma_tolerance * dv * dv).exp();
                        sum += weight * value;
                        weights += weight;
                    }
                }
                out[x as usize] = if weights > 0.0 { sum / weights } else { center };
            }
        });
    Ok(())
}
