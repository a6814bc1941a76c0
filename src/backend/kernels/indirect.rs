//! One bounce of scalar indirect lighting over the adjacency map.

use std::f32::consts::PI;

use rayon::prelude::*;

use super::{column_count, expect_indices, expect_len, ray_dir, row_range};
use crate::backend::host::HostTexture;
use crate::backend::{CbIndirect, GpuRay, TexelFormat};
use crate::util::{Dimensions, Result};

pub(crate) fn run(
    cb: &CbIndirect,
    source: &HostTexture,
    normal: &HostTexture,
    adjacency: &[u32],
    rays: &[GpuRay],
    grid: (u32, u32),
    target: &mut HostTexture,
) -> Result<()> {
    let dims = Dimensions::new(cb.dimensions_x, cb.dimensions_y);
    source.expect(TexelFormat::R32F, dims)?;
    target.expect(TexelFormat::R32F, dims)?;
    normal.expect(TexelFormat::RGBA32F, dims)?;

    let rays_count = cb.rays_count as usize;
    expect_len("ray buffer", rays, rays_count)?;
    expect_len("adjacency buffer", adjacency, dims.num_pixels() * rays_count)?;
    expect_indices("adjacency buffer", &adjacency[..dims.num_pixels() * rays_count], dims.num_pixels())?;
    let rays = &rays[..rays_count];

    let rows = row_range(0, grid.1, dims);
    let columns = column_count(grid.0, dims);
    let w = dims.width as usize;
    let scale = cb.ray_weight * cb.albedo / PI;
    let incoming = &source.data;

    target.data[rows.start as usize * w..rows.end as usize * w]
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(row, out)| {
            let y = rows.start + row as u32;
            for x in 0..columns {
                let pixel = dims.index(x, y) as usize;
                let neighbours = &adjacency[pixel * rays_count..(pixel + 1) * rays_count];

                let mut sum = 0.0f32;
                for (&hit, ray) in neighbours.iter().zip(rays) {
                    let hit = hit as usize;
                    if hit == pixel {
                        continue;
                    }
                    sum += ray_dir(ray).z.max(0.0) * incoming[hit];
                }
                out[x as usize] = sum * scale;
            }
        });
    Ok(())
}
