//! Ray marching over the height field: AO integral, direct illuminance and
//! the adjacency entries of one batch of scanlines.

use rayon::prelude::*;

use super::{column_count, expect_len, normal_at, ray_dir, row_range, MarchParams};
use crate::backend::host::HostTexture;
use crate::backend::{CbAo, GpuRay, TexelFormat};
use crate::util::{Dimensions, Error, Result, TangentFrame};

pub(crate) fn run(
    cb: &CbAo,
    height: &HostTexture,
    normal: &HostTexture,
    rays: &[GpuRay],
    grid: (u32, u32),
    ao: &mut HostTexture,
    entries: &mut [u32],
) -> Result<()> {
    let dims = Dimensions::new(cb.dimensions_x, cb.dimensions_y);
    height.expect(TexelFormat::R32F, dims)?;
    normal.expect(TexelFormat::RGBA32F, dims)?;
    ao.expect(TexelFormat::RG32F, dims)?;
    if cb.rays_count == 0 {
        return Err(Error::backend("GenerateAO dispatched without rays"));
    }

    let rays_count = cb.rays_count as usize;
    expect_len("ray buffer", rays, rays_count)?;
    let rays = &rays[..rays_count];

    let rows = row_range(cb.y0, grid.1, dims);
    let columns = column_count(grid.0, dims);
    let w = dims.width as usize;
    let batch_rows = rows.len();
    expect_len("adjacency buffer", entries, batch_rows * w * rays_count)?;

    let params = MarchParams {
        dims,
        texel_size: cb.texel_size_mm,
        displacement: cb.displacement_mm,
        max_steps: cb.max_steps_count,
        tile: cb.tile != 0,
    };
    let heights = &height.data;

    ao.data[rows.start as usize * w * 2..rows.end as usize * w * 2]
        .par_chunks_mut(w * 2)
        .zip(entries[..batch_rows * w * rays_count].par_chunks_mut(w * rays_count))
        .enumerate()
        .for_each(|(row, (ao_row, entry_row))| {
            let y = rows.start + row as u32;
            for x in 0..columns {
                let pixel = dims.index(x, y);
                let frame = TangentFrame::from_normal(normal_at(normal, pixel as usize));
                let origin = params.origin(heights, x, y);

                let mut occluded = 0.0f32;
                let mut direct = 0.0f32;
                let out = &mut entry_row[x as usize * rays_count..(x as usize + 1) * rays_count];
                for (entry, ray) in out.iter_mut().zip(rays) {
                    let local = ray_dir(ray);
                    let cos_theta = local.z.max(0.0);
                    match params.march(heights, origin, frame.to_world(local)) {
                        Some(hit) if hit != pixel => {
                            occluded += 2.0 * cos_theta;
                            *entry = hit;
                        }
                        _ => {
                            direct += cos_theta;
                            *entry = pixel;
                        }
                    }
                }
                ao_row[x as usize * 2] = occluded * cb.ray_weight;
                ao_row[x as usize * 2 + 1] = direct * cb.ray_weight;
            }
        });
    Ok(())
}
