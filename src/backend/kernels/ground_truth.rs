//! SH-lit ground truth: direct irradiance and RGB indirect bounces.
//!
//! Both passes read the adjacency slice of the current batch only; entry
//! `((y - y0) * W + x) * rays + r` holds the pixel hit by ray `r` from
//! pixel `(x, y)`, or the pixel itself on a miss.

use std::f32::consts::PI;

use glam::{Vec3, Vec4};
use rayon::prelude::*;
use sh_environment::ShEnvironment;

use super::{column_count, expect_indices, expect_len, normal_at, ray_dir, row_range};
use crate::backend::host::HostTexture;
use crate::backend::{CbGroundTruth, GpuRay, TexelFormat};
use crate::util::{Dimensions, Result, TangentFrame};

/// Shared layout checks; returns the rays actually used.
fn prepare<'a>(
    cb: &CbGroundTruth,
    normal: &HostTexture,
    adjacency: &[u32],
    rays: &'a [GpuRay],
    grid: (u32, u32),
    target: &HostTexture,
) -> Result<&'a [GpuRay]> {
    let dims = Dimensions::new(cb.dimensions_x, cb.dimensions_y);
    normal.expect(TexelFormat::RGBA32F, dims)?;
    target.expect(TexelFormat::RGBA32F, dims)?;
    let rays_count = cb.rays_count as usize;
    expect_len("ray buffer", rays, rays_count)?;
    let rows = row_range(cb.y0, grid.1, dims);
    let entries = rows.len() * dims.width as usize * rays_count;
    expect_len("adjacency slice", adjacency, entries)?;
    expect_indices("adjacency slice", &adjacency[..entries], dims.num_pixels())?;
    Ok(&rays[..rays_count])
}

/// Run `shade(pixel, frame, neighbours)` over the batch rows, writing RGB + alpha 0.
fn for_each_pixel<F>(
    cb: &CbGroundTruth,
    normal: &HostTexture,
    adjacency: &[u32],
    grid: (u32, u32),
    target: &mut HostTexture,
    shade: F,
) where
    F: Fn(usize, &TangentFrame, &[u32]) -> Vec3 + Sync,
{
    let dims = Dimensions::new(cb.dimensions_x, cb.dimensions_y);
    let rows = row_range(cb.y0, grid.1, dims);
    let columns = column_count(grid.0, dims);
    let w = dims.width as usize;
    let rays_count = cb.rays_count as usize;
    let scale = cb.ray_weight;

    target.data[rows.start as usize * w * 4..rows.end as usize * w * 4]
        .par_chunks_mut(w * 4)
        .enumerate()
        .for_each(|(row, out)| {
            let y = rows.start + row as u32;
            for x in 0..columns as usize {
                let pixel = dims.index(x as u32, y) as usize;
                let local = row * w + x;
                let neighbours = &adjacency[local * rays_count..(local + 1) * rays_count];
                let frame = TangentFrame::from_normal(normal_at(normal, pixel));
                let value = shade(pixel, &frame, neighbours) * scale;
                Vec4::from((value, 0.0)).write_to_slice(&mut out[x * 4..x * 4 + 4]);
            }
        });
}

/// Direct irradiance from the SH environment through the unoccluded rays.
pub(crate) fn direct(
    cb: &CbGroundTruth,
    environment: &ShEnvironment,
    normal: &HostTexture,
    adjacency: &[u32],
    rays: &[GpuRay],
    grid: (u32, u32),
    target: &mut HostTexture,
) -> Result<()> {
    let rays = prepare(cb, normal, adjacency, rays, grid, target)?;
    for_each_pixel(cb, normal, adjacency, grid, target, |pixel, frame, neighbours| {
        let mut sum = Vec3::ZERO;
        for (&hit, ray) in neighbours.iter().zip(rays) {
            if hit as usize != pixel {
                continue;
            }
            let local = ray_dir(ray);
            sum += local.z.max(0.0) * environment.radiance(frame.to_world(local));
        }
        sum
    });
    Ok(())
}

/// One RGB bounce: irradiance of the previous pass reflected by the hit pixels.
pub(crate) fn indirect(
    cb: &CbGroundTruth,
    source: &HostTexture,
    normal: &HostTexture,
    adjacency: &[u32],
    rays: &[GpuRay],
    grid: (u32, u32),
    target: &mut HostTexture,
) -> Result<()> {
    let rays = prepare(cb, normal, adjacency, rays, grid, target)?;
    source.expect(TexelFormat::RGBA32F, normal.dims)?;
    let brdf = cb.rho() / PI;
    let incoming = &source.data;

    for_each_pixel(cb, normal, adjacency, grid, target, |pixel, _frame, neighbours| {
        let mut sum = Vec3::ZERO;
        for (&hit, ray) in neighbours.iter().zip(rays) {
            let hit = hit as usize;
            if hit == pixel {
                continue;
            }
            let local = ray_dir(ray);
            let e = Vec3::from_slice(&incoming[hit * 4..hit * 4 + 3]);
            sum += local.z.max(0.0) * brdf * e;
        }
        sum
    });
    Ok(())
}
