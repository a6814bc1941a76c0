//! Occlusion sampling: AO, direct illuminance and the adjacency map.
//!
//! The adjacency entries of a whole image do not fit a single device
//! buffer, so the image is processed in scanline batches. Each batch writes
//! its entries to a transient buffer sized for one batch, which is read back
//! and appended to the host-side map before the next dispatch.

use tracing::{debug, info, info_span};

use super::batch::ScanlineBatches;
use super::progress::Progress;
use super::rays::RaySet;
use super::AoValue;
use crate::backend::{
    Access, BufferDesc, CbAo, ComputeBackend, ComputeBackendExt, GpuRay, Program, ResourceScope,
    TexelFormat, TextureDesc,
};
use crate::config::BakeConfig;
use crate::format::IndirectMap;
use crate::surface::{HeightField, NormalField};
use crate::util::{Error, Result, Stage, StageExt};

/// March parameters that do not come from the height field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OcclusionParams {
    /// Maximum amount of texel steps per ray
    pub max_steps: u32,
    /// Ceiling on `batch_height * W`
    pub max_batch_elements: u32,
}

#[derive(Clone, Debug)]
pub struct OcclusionSampler {
    pub params: OcclusionParams,
}

impl OcclusionSampler {
    pub fn new(params: OcclusionParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &BakeConfig) -> Self {
        Self::new(OcclusionParams {
            max_steps: config.max_steps,
            max_batch_elements: config.max_batch_elements,
        })
    }

    /// March every ray of every pixel over `height` (already filtered).
    ///
    /// A missing normal field is treated as flat.
    pub fn run<B: ComputeBackend + ?Sized>(
        &self,
        backend: &mut B,
        height: &HeightField,
        normal: Option<&NormalField>,
        rays: &RaySet,
        progress: &mut dyn Progress,
    ) -> Result<IndirectMap> {
        let dims = height.dims();
        let _span = info_span!("occlusion", %dims, rays = rays.count()).entered();

        let flat;
        let normal = match normal {
            Some(n) => {
                height.check_dims(n.dims()).stage(Stage::Occlusion)?;
                n
            }
            None => {
                flat = NormalField::flat(dims);
                &flat
            }
        };

        let rays_count = rays.count();
        let batches = ScanlineBatches::for_width(dims.width, dims.height, self.params.max_batch_elements);
        let rows_per_batch = batches.batch_height();
        let batch_entries = rows_per_batch as usize * dims.width as usize * rays_count as usize;

        let (ao, indices) = ResourceScope::run(backend, |backend, scope| {
            backend.use_program(Program::GenerateAo)?;

            let height_tex = scope.texture(
                backend,
                &TextureDesc::new("filtered height", dims, TexelFormat::R32F, Access::GPU_READ),
                Some(bytemuck::cast_slice(height.samples())),
            )?;
            let normal_tex = scope.texture(
                backend,
                &TextureDesc::new("normal", dims, TexelFormat::RGBA32F, Access::GPU_READ),
                Some(bytemuck::cast_slice(&normal.to_texels())),
            )?;
            let rays_buf = scope.buffer(
                backend,
                &BufferDesc::of::<GpuRay>("rays", rays_count as usize, Access::GPU_READ),
                Some(bytemuck::cast_slice(&rays.to_gpu())),
            )?;
            let ao_tex = scope.texture(
                backend,
                &TextureDesc::new("AO", dims, TexelFormat::RG32F, Access::GPU_WRITE),
                None,
            )?;
            let ao_staging = scope.texture(
                backend,
                &TextureDesc::new("AO (cpu)", dims, TexelFormat::RG32F, Access::STAGING),
                None,
            )?;
            // One batch worth of entries, never the whole image
            let entries_buf = scope.buffer(
                backend,
                &BufferDesc::of::<u32>("indirect pixels", batch_entries, Access::READ_WRITE),
                None,
            )?;

            backend.bind_input(0, height_tex.into())?;
            backend.bind_input(1, normal_tex.into())?;
            backend.bind_input(2, rays_buf.into())?;
            backend.bind_output(0, ao_tex.into())?;
            backend.bind_output(1, entries_buf.into())?;

            let mut cb = CbAo {
                dimensions_x: dims.width,
                dimensions_y: dims.height,
                rays_count,
                max_steps_count: self.params.max_steps,
                tile: height.tile() as u32,
                texel_size_mm: height.texel_size_mm(),
                displacement_mm: height.displacement_mm(),
                ray_weight: rays.weight(),
                ..Default::default()
            };

            let total = batches.batch_count();
            debug!(rows_per_batch, batches = total, batch_entries, "sampling");
            let mut indices = Vec::with_capacity(dims.num_pixels() * rays_count as usize);
            for (i, rows) in batches.enumerate() {
                cb.y0 = rows.start;
                backend.set_constants_pod(0, &cb)?;
                backend.dispatch(dims.width, rows_per_batch, 1)?;

                let entries: Vec<u32> = backend.read_buffer_pod(entries_buf)?;
                let valid = rows.len() * dims.width as usize * rays_count as usize;
                let batch = entries.get(..valid).ok_or_else(|| {
                    Error::backend(format!("adjacency readback holds {} entries, batch needs {valid}", entries.len()))
                })?;
                indices.extend_from_slice(batch);
                progress.report(100.0 * (i + 1) as f32 / total as f32);
            }

            backend.copy_texture(ao_staging, ao_tex)?;
            let ao: Vec<AoValue> = backend.read_texture_pod(ao_staging)?;
            Ok((ao, indices))
        })
        .stage(Stage::Occlusion)?;

        let map = IndirectMap::new(dims, rays_count, ao, indices).stage(Stage::Occlusion)?;
        let occluded = map.ao.iter().filter(|v| v.ao > 0.0).count();
        info!(occluded, pixels = dims.num_pixels(), "occlusion sampled");
        Ok(map)
    }
}
