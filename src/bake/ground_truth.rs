//! SH-lit ground truth used to validate the baseline bake.
//!
//! Same structure as the bounce integrator (one direct pass, then one pass
//! per bounce) but RGB, lit by a 9-coefficient SH environment and a
//! reflectance triple. Every pass is re-batched over fixed groups of
//! scanlines, with the matching adjacency slice uploaded before each batch.

use std::sync::Arc;

use glam::{Vec3, Vec4};
use sh_environment::ShEnvironment;
use tracing::{debug, info, info_span};

use super::batch::ScanlineBatches;
use super::progress::Progress;
use super::rays::RaySet;
use super::{BOUNCE_PLANES, MAX_BOUNCE};
use crate::backend::{
    Access, BufferDesc, CbGroundTruth, ComputeBackend, ComputeBackendExt, GpuRay, Program, ResourceScope,
    TexelFormat, TextureDesc, TextureId,
};
use crate::config::{BakeConfig, SCANLINES_COUNT};
use crate::format::IndirectMap;
use crate::surface::{HeightField, NormalField};
use crate::util::{Dimensions, Error, Result, Stage, StageExt};

/// RGBA irradiance planes: plane 0 direct, plane `b` bounce `b`. Alpha is 0.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundTruthResult {
    pub dims: Dimensions,
    pub planes: Vec<Vec<Vec4>>,
}

pub struct GroundTruthRenderer {
    environment: ShEnvironment,
    scanlines: u32,
    bounces: usize,
    /// Last result and the reflectance it was rendered with
    cache: Option<(Vec3, Arc<GroundTruthResult>)>,
}

impl GroundTruthRenderer {
    pub fn new(environment: ShEnvironment) -> Self {
        Self { environment, scanlines: SCANLINES_COUNT, bounces: MAX_BOUNCE, cache: None }
    }

    pub fn from_config(config: &BakeConfig) -> Self {
        Self::new(config.environment).with_scanlines(config.ground_truth_scanlines)
    }

    /// Scanlines per batch.
    pub fn with_scanlines(mut self, scanlines: u32) -> Self {
        self.scanlines = scanlines.max(1);
        self
    }

    /// Stop after `bounces` bounces (at most `MAX_BOUNCE`); later planes stay zero.
    pub fn with_bounces(mut self, bounces: usize) -> Self {
        self.bounces = bounces.min(MAX_BOUNCE);
        self
    }

    pub fn environment(&self) -> &ShEnvironment {
        &self.environment
    }

    /// Replace the lighting. Drops the cached result.
    pub fn set_environment(&mut self, environment: ShEnvironment) {
        self.environment = environment;
        self.cache = None;
    }

    /// Forget the cached result.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Render the ground truth for reflectance `rho`.
    ///
    /// Returns the cached result untouched when `rho` did not change since
    /// the last render, and `None` without a normal field.
    #[allow(clippy::too_many_arguments)]
    pub fn render<B: ComputeBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        map: &IndirectMap,
        height: &HeightField,
        normal: Option<&NormalField>,
        rays: &RaySet,
        rho: Vec3,
        progress: &mut dyn Progress,
    ) -> Result<Option<Arc<GroundTruthResult>>> {
        if let Some((last_rho, result)) = &self.cache {
            if *last_rho == rho {
                debug!(%rho, "ground truth cache hit");
                return Ok(Some(Arc::clone(result)));
            }
        }
        let Some(normal) = normal else {
            return Ok(None);
        };

        let result = Arc::new(self.render_uncached(backend, map, height, normal, rays, rho, progress)?);
        self.cache = Some((rho, Arc::clone(&result)));
        Ok(Some(result))
    }

    #[allow(clippy::too_many_arguments)]
    fn render_uncached<B: ComputeBackend + ?Sized>(
        &self,
        backend: &mut B,
        map: &IndirectMap,
        height: &HeightField,
        normal: &NormalField,
        rays: &RaySet,
        rho: Vec3,
        progress: &mut dyn Progress,
    ) -> Result<GroundTruthResult> {
        let dims = map.dims;
        let _span = info_span!("ground_truth", %dims, %rho).entered();

        height.check_dims(dims).stage(Stage::GroundTruth)?;
        height.check_dims(normal.dims()).stage(Stage::GroundTruth)?;
        if rays.count() != map.rays_count {
            return Err(Error::Config(format!(
                "ray set has {} rays, the indirect map was baked with {}",
                rays.count(),
                map.rays_count
            ))
            .in_stage(Stage::GroundTruth));
        }

        let rays_count = map.rays_count;
        let batches = ScanlineBatches::new(dims.height, self.scanlines);
        let slice_entries = self.scanlines as usize * dims.width as usize * rays_count as usize;
        let total_steps = (1 + self.bounces) * batches.batch_count();
        let mut planes = vec![vec![Vec4::ZERO; dims.num_pixels()]; BOUNCE_PLANES];

        ResourceScope::run(backend, |backend, scope| {
            // Both programs must bind before anything is dispatched
            backend.use_program(Program::GroundTruthIndirect)?;
            backend.use_program(Program::GroundTruthDirect)?;

            let desc = TextureDesc::new("irradiance", dims, TexelFormat::RGBA32F, Access::GPU_WRITE);
            let ping_pong = [scope.texture(backend, &desc, None)?, scope.texture(backend, &desc, None)?];
            let staging = scope.texture(
                backend,
                &TextureDesc::new("ground truth (cpu)", dims, TexelFormat::RGBA32F, Access::STAGING),
                None,
            )?;
            let normal_tex = scope.texture(
                backend,
                &TextureDesc::new("normal", dims, TexelFormat::RGBA32F, Access::GPU_READ),
                Some(bytemuck::cast_slice(&normal.to_texels())),
            )?;
            let slice_buf = scope.buffer(
                backend,
                &BufferDesc::of::<u32>("indirect pixels slice", slice_entries, Access::GPU_READ),
                None,
            )?;
            let rays_buf = scope.buffer(
                backend,
                &BufferDesc::of::<GpuRay>("rays", rays_count as usize, Access::GPU_READ),
                Some(bytemuck::cast_slice(&rays.to_gpu())),
            )?;

            backend.set_constants_pod(1, &self.environment.to_uniform())?;
            backend.bind_input(2, normal_tex.into())?;
            backend.bind_input(3, slice_buf.into())?;
            backend.bind_input(4, rays_buf.into())?;

            let mut cb = CbGroundTruth {
                dimensions_x: dims.width,
                dimensions_y: dims.height,
                rays_count,
                texel_size_mm: height.texel_size_mm(),
                displacement_mm: height.displacement_mm(),
                ray_weight: rays.weight(),
                rho: rho.extend(0.0).to_array(),
                ..Default::default()
            };

            let mut step = 0;
            let mut run_pass = |backend: &mut B, target: TextureId| -> Result<Vec<Vec4>> {
                backend.bind_output(0, target.into())?;
                for rows in batches.clone() {
                    cb.y0 = rows.start;
                    backend.set_constants_pod(0, &cb)?;
                    backend.write_buffer_pod(slice_buf, map.rows(rows))?;
                    backend.dispatch(dims.width, self.scanlines, 1)?;
                    step += 1;
                    progress.report(100.0 * step as f32 / total_steps as f32);
                }
                backend.present()?;
                backend.copy_texture(staging, target)?;
                backend.read_texture_pod(staging)
            };

            // Direct lighting
            planes[0] = run_pass(backend, ping_pong[0])?;

            // Bounces
            backend.use_program(Program::GroundTruthIndirect)?;
            let mut source = 0;
            for bounce in 1..=self.bounces {
                let target = 1 - source;
                backend.bind_input(0, ping_pong[source].into())?;
                planes[bounce] = run_pass(backend, ping_pong[target])?;
                source = target;
            }
            Ok(())
        })
        .stage(Stage::GroundTruth)?;

        info!(bounces = self.bounces, "ground truth rendered");
        Ok(GroundTruthResult { dims, planes })
    }
}
