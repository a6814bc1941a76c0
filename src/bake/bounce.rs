//! Multi-bounce propagation of scalar illuminance over the adjacency map.

use tracing::{debug, info_span};

use super::progress::Progress;
use super::rays::RaySet;
use super::{BOUNCE_PLANES, MAX_BOUNCE};
use crate::backend::{
    Access, BufferDesc, CbIndirect, ComputeBackend, ComputeBackendExt, GpuRay, Program, ResourceScope,
    TexelFormat, TextureDesc,
};
use crate::format::{AoFile, IndirectMap};
use crate::surface::{HeightField, NormalField};
use crate::util::{Error, Result, Stage, StageExt};

/// Output of [`BounceIntegrator::run`], ready to be saved as an `.AO` file.
pub type BounceResult = AoFile;

/// Propagates bounce-0 illuminance for a fixed number of bounces.
#[derive(Clone, Debug)]
pub struct BounceIntegrator {
    pub albedo: f32,
    bounces: usize,
}

impl BounceIntegrator {
    pub fn new(albedo: f32) -> Self {
        Self { albedo, bounces: MAX_BOUNCE }
    }

    /// Stop after `bounces` bounces (at most `MAX_BOUNCE`); later planes stay zero.
    pub fn with_bounces(mut self, bounces: usize) -> Self {
        self.bounces = bounces.min(MAX_BOUNCE);
        self
    }

    /// Run every bounce. Plane 0 is the direct illuminance stored in `map`,
    /// plane `b` the light added by bounce `b`.
    pub fn run<B: ComputeBackend + ?Sized>(
        &self,
        backend: &mut B,
        map: &IndirectMap,
        height: &HeightField,
        normal: Option<&NormalField>,
        rays: &RaySet,
        progress: &mut dyn Progress,
    ) -> Result<BounceResult> {
        let dims = map.dims;
        let _span = info_span!("bounce", %dims, bounces = self.bounces).entered();

        height.check_dims(dims).stage(Stage::Bounce)?;
        if let Some(n) = normal {
            height.check_dims(n.dims()).stage(Stage::Bounce)?;
        }
        if rays.count() != map.rays_count {
            return Err(Error::Config(format!(
                "ray set has {} rays, the indirect map was baked with {}",
                rays.count(),
                map.rays_count
            ))
            .in_stage(Stage::Bounce));
        }
        let flat;
        let normal = match normal {
            Some(n) => n,
            None => {
                flat = NormalField::flat(dims);
                &flat
            }
        };

        let mut planes = vec![vec![0.0f32; dims.num_pixels()]; BOUNCE_PLANES];
        planes[0] = map.illuminance_plane();

        ResourceScope::run(backend, |backend, scope| {
            backend.use_program(Program::ComputeIndirectLighting)?;

            let desc = TextureDesc::new("irradiance", dims, TexelFormat::R32F, Access::GPU_WRITE);
            let ping_pong = [
                scope.texture(backend, &desc, Some(bytemuck::cast_slice(&planes[0])))?,
                scope.texture(backend, &desc, None)?,
            ];
            let staging = scope.texture(
                backend,
                &TextureDesc::new("irradiance (cpu)", dims, TexelFormat::R32F, Access::STAGING),
                None,
            )?;
            let normal_tex = scope.texture(
                backend,
                &TextureDesc::new("normal", dims, TexelFormat::RGBA32F, Access::GPU_READ),
                Some(bytemuck::cast_slice(&normal.to_texels())),
            )?;
            let adjacency = scope.buffer(
                backend,
                &BufferDesc::of::<u32>("indirect pixels", map.indices.len(), Access::GPU_READ),
                Some(bytemuck::cast_slice(&map.indices)),
            )?;
            let rays_buf = scope.buffer(
                backend,
                &BufferDesc::of::<GpuRay>("rays", rays.count() as usize, Access::GPU_READ),
                Some(bytemuck::cast_slice(&rays.to_gpu())),
            )?;

            backend.bind_input(2, normal_tex.into())?;
            backend.bind_input(3, adjacency.into())?;
            backend.bind_input(4, rays_buf.into())?;
            backend.set_constants_pod(
                0,
                &CbIndirect {
                    dimensions_x: dims.width,
                    dimensions_y: dims.height,
                    rays_count: map.rays_count,
                    texel_size_mm: height.texel_size_mm(),
                    displacement_mm: height.displacement_mm(),
                    albedo: self.albedo,
                    ray_weight: rays.weight(),
                    _pad: 0,
                },
            )?;

            let mut source = 0;
            for bounce in 1..=self.bounces {
                let target = 1 - source;
                backend.bind_input(0, ping_pong[source].into())?;
                backend.bind_output(0, ping_pong[target].into())?;
                backend.dispatch(dims.width, dims.height, 1)?;
                backend.present()?;

                backend.copy_texture(staging, ping_pong[target])?;
                planes[bounce] = backend.read_texture_pod(staging)?;
                source = target;

                debug!(bounce, total = planes[bounce].iter().sum::<f32>(), "bounce done");
                progress.report(100.0 * bounce as f32 / self.bounces as f32);
            }
            Ok(())
        })
        .stage(Stage::Bounce)?;

        AoFile::new(dims, map.ao_plane(), planes).stage(Stage::Bounce)
    }
}
