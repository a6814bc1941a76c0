//! Edge-aware pre-filtering of the height field.

use tracing::{debug, info_span};

use super::batch::ScanlineBatches;
use super::progress::Progress;
use crate::backend::{
    Access, CbFilter, ComputeBackend, ComputeBackendExt, Program, ResourceScope, TexelFormat, TextureDesc,
};
use crate::config::BakeConfig;
use crate::surface::HeightField;
use crate::util::{Result, Stage, StageExt};

/// Falloff exponent used to switch a Gaussian term off.
const DISABLED_FALLOFF: f32 = -1e6;

/// Filter parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BilateralParams {
    /// Spatial radius in texels (3 sigma)
    pub radius: f32,
    /// Height tolerance; `<= 0` disables range weighting
    pub tolerance: f32,
    pub tile: bool,
}

impl BilateralParams {
    /// Spatial falloff exponent `-0.5 / sigma_s^2` with `sigma_s = radius / 3`.
    pub fn sigma_radius(&self) -> f32 {
        if self.radius > 0.0 {
            -0.5 * (self.radius / 3.0).powi(-2)
        } else {
            DISABLED_FALLOFF
        }
    }

    /// Range falloff exponent `-0.5 / tolerance^2`.
    pub fn sigma_tolerance(&self) -> f32 {
        if self.tolerance > 0.0 {
            -0.5 * self.tolerance.powi(-2)
        } else {
            DISABLED_FALLOFF
        }
    }

    fn constants(&self, y0: u32) -> CbFilter {
        CbFilter {
            y0,
            sigma_radius: self.sigma_radius(),
            sigma_tolerance: self.sigma_tolerance(),
            tile: self.tile as u32,
        }
    }
}

/// Runs the bilateral filter in scanline batches.
#[derive(Clone, Debug)]
pub struct BilateralPreprocessor {
    pub params: BilateralParams,
    pub max_batch_elements: u32,
}

impl BilateralPreprocessor {
    pub fn new(params: BilateralParams, max_batch_elements: u32) -> Self {
        Self { params, max_batch_elements }
    }

    pub fn from_config(config: &BakeConfig) -> Self {
        Self::new(
            BilateralParams {
                radius: config.bilateral_radius,
                tolerance: config.bilateral_tolerance,
                tile: config.tile,
            },
            config.max_batch_elements,
        )
    }

    /// Filter `height`, returning a field with the same geometry.
    pub fn run<B: ComputeBackend + ?Sized>(
        &self,
        backend: &mut B,
        height: &HeightField,
        progress: &mut dyn Progress,
    ) -> Result<HeightField> {
        let dims = height.dims();
        let _span = info_span!("bilateral", %dims).entered();

        let filtered = ResourceScope::run(backend, |backend, scope| {
            backend.use_program(Program::BilateralFilter)?;

            let source = scope.texture(
                backend,
                &TextureDesc::new("height", dims, TexelFormat::R32F, Access::GPU_READ),
                Some(bytemuck::cast_slice(height.samples())),
            )?;
            let target = scope.texture(
                backend,
                &TextureDesc::new("filtered height", dims, TexelFormat::R32F, Access::GPU_WRITE),
                None,
            )?;
            let staging = scope.texture(
                backend,
                &TextureDesc::new("filtered height (cpu)", dims, TexelFormat::R32F, Access::STAGING),
                None,
            )?;

            backend.bind_input(0, source.into())?;
            backend.bind_output(0, target.into())?;

            let batches = ScanlineBatches::for_width(dims.width, dims.height, self.max_batch_elements);
            let (rows_per_batch, total) = (batches.batch_height(), batches.batch_count());
            debug!(rows_per_batch, batches = total, "filtering");

            for (i, rows) in batches.enumerate() {
                backend.set_constants_pod(0, &self.params.constants(rows.start))?;
                backend.dispatch(dims.width, rows_per_batch, 1)?;
                backend.present()?;
                progress.report(100.0 * (i + 1) as f32 / total as f32);
            }

            backend.copy_texture(staging, target)?;
            backend.read_texture_pod::<f32>(staging)
        })
        .stage(Stage::Bilateral)?;

        height.with_samples(filtered).stage(Stage::Bilateral)
    }
}
