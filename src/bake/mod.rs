//! Baking stages.
//!
//! Every stage sequences calls against a [`ComputeBackend`](crate::backend::ComputeBackend)
//! passed by `&mut`, reports progress between batches and releases whatever
//! it created before returning.
//!
//! ## Data flow
//! ```text
//! RaySet ─┐
//! height ─┼─ bilateral ─ occlusion ─► IndirectMap (.indirectMap)
//! normal ─┘                              │
//!                      ┌─────────────────┴─────────────────┐
//!                   bounce (.AO)                   ground truth (.groundTruth)
//!                      └──────────── histogram ────────────┘
//! ```

pub mod batch;
pub mod bilateral;
pub mod bounce;
pub mod ground_truth;
pub mod histogram;
pub mod occlusion;
pub mod progress;
pub mod rays;

use bytemuck::{Pod, Zeroable};
use tracing::info_span;

use crate::backend::ComputeBackend;
use crate::config::BakeConfig;
use crate::format::IndirectMap;
use crate::surface::{HeightField, NormalField};
use crate::util::Result;

pub use batch::ScanlineBatches;
pub use bilateral::{BilateralParams, BilateralPreprocessor};
pub use bounce::{BounceIntegrator, BounceResult};
pub use ground_truth::{GroundTruthRenderer, GroundTruthResult};
pub use histogram::{HistogramCompiler, HistogramSample};
pub use occlusion::{OcclusionParams, OcclusionSampler};
pub use progress::{NoProgress, Progress, ProgressSpan};
pub use rays::RaySet;

/// Maximum amount of rays per pixel (one kernel thread per ray).
pub const MAX_THREADS: u32 = 1024;

/// Number of indirect bounces computed by the light transport stages.
pub const MAX_BOUNCE: usize = 20;

/// Number of illuminance planes of a bake: direct + every bounce.
pub const BOUNCE_PLANES: usize = 1 + MAX_BOUNCE;

/// Per-pixel result of the occlusion pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AoValue {
    /// Cosine-weighted occluded solid angle (2π when fully occluded)
    pub ao: f32,
    /// Direct illuminance through the unoccluded rays (π when unoccluded)
    pub illuminance: f32,
}

impl AoValue {
    pub const fn new(ao: f32, illuminance: f32) -> Self {
        Self { ao, illuminance }
    }

    /// AO remapped to [0, 1].
    #[inline]
    pub fn normalized(&self) -> f32 {
        self.ao / std::f32::consts::TAU
    }
}

/// Filter `height` and sample its occlusion: the "generate" step of a bake.
///
/// The first `config.preprocess_share` percent of `progress` covers the
/// bilateral pass, the rest the occlusion pass.
pub fn generate<B: ComputeBackend + ?Sized>(
    backend: &mut B,
    config: &BakeConfig,
    height: &HeightField,
    normal: Option<&NormalField>,
    rays: &RaySet,
    progress: &mut dyn Progress,
) -> Result<IndirectMap> {
    let _span = info_span!("generate", dims = %height.dims()).entered();
    let share = config.preprocess_share.clamp(0.0, 100.0);

    let filtered = BilateralPreprocessor::from_config(config).run(
        backend,
        height,
        &mut ProgressSpan::new(progress, 0.0, share),
    )?;
    OcclusionSampler::from_config(config).run(
        backend,
        &filtered,
        normal,
        rays,
        &mut ProgressSpan::new(progress, share, 100.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HostBackend;
    use crate::util::Dimensions;

    #[test]
    fn test_generate_reports_monotonic_progress() {
        let mut backend = HostBackend::new();
        let config = BakeConfig { rays_count: 8, max_batch_elements: 4, ..Default::default() };
        let height = HeightField::flat(Dimensions::new(4, 3), 1.0, 10.0, true).unwrap();
        let rays = RaySet::generate(config.rays_count, config.cone_half_angle());

        let mut seen = Vec::new();
        let map = generate(&mut backend, &config, &height, None, &rays, &mut |p: f32| seen.push(p)).unwrap();

        assert_eq!(map.indices.len(), 4 * 3 * 8);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(100.0));
        assert!(seen.contains(&config.preprocess_share));
        assert_eq!(backend.live_resources(), 0);
    }
}
