//! # aobake
//!
//! Offline baker of ambient occlusion and multi-bounce indirect lighting
//! over a height field, cross-validated against a spherical-harmonics-lit
//! ground truth. The baked data is used to fit analytic AO approximations.
//!
//! ## Modules
//!
//! - [`util`] - Dimensions, errors, sampling math
//! - [`backend`] - Compute backend contract and the CPU reference backend
//! - [`bake`] - Pipeline stages (rays, bilateral, occlusion, bounces, ground truth, histograms)
//! - [`format`] - `.indirectMap`, `.AO`, `.groundTruth` and histogram files
//! - [`surface`] - Height and normal fields, map loading
//! - [`config`] - Bake parameters (JSON)
//!
//! ## Example
//!
//! ```ignore
//! use aobake::prelude::*;
//!
//! let config = BakeConfig::default();
//! let height = load_height_field("rock.png", config.texture_size_mm(), config.displacement_mm(), config.tile)?;
//! let rays = RaySet::generate(config.clamped_rays_count(), config.cone_half_angle());
//!
//! let mut backend = HostBackend::new();
//! let map = generate(&mut backend, &config, &height, None, &rays, &mut NoProgress)?;
//! let ao = BounceIntegrator::new(config.albedo).run(&mut backend, &map, &height, None, &rays, &mut NoProgress)?;
//! ao.save("rock.AO")?;
//! ```

pub mod util;
pub mod backend;
pub mod bake;
pub mod format;
pub mod surface;
pub mod config;

// Re-export commonly used types
pub use util::{Dimensions, Error, Result, Severity, Stage};
pub use backend::{ComputeBackend, HostBackend, Program};
pub use config::BakeConfig;
pub use sh_environment::ShEnvironment;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Dimensions, Error, Result, Severity, Stage};
    pub use crate::backend::{ComputeBackend, ComputeBackendExt, HostBackend, Program};
    pub use crate::bake::{
        generate, AoValue, BilateralPreprocessor, BounceIntegrator, GroundTruthRenderer, HistogramCompiler,
        NoProgress, OcclusionSampler, Progress, ProgressSpan, RaySet, BOUNCE_PLANES, MAX_BOUNCE, MAX_THREADS,
    };
    pub use crate::config::BakeConfig;
    pub use crate::format::{AoFile, IndirectMap};
    pub use crate::surface::{load_height_field, load_normal_field, HeightField, NormalField};
    pub use sh_environment::ShEnvironment;
}
