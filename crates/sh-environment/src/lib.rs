//! Spherical harmonics environment lighting
//!
//! A 9 coefficient (bands 0..2) RGB radiance environment, used by the
//! ground-truth renderer to light unoccluded rays.
//!
//! ## Conventions
//! - Z is up (the height-field normal of a flat surface is +Z).
//! - Coefficients are stored in (l, m) order:
//!   `Y00, Y1-1, Y10, Y11, Y2-2, Y2-1, Y20, Y21, Y22`.
//!
//! ## Usage
//!
//! ```ignore
//! use sh_environment::ShEnvironment;
//! use glam::Vec3;
//!
//! let env = ShEnvironment::sky(Vec3::new(0.6, 0.7, 1.0), Vec3::new(0.2, 0.15, 0.1));
//! let l = env.radiance(Vec3::Z);
//! let e = env.irradiance(Vec3::Z);
//! ```

mod basis;
mod environment;

pub use basis::{sh_basis, SH_COEFFS_COUNT};
pub use environment::{ShEnvironment, ShUniform};
