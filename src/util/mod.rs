//! Utility types and functions for the baker.
//!
//! This module contains fundamental types used throughout the library:
//! - [`Dimensions`] - Grid size and pixel addressing
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam and sampling helpers

mod dimensions;
mod error;
mod math;

pub use dimensions::*;
pub use error::*;
pub use math::*;
