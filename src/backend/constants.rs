//! Constant buffer and structured element layouts shared by the stages and the kernels.
//!
//! Every struct matches the kernel-side cbuffer layout (16-byte rows).

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Bilateral filter parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CbFilter {
    /// First scanline of the batch
    pub y0: u32,
    /// Spatial falloff exponent: `-0.5 / sigma_s^2`
    pub sigma_radius: f32,
    /// Range falloff exponent: `-0.5 / sigma_r^2`
    pub sigma_tolerance: f32,
    /// Tiling flag
    pub tile: u32,
}

/// AO generation parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CbAo {
    pub dimensions_x: u32,
    pub dimensions_y: u32,
    /// First scanline of the batch
    pub y0: u32,
    /// Amount of rays in the ray buffer
    pub rays_count: u32,
    /// Maximum amount of march steps before giving up
    pub max_steps_count: u32,
    pub tile: u32,
    /// Size of a texel (mm)
    pub texel_size_mm: f32,
    /// Max displacement encoded by the height map (mm)
    pub displacement_mm: f32,
    /// Monte-Carlo weight of one ray (cone solid angle / rays)
    pub ray_weight: f32,
    pub _pad: [u32; 3],
}

/// Indirect lighting parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CbIndirect {
    pub dimensions_x: u32,
    pub dimensions_y: u32,
    pub rays_count: u32,
    pub texel_size_mm: f32,
    pub displacement_mm: f32,
    pub albedo: f32,
    pub ray_weight: f32,
    pub _pad: u32,
}

/// Ground truth parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CbGroundTruth {
    pub dimensions_x: u32,
    pub dimensions_y: u32,
    /// First scanline of the batch
    pub y0: u32,
    pub rays_count: u32,
    pub texel_size_mm: f32,
    pub displacement_mm: f32,
    pub ray_weight: f32,
    pub _pad0: f32,
    /// Reflectance (rgb), w unused
    pub rho: [f32; 4],
}

impl CbGroundTruth {
    pub fn rho(&self) -> Vec3 {
        Vec3::new(self.rho[0], self.rho[1], self.rho[2])
    }
}

/// One ray direction as stored in the ray buffer (xyz, w unused).
pub type GpuRay = [f32; 4];
