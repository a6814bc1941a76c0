//! Compute backend contract.
//!
//! The baking stages never touch a device directly: they sequence calls
//! against [`ComputeBackend`], which exposes the handful of capabilities the
//! pipeline needs (textures, structured buffers, numbered binding slots,
//! constant buffers, program selection, dispatch and synchronous readback).
//!
//! ## Architecture
//! ```text
//! stage (bake::*) → ComputeBackend → device (GPU driver, or HostBackend on the CPU)
//! ```
//!
//! [`host::HostBackend`] is the reference implementation: every program runs
//! on the CPU, which makes the pipeline testable without a GPU.

pub mod constants;
pub mod host;
mod kernels;

use std::fmt;

use bytemuck::Pod;

use crate::util::{Dimensions, Result};

pub use constants::{CbAo, CbFilter, CbGroundTruth, CbIndirect, GpuRay};
pub use host::HostBackend;

/// Compute programs known to the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    /// Edge-aware height-field smoothing
    BilateralFilter,
    /// Ray marching: AO integral, direct illuminance and adjacency entries
    GenerateAo,
    /// One bounce of scalar indirect lighting
    ComputeIndirectLighting,
    /// SH-lit direct irradiance (ground truth)
    GroundTruthDirect,
    /// One bounce of RGB indirect irradiance (ground truth)
    GroundTruthIndirect,
}

impl Program {
    /// Every program, in pipeline order.
    pub const ALL: [Program; 5] = [
        Program::BilateralFilter,
        Program::GenerateAo,
        Program::ComputeIndirectLighting,
        Program::GroundTruthDirect,
        Program::GroundTruthIndirect,
    ];

    /// Kernel entry name.
    pub fn name(&self) -> &'static str {
        match self {
            Program::BilateralFilter => "BilateralFiltering",
            Program::GenerateAo => "GenerateAO",
            Program::ComputeIndirectLighting => "ComputeIndirectLighting",
            Program::GroundTruthDirect => "GroundTruth_Direct",
            Program::GroundTruthIndirect => "GroundTruth_Indirect",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Texel layout of a 2D texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexelFormat {
    R32F,
    RG32F,
    RGBA32F,
}

impl TexelFormat {
    /// Number of f32 channels per texel.
    #[inline]
    pub const fn channels(&self) -> usize {
        match self {
            TexelFormat::R32F => 1,
            TexelFormat::RG32F => 2,
            TexelFormat::RGBA32F => 4,
        }
    }

    /// Size of one texel in bytes.
    #[inline]
    pub const fn texel_size(&self) -> usize {
        self.channels() * 4
    }
}

/// CPU / GPU access combination of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    /// Can be read back by the host
    pub cpu_read: bool,
    /// Can be bound as a kernel output
    pub gpu_write: bool,
}

impl Access {
    /// Immutable kernel input.
    pub const GPU_READ: Self = Self { cpu_read: false, gpu_write: false };
    /// Kernel output (unordered access).
    pub const GPU_WRITE: Self = Self { cpu_read: false, gpu_write: true };
    /// Host readable copy target.
    pub const STAGING: Self = Self { cpu_read: true, gpu_write: false };
    /// Kernel output that can also be read back directly.
    pub const READ_WRITE: Self = Self { cpu_read: true, gpu_write: true };
}

/// 2D texture description.
#[derive(Clone, Copy, Debug)]
pub struct TextureDesc {
    pub label: &'static str,
    pub dims: Dimensions,
    pub format: TexelFormat,
    pub access: Access,
}

impl TextureDesc {
    pub fn new(label: &'static str, dims: Dimensions, format: TexelFormat, access: Access) -> Self {
        Self { label, dims, format, access }
    }

    /// Size of the whole texture in bytes.
    pub fn byte_size(&self) -> usize {
        self.dims.num_pixels() * self.format.texel_size()
    }
}

/// Structured buffer description.
#[derive(Clone, Copy, Debug)]
pub struct BufferDesc {
    pub label: &'static str,
    /// Size of one element in bytes (multiple of 4)
    pub element_size: usize,
    /// Number of elements
    pub count: usize,
    pub access: Access,
}

impl BufferDesc {
    /// Describe a buffer of `count` elements of type `T`.
    pub fn of<T: Pod>(label: &'static str, count: usize, access: Access) -> Self {
        Self { label, element_size: std::mem::size_of::<T>(), count, access }
    }

    /// Size of the whole buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.element_size * self.count
    }
}

/// Handle of a backend texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle of a backend structured buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Resource bound to a kernel slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    Texture(TextureId),
    Buffer(BufferId),
}

impl From<TextureId> for Binding {
    fn from(id: TextureId) -> Self {
        Binding::Texture(id)
    }
}

impl From<BufferId> for Binding {
    fn from(id: BufferId) -> Self {
        Binding::Buffer(id)
    }
}

/// Capabilities the pipeline requires from a compute device.
///
/// All operations are synchronous: a dispatch is complete, and its outputs
/// visible to readback, when the call returns.
pub trait ComputeBackend {
    /// Create a 2D texture, optionally initialized with tightly packed texels.
    fn create_texture(&mut self, desc: &TextureDesc, init: Option<&[u8]>) -> Result<TextureId>;

    /// Create a structured buffer, optionally initialized.
    fn create_buffer(&mut self, desc: &BufferDesc, init: Option<&[u8]>) -> Result<BufferId>;

    /// Overwrite the start of a buffer with `data`.
    fn write_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<()>;

    /// Upload a constant buffer to a numbered slot.
    fn set_constants(&mut self, slot: u32, data: &[u8]) -> Result<()>;

    /// Bind a read-only resource to an input slot.
    fn bind_input(&mut self, slot: u32, resource: Binding) -> Result<()>;

    /// Bind a writable resource to an output slot.
    fn bind_output(&mut self, slot: u32, resource: Binding) -> Result<()>;

    /// Clear every input and output slot.
    fn unbind_all(&mut self);

    /// Select the program used by subsequent dispatches. Fails if it cannot be bound.
    fn use_program(&mut self, program: Program) -> Result<()>;

    /// Run the current program over an `x * y * z` workgroup grid.
    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    /// Copy the whole content of `src` into `dst` (same size and format).
    fn copy_texture(&mut self, dst: TextureId, src: TextureId) -> Result<()>;

    /// Read a CPU-readable texture back into host memory.
    fn read_texture(&mut self, texture: TextureId) -> Result<Vec<u8>>;

    /// Read a CPU-readable buffer back into host memory.
    fn read_buffer(&mut self, buffer: BufferId) -> Result<Vec<u8>>;

    /// Flush pending work to the device.
    fn present(&mut self) -> Result<()>;

    /// Release a texture. Unknown handles are ignored.
    fn release_texture(&mut self, texture: TextureId);

    /// Release a buffer. Unknown handles are ignored.
    fn release_buffer(&mut self, buffer: BufferId);
}

/// Typed conveniences on top of [`ComputeBackend`].
pub trait ComputeBackendExt: ComputeBackend {
    /// Upload a Pod constant buffer.
    fn set_constants_pod<T: Pod>(&mut self, slot: u32, value: &T) -> Result<()> {
        self.set_constants(slot, bytemuck::bytes_of(value))
    }

    /// Create a texture initialized from Pod texels.
    fn create_texture_pod<T: Pod>(&mut self, desc: &TextureDesc, texels: &[T]) -> Result<TextureId> {
        self.create_texture(desc, Some(bytemuck::cast_slice(texels)))
    }

    /// Create a buffer initialized from Pod elements.
    fn create_buffer_pod<T: Pod>(&mut self, desc: &BufferDesc, elements: &[T]) -> Result<BufferId> {
        self.create_buffer(desc, Some(bytemuck::cast_slice(elements)))
    }

    /// Overwrite the start of a buffer with Pod elements.
    fn write_buffer_pod<T: Pod>(&mut self, buffer: BufferId, elements: &[T]) -> Result<()> {
        self.write_buffer(buffer, bytemuck::cast_slice(elements))
    }

    /// Read a texture back as Pod texels.
    fn read_texture_pod<T: Pod>(&mut self, texture: TextureId) -> Result<Vec<T>> {
        let bytes = self.read_texture(texture)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Read a buffer back as Pod elements.
    fn read_buffer_pod<T: Pod>(&mut self, buffer: BufferId) -> Result<Vec<T>> {
        let bytes = self.read_buffer(buffer)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }
}

impl<B: ComputeBackend + ?Sized> ComputeBackendExt for B {}

/// Resources created by one pass, released together when the pass ends.
#[derive(Debug, Default)]
pub struct ResourceScope {
    textures: Vec<TextureId>,
    buffers: Vec<BufferId>,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a texture owned by this scope.
    pub fn texture<B: ComputeBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        desc: &TextureDesc,
        init: Option<&[u8]>,
    ) -> Result<TextureId> {
        let id = backend.create_texture(desc, init)?;
        self.textures.push(id);
        Ok(id)
    }

    /// Create a buffer owned by this scope.
    pub fn buffer<B: ComputeBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        desc: &BufferDesc,
        init: Option<&[u8]>,
    ) -> Result<BufferId> {
        let id = backend.create_buffer(desc, init)?;
        self.buffers.push(id);
        Ok(id)
    }

    /// Unbind everything and release every resource of the scope.
    pub fn release<B: ComputeBackend + ?Sized>(self, backend: &mut B) {
        backend.unbind_all();
        for id in self.textures {
            backend.release_texture(id);
        }
        for id in self.buffers {
            backend.release_buffer(id);
        }
    }

    /// Run `pass` with a fresh scope and release it on every exit path.
    pub fn run<B, T, F>(backend: &mut B, pass: F) -> Result<T>
    where
        B: ComputeBackend + ?Sized,
        F: FnOnce(&mut B, &mut ResourceScope) -> Result<T>,
    {
        let mut scope = ResourceScope::new();
        let result = pass(backend, &mut scope);
        scope.release(backend);
        result
    }
}
