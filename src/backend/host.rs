//! CPU implementation of the compute backend.
//!
//! Resources live in host memory and every [`Program`] is implemented by a
//! kernel in `backend::kernels`. Kernels process the rows of one dispatch in
//! parallel with rayon; the dispatch itself is synchronous like any other
//! backend call.
//!
//! The backend keeps a few counters (dispatches, presents, live resources)
//! so callers can probe how a pass drove it.

use std::collections::HashSet;

use bytemuck::Pod;

use super::kernels;
use super::{
    Access, Binding, BufferDesc, BufferId, CbAo, CbFilter, CbGroundTruth, CbIndirect,
    ComputeBackend, GpuRay, Program, TexelFormat, TextureDesc, TextureId,
};
use crate::util::{Dimensions, Error, Result};

/// Number of input slots.
pub const INPUT_SLOTS: usize = 8;
/// Number of output slots.
pub const OUTPUT_SLOTS: usize = 4;
/// Number of constant buffer slots.
pub const CONSTANT_SLOTS: usize = 2;

/// Default ceiling on the element count of one structured buffer.
pub const DEFAULT_MAX_BUFFER_ELEMENTS: usize = 1 << 26;

/// Host-side texture storage.
#[derive(Debug, Clone)]
pub(crate) struct HostTexture {
    pub label: &'static str,
    pub dims: Dimensions,
    pub format: TexelFormat,
    pub access: Access,
    /// Tightly packed channels, row-major
    pub data: Vec<f32>,
}

impl HostTexture {
    /// Check the texture has the layout a kernel expects.
    pub fn expect(&self, format: TexelFormat, dims: Dimensions) -> Result<()> {
        if self.format != format {
            return Err(Error::backend(format!(
                "texture '{}' has format {:?}, kernel expects {:?}",
                self.label, self.format, format
            )));
        }
        if self.dims != dims {
            return Err(Error::backend(format!(
                "texture '{}' is {}, kernel expects {}",
                self.label, self.dims, dims
            )));
        }
        Ok(())
    }
}

/// Host-side buffer storage, kept as 32-bit words.
#[derive(Debug, Clone)]
pub(crate) struct HostBuffer {
    pub label: &'static str,
    pub element_size: usize,
    pub count: usize,
    pub access: Access,
    pub words: Vec<u32>,
}

impl HostBuffer {
    /// View the buffer as elements of `T`.
    pub fn elements<T: Pod>(&self) -> Result<&[T]> {
        if std::mem::size_of::<T>() != self.element_size {
            return Err(Error::backend(format!(
                "buffer '{}' holds {}-byte elements, kernel reads {} bytes",
                self.label,
                self.element_size,
                std::mem::size_of::<T>()
            )));
        }
        let all: &[T] = bytemuck::try_cast_slice(&self.words)
            .map_err(|e| Error::backend(format!("buffer '{}': {e}", self.label)))?;
        Ok(&all[..self.count.min(all.len())])
    }
}

/// Store `item` in the first released slot, growing the table only when none is free.
fn claim_slot<T>(table: &mut Vec<Option<T>>, item: T) -> u32 {
    match table.iter().position(Option::is_none) {
        Some(index) => {
            table[index] = Some(item);
            index as u32
        }
        None => {
            table.push(Some(item));
            table.len() as u32 - 1
        }
    }
}

/// Counters exposed for probing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub dispatches: usize,
    pub presents: usize,
    pub readbacks: usize,
    pub uploads: usize,
}

/// Reference compute backend running every program on the CPU.
pub struct HostBackend {
    textures: Vec<Option<HostTexture>>,
    buffers: Vec<Option<HostBuffer>>,
    constants: [Vec<u8>; CONSTANT_SLOTS],
    inputs: [Option<Binding>; INPUT_SLOTS],
    outputs: [Option<Binding>; OUTPUT_SLOTS],
    program: Option<Program>,
    unavailable: HashSet<Program>,
    max_buffer_elements: usize,
    stats: BackendStats,
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBackend {
    /// Create a backend with every program available.
    pub fn new() -> Self {
        Self {
            textures: Vec::new(),
            buffers: Vec::new(),
            constants: Default::default(),
            inputs: [None; INPUT_SLOTS],
            outputs: [None; OUTPUT_SLOTS],
            program: None,
            unavailable: HashSet::new(),
            max_buffer_elements: DEFAULT_MAX_BUFFER_ELEMENTS,
            stats: BackendStats::default(),
        }
    }

    /// Make a program fail to bind, as if its kernel did not compile.
    pub fn with_unavailable(mut self, program: Program) -> Self {
        self.unavailable.insert(program);
        self
    }

    /// Override the per-buffer element ceiling.
    pub fn with_max_buffer_elements(mut self, max: usize) -> Self {
        self.max_buffer_elements = max;
        self
    }

    /// Counters since creation.
    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    /// Number of dispatches issued since creation.
    pub fn dispatch_count(&self) -> usize {
        self.stats.dispatches
    }

    /// Number of textures and buffers not released yet.
    pub fn live_resources(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
            + self.buffers.iter().filter(|b| b.is_some()).count()
    }

    fn texture(&self, id: TextureId) -> Result<&HostTexture> {
        self.textures
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::backend(format!("texture #{} is released or in use as an output", id.0)))
    }

    fn buffer(&self, id: BufferId) -> Result<&HostBuffer> {
        self.buffers
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::backend(format!("buffer #{} is released or in use as an output", id.0)))
    }

    fn input_texture(&self, slot: usize) -> Result<&HostTexture> {
        match self.inputs[slot] {
            Some(Binding::Texture(id)) => self.texture(id),
            other => Err(Error::backend(format!("input slot {slot} expects a texture, got {other:?}"))),
        }
    }

    fn input_buffer(&self, slot: usize) -> Result<&HostBuffer> {
        match self.inputs[slot] {
            Some(Binding::Buffer(id)) => self.buffer(id),
            other => Err(Error::backend(format!("input slot {slot} expects a buffer, got {other:?}"))),
        }
    }

    fn output_texture_id(&self, slot: usize) -> Result<TextureId> {
        match self.outputs[slot] {
            Some(Binding::Texture(id)) => Ok(id),
            other => Err(Error::backend(format!("output slot {slot} expects a texture, got {other:?}"))),
        }
    }

    fn output_buffer_id(&self, slot: usize) -> Result<BufferId> {
        match self.outputs[slot] {
            Some(Binding::Buffer(id)) => Ok(id),
            other => Err(Error::backend(format!("output slot {slot} expects a buffer, got {other:?}"))),
        }
    }

    fn constants<T: Pod>(&self, slot: usize) -> Result<T> {
        let bytes = &self.constants[slot];
        if bytes.len() < std::mem::size_of::<T>() {
            return Err(Error::backend(format!(
                "constant slot {slot} holds {} bytes, kernel reads {}",
                bytes.len(),
                std::mem::size_of::<T>()
            )));
        }
        Ok(bytemuck::pod_read_unaligned(&bytes[..std::mem::size_of::<T>()]))
    }

    /// Move an output texture out of the table while a kernel writes it.
    ///
    /// A texture bound both as input and output is then detected as a hazard
    /// by the input lookup.
    fn take_texture(&mut self, id: TextureId) -> Result<HostTexture> {
        self.textures
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or_else(|| Error::backend(format!("output texture #{} is released", id.0)))
    }

    fn take_buffer(&mut self, id: BufferId) -> Result<HostBuffer> {
        self.buffers
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or_else(|| Error::backend(format!("output buffer #{} is released", id.0)))
    }

    fn run_texture_kernel(&self, program: Program, target: &mut HostTexture, grid: (u32, u32)) -> Result<()> {
        match program {
            Program::BilateralFilter => {
                let cb: CbFilter = self.constants(0)?;
                kernels::bilateral::run(&cb, self.input_texture(0)?, target, grid)
            }
            Program::ComputeIndirectLighting => {
                let cb: CbIndirect = self.constants(0)?;
                kernels::indirect::run(
                    &cb,
                    self.input_texture(0)?,
                    self.input_texture(2)?,
                    self.input_buffer(3)?.elements::<u32>()?,
                    self.input_buffer(4)?.elements::<GpuRay>()?,
                    grid,
                    target,
                )
            }
            Program::GroundTruthDirect => {
                let cb: CbGroundTruth = self.constants(0)?;
                let sh: sh_environment::ShUniform = self.constants(1)?;
                kernels::ground_truth::direct(
                    &cb,
                    &sh_environment::ShEnvironment::from_uniform(&sh),
                    self.input_texture(2)?,
                    self.input_buffer(3)?.elements::<u32>()?,
                    self.input_buffer(4)?.elements::<GpuRay>()?,
                    grid,
                    target,
                )
            }
            Program::GroundTruthIndirect => {
                let cb: CbGroundTruth = self.constants(0)?;
                kernels::ground_truth::indirect(
                    &cb,
                    self.input_texture(0)?,
                    self.input_texture(2)?,
                    self.input_buffer(3)?.elements::<u32>()?,
                    self.input_buffer(4)?.elements::<GpuRay>()?,
                    grid,
                    target,
                )
            }
            Program::GenerateAo => Err(Error::backend("GenerateAO writes a texture and a buffer")),
        }
    }

    fn dispatch_generate_ao(&mut self, grid: (u32, u32)) -> Result<()> {
        let tex_id = self.output_texture_id(0)?;
        let buf_id = self.output_buffer_id(1)?;
        let mut ao = self.take_texture(tex_id)?;
        let mut entries = match self.take_buffer(buf_id) {
            Ok(b) => b,
            Err(e) => {
                self.textures[tex_id.0 as usize] = Some(ao);
                return Err(e);
            }
        };

        let result = (|| {
            let cb: CbAo = self.constants(0)?;
            if entries.element_size != 4 {
                return Err(Error::backend(format!("buffer '{}' must hold u32 entries", entries.label)));
            }
            kernels::occlusion::run(
                &cb,
                self.input_texture(0)?,
                self.input_texture(1)?,
                self.input_buffer(2)?.elements::<GpuRay>()?,
                grid,
                &mut ao,
                &mut entries.words,
            )
        })();

        self.textures[tex_id.0 as usize] = Some(ao);
        self.buffers[buf_id.0 as usize] = Some(entries);
        result
    }
}

impl ComputeBackend for HostBackend {
    fn create_texture(&mut self, desc: &TextureDesc, init: Option<&[u8]>) -> Result<TextureId> {
        if desc.dims.is_empty() {
            return Err(Error::backend(format!("texture '{}' has empty dimensions {}", desc.label, desc.dims)));
        }
        let len = desc.dims.num_pixels() * desc.format.channels();
        let data = match init {
            Some(bytes) if bytes.len() != desc.byte_size() => {
                return Err(Error::backend(format!(
                    "texture '{}' expects {} bytes of initial data, got {}",
                    desc.label,
                    desc.byte_size(),
                    bytes.len()
                )));
            }
            Some(bytes) => bytemuck::pod_collect_to_vec(bytes),
            None => vec![0.0; len],
        };
        self.stats.uploads += init.is_some() as usize;
        let texture = HostTexture {
            label: desc.label,
            dims: desc.dims,
            format: desc.format,
            access: desc.access,
            data,
        };
        Ok(TextureId(claim_slot(&mut self.textures, texture)))
    }

    fn create_buffer(&mut self, desc: &BufferDesc, init: Option<&[u8]>) -> Result<BufferId> {
        if desc.element_size == 0 || desc.element_size % 4 != 0 {
            return Err(Error::backend(format!(
                "buffer '{}' element size {} is not a multiple of 4",
                desc.label, desc.element_size
            )));
        }
        if desc.count > self.max_buffer_elements {
            return Err(Error::ResourceLimit {
                what: "structured buffer elements",
                requested: desc.count,
                limit: self.max_buffer_elements,
            });
        }
        let mut words = vec![0u32; desc.byte_size() / 4];
        if let Some(bytes) = init {
            if bytes.len() > desc.byte_size() || bytes.len() % 4 != 0 {
                return Err(Error::backend(format!(
                    "buffer '{}' holds {} bytes, got {} bytes of initial data",
                    desc.label,
                    desc.byte_size(),
                    bytes.len()
                )));
            }
            let init_words: Vec<u32> = bytemuck::pod_collect_to_vec(bytes);
            words[..init_words.len()].copy_from_slice(&init_words);
            self.stats.uploads += 1;
        }
        let buffer = HostBuffer {
            label: desc.label,
            element_size: desc.element_size,
            count: desc.count,
            access: desc.access,
            words,
        };
        Ok(BufferId(claim_slot(&mut self.buffers, buffer)))
    }

    fn write_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<()> {
        let buf = self
            .buffers
            .get_mut(buffer.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::backend(format!("buffer #{} is released", buffer.0)))?;
        if data.len() > buf.words.len() * 4 || data.len() % 4 != 0 {
            return Err(Error::backend(format!(
                "write of {} bytes into buffer '{}' of {} bytes",
                data.len(),
                buf.label,
                buf.words.len() * 4
            )));
        }
        let words: Vec<u32> = bytemuck::pod_collect_to_vec(data);
        buf.words[..words.len()].copy_from_slice(&words);
        self.stats.uploads += 1;
        Ok(())
    }

    fn set_constants(&mut self, slot: u32, data: &[u8]) -> Result<()> {
        let dst = self
            .constants
            .get_mut(slot as usize)
            .ok_or_else(|| Error::backend(format!("constant slot {slot} out of range")))?;
        dst.clear();
        dst.extend_from_slice(data);
        Ok(())
    }

    fn bind_input(&mut self, slot: u32, resource: Binding) -> Result<()> {
        let dst = self
            .inputs
            .get_mut(slot as usize)
            .ok_or_else(|| Error::backend(format!("input slot {slot} out of range")))?;
        *dst = Some(resource);
        Ok(())
    }

    fn bind_output(&mut self, slot: u32, resource: Binding) -> Result<()> {
        let writable = match resource {
            Binding::Texture(id) => self.texture(id)?.access.gpu_write,
            Binding::Buffer(id) => self.buffer(id)?.access.gpu_write,
        };
        if !writable {
            return Err(Error::backend(format!("{resource:?} is not GPU-writable")));
        }
        let dst = self
            .outputs
            .get_mut(slot as usize)
            .ok_or_else(|| Error::backend(format!("output slot {slot} out of range")))?;
        *dst = Some(resource);
        Ok(())
    }

    fn unbind_all(&mut self) {
        self.inputs = [None; INPUT_SLOTS];
        self.outputs = [None; OUTPUT_SLOTS];
    }

    fn use_program(&mut self, program: Program) -> Result<()> {
        if self.unavailable.contains(&program) {
            self.program = None;
            return Err(Error::ProgramUnavailable(program));
        }
        self.program = Some(program);
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        let program = self
            .program
            .ok_or_else(|| Error::backend("dispatch without a program in use"))?;
        if z != 1 {
            return Err(Error::backend(format!("{program} only supports 2D grids, got z={z}")));
        }
        self.stats.dispatches += 1;

        if program == Program::GenerateAo {
            return self.dispatch_generate_ao((x, y));
        }

        let id = self.output_texture_id(0)?;
        let mut target = self.take_texture(id)?;
        let result = self.run_texture_kernel(program, &mut target, (x, y));
        self.textures[id.0 as usize] = Some(target);
        result
    }

    fn copy_texture(&mut self, dst: TextureId, src: TextureId) -> Result<()> {
        let source = self.texture(src)?;
        let (dims, format, data) = (source.dims, source.format, source.data.clone());
        let target = self
            .textures
            .get_mut(dst.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::backend(format!("texture #{} is released", dst.0)))?;
        if target.dims != dims || target.format != format {
            return Err(Error::backend(format!(
                "cannot copy {dims} {format:?} into '{}' {} {:?}",
                target.label, target.dims, target.format
            )));
        }
        target.data = data;
        Ok(())
    }

    fn read_texture(&mut self, texture: TextureId) -> Result<Vec<u8>> {
        let tex = self.texture(texture)?;
        if !tex.access.cpu_read {
            return Err(Error::backend(format!("texture '{}' is not CPU-readable", tex.label)));
        }
        let bytes = bytemuck::cast_slice(&tex.data).to_vec();
        self.stats.readbacks += 1;
        Ok(bytes)
    }

    fn read_buffer(&mut self, buffer: BufferId) -> Result<Vec<u8>> {
        let buf = self.buffer(buffer)?;
        if !buf.access.cpu_read {
            return Err(Error::backend(format!("buffer '{}' is not CPU-readable", buf.label)));
        }
        let bytes = bytemuck::cast_slice(&buf.words).to_vec();
        self.stats.readbacks += 1;
        Ok(bytes)
    }

    fn present(&mut self) -> Result<()> {
        self.stats.presents += 1;
        Ok(())
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.textures.get_mut(texture.0 as usize) {
            *slot = None;
        }
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ComputeBackendExt;

    fn r32(dims: Dimensions, access: Access) -> TextureDesc {
        TextureDesc::new("test", dims, TexelFormat::R32F, access)
    }

    #[test]
    fn test_texture_roundtrip_through_staging() {
        let mut backend = HostBackend::new();
        let dims = Dimensions::new(2, 2);
        let values = [1.0f32, 2.0, 3.0, 4.0];
        let gpu = backend.create_texture_pod(&r32(dims, Access::GPU_READ), &values).unwrap();
        let cpu = backend.create_texture(&r32(dims, Access::STAGING), None).unwrap();

        // GPU-only textures cannot be read back
        assert!(backend.read_texture(gpu).is_err());

        backend.copy_texture(cpu, gpu).unwrap();
        let back: Vec<f32> = backend.read_texture_pod(cpu).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_unavailable_program() {
        let mut backend = HostBackend::new().with_unavailable(Program::GenerateAo);
        let err = backend.use_program(Program::GenerateAo).unwrap_err();
        assert!(matches!(err, Error::ProgramUnavailable(Program::GenerateAo)));
        assert!(backend.use_program(Program::BilateralFilter).is_ok());
        assert!(backend.dispatch(1, 1, 1).is_err()); // no bindings
    }

    #[test]
    fn test_buffer_ceiling() {
        let mut backend = HostBackend::new().with_max_buffer_elements(16);
        let desc = BufferDesc::of::<u32>("big", 17, Access::GPU_WRITE);
        let err = backend.create_buffer(&desc, None).unwrap_err();
        assert!(matches!(err, Error::ResourceLimit { requested: 17, limit: 16, .. }));
    }

    #[test]
    fn test_output_must_be_writable() {
        let mut backend = HostBackend::new();
        let tex = backend.create_texture(&r32(Dimensions::new(1, 1), Access::GPU_READ), None).unwrap();
        assert!(backend.bind_output(0, tex.into()).is_err());
    }

    #[test]
    fn test_release_and_live_count() {
        let mut backend = HostBackend::new();
        let tex = backend.create_texture(&r32(Dimensions::new(1, 1), Access::GPU_WRITE), None).unwrap();
        let buf = backend.create_buffer(&BufferDesc::of::<u32>("b", 1, Access::STAGING), None).unwrap();
        assert_eq!(backend.live_resources(), 2);
        backend.release_texture(tex);
        backend.release_buffer(buf);
        backend.release_buffer(buf);
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn test_released_slots_are_reused() {
        let mut backend = HostBackend::new();
        let desc = r32(Dimensions::new(2, 2), Access::GPU_WRITE);
        for _ in 0..8 {
            let a = backend.create_texture(&desc, None).unwrap();
            let b = backend.create_buffer(&BufferDesc::of::<u32>("b", 4, Access::STAGING), None).unwrap();
            assert_eq!((a, b), (TextureId(0), BufferId(0)));
            backend.release_texture(a);
            backend.release_buffer(b);
        }
        assert_eq!(backend.textures.len(), 1);
        assert_eq!(backend.buffers.len(), 1);

        let kept = backend.create_texture(&desc, None).unwrap();
        let second = backend.create_texture(&desc, None).unwrap();
        backend.release_texture(kept);
        assert_eq!(backend.create_texture(&desc, None).unwrap(), kept);
        assert_eq!(second, TextureId(1));
    }

    #[test]
    fn test_buffer_view_stops_at_count() {
        let mut backend = HostBackend::new();
        let desc = BufferDesc::of::<u32>("b", 2, Access::STAGING);
        let id = backend.create_buffer(&desc, Some(bytemuck::cast_slice(&[7u32, 9]))).unwrap();
        assert_eq!(backend.buffer(id).unwrap().elements::<u32>().unwrap(), &[7, 9]);
    }
}
