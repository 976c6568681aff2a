// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A [Backend] on wgpu.

Shaders are WGSL; the profile and flags of a compile request are accepted but not interpreted.
See [pipeline] for how bound views reach a shader.

Mapping is emulated.  A discarding write map hands out a zeroed CPU copy that is uploaded through
the queue on unmap.  A read map (staging buffers only) waits for the device and copies the buffer
out, so the mapped bytes stay valid until unmap without holding a wgpu mapping open.
*/

mod bound_device;
mod buffer;
mod error;
mod pipeline;
mod pixel_format;
mod texture;

use std::borrow::Cow;

use crate::factory::{BufferDesc, TextureDesc};
use crate::imp::{Backend, MapMode, MappedRegion, Resource};
use crate::session::DeviceConfig;
use crate::shader::{CompileFailure, CompileRequest};
use crate::status::Status;

pub use bound_device::{BoundContext, BoundDevice};
pub use buffer::WgpuBuffer;
pub(crate) use error::Error;
use error::scoped;
use pipeline::{PipelineCache, Signature};
use pixel_format::SampleKind;
pub use texture::WgpuTexture;

/// A compiled WGSL module and the entry point to run.
#[derive(Debug)]
pub struct WgpuProgram {
    id: u64,
    module: wgpu::ShaderModule,
    entry_point: String,
    label: String,
}

#[derive(Debug, Clone)]
pub enum WgpuReadView {
    Buffer {
        id: u64,
        buffer: wgpu::Buffer,
    },
    Texture {
        id: u64,
        view: wgpu::TextureView,
        sample: SampleKind,
    },
}

#[derive(Debug, Clone)]
pub struct WgpuWriteView {
    id: u64,
    buffer: wgpu::Buffer,
}

#[derive(Debug)]
struct Mapping {
    id: u64,
    mode: MapMode,
    bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct WgpuBackend {
    instance: wgpu::Instance,
    next_id: u64,
    mapping: Option<Mapping>,
    read: Vec<Option<WgpuReadView>>,
    constant: Vec<Option<WgpuBuffer>>,
    write: Vec<Option<WgpuWriteView>>,
    pipelines: PipelineCache,
}

impl Default for WgpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WgpuBackend {
    /// Backends are picked from the `WGPU_BACKEND` environment variable, or all of them.
    pub fn new() -> Self {
        let descriptor = wgpu::InstanceDescriptor::from_env_or_default();
        WgpuBackend {
            instance: wgpu::Instance::new(&descriptor),
            next_id: 0,
            mapping: None,
            read: Vec::new(),
            constant: Vec::new(),
            write: Vec::new(),
            pipelines: PipelineCache::default(),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn unbind_everything(&mut self) {
        self.read.clear();
        self.constant.clear();
        self.write.clear();
    }
}

fn resource_id(resource: Resource<'_, WgpuBackend>) -> u64 {
    match resource {
        Resource::Buffer(buffer) => buffer.id,
        Resource::Texture(texture) => texture.id,
    }
}

fn place<T: Clone>(bound: &mut Vec<Option<T>>, start_slot: u32, values: &[Option<T>]) {
    let start = start_slot as usize;
    let end = start + values.len();
    if bound.len() < end {
        bound.resize(end, None);
    }
    bound[start..end].clone_from_slice(values);
    while bound.last().is_some_and(Option::is_none) {
        bound.pop();
    }
}

impl Backend for WgpuBackend {
    type Device = BoundDevice;
    type Context = BoundContext;
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type ReadView = WgpuReadView;
    type WriteView = WgpuWriteView;

    fn create_device(
        &mut self,
        config: &DeviceConfig,
    ) -> Result<(Self::Device, Self::Context), Status> {
        let device_id = self.next_id();
        let context_id = self.next_id();
        Ok(bound_device::bind(
            &self.instance,
            config,
            device_id,
            context_id,
        )?)
    }

    fn release_device(&mut self, device: Self::Device) {
        logwise::debuginternal_sync!("releasing device {id}", id = device.id);
        self.pipelines = PipelineCache::default();
    }

    fn release_context(&mut self, context: Self::Context) {
        logwise::debuginternal_sync!("releasing context {id}", id = context.id);
        self.mapping = None;
        self.unbind_everything();
    }

    fn compile(
        &mut self,
        device: &Self::Device,
        request: &CompileRequest<'_>,
    ) -> Result<Self::Program, CompileFailure> {
        let id = self.next_id();
        let label = if request.debug_name.is_empty() {
            format!("kernels_and_views program {id}")
        } else {
            request.debug_name.to_string()
        };
        let module = scoped(&device.device, || {
            let module = device
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&label),
                    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(request.source)),
                });
            //checks that the entry point exists and is a compute shader
            device
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&label),
                    layout: None,
                    module: &module,
                    entry_point: Some(request.entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                });
            module
        })
        .map_err(|e| CompileFailure {
            status: Status::Fail,
            diagnostics: e.to_string(),
        })?;
        Ok(WgpuProgram {
            id,
            module,
            entry_point: request.entry_point.to_string(),
            label,
        })
    }

    fn release_program(&mut self, program: Self::Program) {
        self.pipelines.forget(program.id);
    }

    fn create_buffer(
        &mut self,
        device: &Self::Device,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self::Buffer, Status> {
        let id = self.next_id();
        Ok(buffer::create(&device.device, id, desc, initial_data)?)
    }

    fn create_buffer_read_view(
        &mut self,
        _device: &Self::Device,
        buffer: &Self::Buffer,
        _desc: &BufferDesc,
    ) -> Result<Self::ReadView, Status> {
        Ok(WgpuReadView::Buffer {
            id: self.next_id(),
            buffer: buffer.raw.clone(),
        })
    }

    fn create_buffer_write_view(
        &mut self,
        _device: &Self::Device,
        buffer: &Self::Buffer,
        _desc: &BufferDesc,
    ) -> Result<Self::WriteView, Status> {
        Ok(WgpuWriteView {
            id: self.next_id(),
            buffer: buffer.raw.clone(),
        })
    }

    fn create_texture(
        &mut self,
        device: &Self::Device,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self::Texture, Status> {
        let id = self.next_id();
        Ok(texture::create(
            &device.device,
            &device.queue,
            id,
            desc,
            initial_data,
        )?)
    }

    fn create_texture_read_view(
        &mut self,
        device: &Self::Device,
        texture: &Self::Texture,
        _desc: &TextureDesc,
    ) -> Result<Self::ReadView, Status> {
        let view = scoped(&device.device, || {
            texture.raw.create_view(&wgpu::TextureViewDescriptor::default())
        })?;
        Ok(WgpuReadView::Texture {
            id: self.next_id(),
            view,
            sample: SampleKind::of(texture.format),
        })
    }

    fn release_buffer(&mut self, buffer: Self::Buffer) {
        logwise::debuginternal_sync!("releasing buffer {id}", id = buffer.id);
    }

    fn release_texture(&mut self, texture: Self::Texture) {
        logwise::debuginternal_sync!("releasing texture {id}", id = texture.id);
    }

    fn release_read_view(&mut self, view: Self::ReadView) {
        let id = match view {
            WgpuReadView::Buffer { id, .. } | WgpuReadView::Texture { id, .. } => id,
        };
        logwise::debuginternal_sync!("releasing read view {id}", id = id);
    }

    fn release_write_view(&mut self, view: Self::WriteView) {
        logwise::debuginternal_sync!("releasing write view {id}", id = view.id);
    }

    fn map(
        &mut self,
        context: &Self::Context,
        resource: Resource<'_, Self>,
        mode: MapMode,
    ) -> Result<MappedRegion, Status> {
        if self.mapping.is_some() {
            return Err(Status::InvalidCall);
        }
        let (bytes, row_pitch) = match (resource, mode) {
            (Resource::Buffer(buffer), MapMode::WriteDiscard) => {
                (vec![0; buffer.len], buffer.len)
            }
            (Resource::Buffer(buffer), MapMode::Read) => {
                if !buffer.usage.cpu_readable() {
                    return Err(Status::InvalidArg);
                }
                (buffer::read_back(&context.device, buffer)?, buffer.len)
            }
            (Resource::Texture(texture), MapMode::WriteDiscard) => {
                (vec![0; texture::mapped_len(texture)], texture.row_pitch)
            }
            (Resource::Texture(_), MapMode::Read) => return Err(Status::InvalidArg),
        };
        let region = MappedRegion {
            row_pitch,
            len: bytes.len(),
        };
        self.mapping = Some(Mapping {
            id: resource_id(resource),
            mode,
            bytes,
        });
        Ok(region)
    }

    fn mapped_bytes(&mut self, resource: Resource<'_, Self>) -> &mut [u8] {
        let id = resource_id(resource);
        match &mut self.mapping {
            Some(mapping) if mapping.id == id => mapping.bytes.as_mut_slice(),
            _ => &mut [],
        }
    }

    fn unmap(
        &mut self,
        context: &Self::Context,
        resource: Resource<'_, Self>,
    ) -> Result<(), Status> {
        let Some(mapping) = self
            .mapping
            .take_if(|mapping| mapping.id == resource_id(resource))
        else {
            return Ok(());
        };
        if mapping.mode != MapMode::WriteDiscard {
            return Ok(());
        }
        scoped(&context.device, || match resource {
            Resource::Buffer(buffer) => buffer::upload(&context.queue, buffer, &mapping.bytes),
            Resource::Texture(texture) => {
                texture::upload(&context.queue, texture, &mapping.bytes)
            }
        })
        .map_err(|e| {
            logwise::error_sync!("upload on unmap failed: {e}", e = logwise::privacy::LogIt(&e));
            e.status()
        })
    }

    fn copy_buffer(
        &mut self,
        context: &Self::Context,
        destination: &Self::Buffer,
        source: &Self::Buffer,
    ) -> Result<(), Status> {
        let size = source.raw.size().min(destination.raw.size());
        Ok(scoped(&context.device, || {
            let mut encoder =
                context
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("kernels_and_views copy"),
                    });
            encoder.copy_buffer_to_buffer(&source.raw, 0, &destination.raw, 0, size);
            context.queue.submit([encoder.finish()]);
        })?)
    }

    fn set_read_views(
        &mut self,
        _context: &Self::Context,
        start_slot: u32,
        views: &[Option<Self::ReadView>],
    ) {
        place(&mut self.read, start_slot, views);
    }

    fn set_constant_buffers(
        &mut self,
        _context: &Self::Context,
        start_slot: u32,
        buffers: &[Option<Self::Buffer>],
    ) {
        place(&mut self.constant, start_slot, buffers);
    }

    fn set_write_views(
        &mut self,
        _context: &Self::Context,
        start_slot: u32,
        views: &[Option<Self::WriteView>],
    ) {
        place(&mut self.write, start_slot, views);
    }

    fn dispatch(
        &mut self,
        context: &Self::Context,
        program: &Self::Program,
        groups: [u32; 3],
    ) -> Result<(), Status> {
        let device = &context.device;
        let signature = Signature::of(&self.read, &self.constant, &self.write);
        let (read, constant, write) = (&self.read, &self.constant, &self.write);
        let pipelines = &mut self.pipelines;
        Ok(scoped(device, || {
            let pipeline = pipelines.get(device, program, signature);
            let bind_groups = pipeline::bind_groups(device, pipeline, read, constant, write);
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&program.label),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(&program.label),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&pipeline.raw);
                for (index, group) in bind_groups.iter().enumerate() {
                    pass.set_bind_group(index as u32, group, &[]);
                }
                let [x, y, z] = groups;
                pass.dispatch_workgroups(x, y, z);
            }
            context.queue.submit([encoder.finish()]);
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placing_trims_trailing_empties() {
        let mut bound = vec![Some(1), Some(2)];
        place(&mut bound, 3, &[Some(4)]);
        assert_eq!(bound, vec![Some(1), Some(2), None, Some(4)]);
        place(&mut bound, 2, &[None, None]);
        assert_eq!(bound, vec![Some(1), Some(2)]);
        place(&mut bound, 0, &[None, None]);
        assert!(bound.is_empty());
    }
}
