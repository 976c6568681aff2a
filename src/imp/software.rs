// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A backend that keeps every resource in CPU memory.

Buffers and textures are byte vectors.  Textures are laid out with a configurable row pitch so
that padded rows behave as they do on a GPU.  Programs are Rust closures registered by entry
point with [SoftwareBackend::register_kernel]; compiling an entry point nobody registered fails
with diagnostics, and the source text is not interpreted.

Every native object is tracked, so tests can count creations, releases and double releases, and
[SoftwareBackend::fail_next] makes the next call of a given [Operation] fail with a chosen
status.
*/

use std::collections::HashMap;

use crate::factory::{BufferDesc, BufferUsage, TextureDesc};
use crate::imp::{Backend, MapMode, MappedRegion, Resource};
use crate::session::{DeviceConfig, DriverType};
use crate::shader::{CompileFailure, CompileRequest};
use crate::status::Status;
use crate::view_cache::ViewKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareConfig {
    /// Texture rows start at multiples of this many bytes.
    pub row_pitch_alignment: usize,
}

impl Default for SoftwareConfig {
    fn default() -> Self {
        SoftwareConfig {
            row_pitch_alignment: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ObjectId(u64);

#[derive(Debug, PartialEq, Eq)]
pub struct SoftwareDevice(ObjectId);
#[derive(Debug, PartialEq, Eq)]
pub struct SoftwareContext(ObjectId);
#[derive(Debug, PartialEq, Eq)]
pub struct SoftwareProgram(ObjectId);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareBuffer(ObjectId);
#[derive(Debug, PartialEq, Eq)]
pub struct SoftwareTexture(ObjectId);

/// A view of a buffer or texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareView {
    id: ObjectId,
    target: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Device,
    Context,
    Program,
    Buffer,
    Texture,
    ReadView,
    WriteView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub created: usize,
    pub released: usize,
}

/// Backend calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateDevice,
    Compile,
    CreateBuffer,
    CreateReadView,
    CreateWriteView,
    CreateTexture,
    CreateTextureView,
    Map,
    Unmap,
    Copy,
    Dispatch,
}

#[derive(Debug)]
enum Object {
    Device,
    Context,
    Program {
        entry_point: String,
    },
    Buffer {
        bytes: Vec<u8>,
        usage: BufferUsage,
    },
    Texture {
        bytes: Vec<u8>,
        row_pitch: usize,
    },
    View {
        kind: ObjectKind,
    },
}

impl Object {
    fn kind(&self) -> ObjectKind {
        match self {
            Object::Device => ObjectKind::Device,
            Object::Context => ObjectKind::Context,
            Object::Program { .. } => ObjectKind::Program,
            Object::Buffer { .. } => ObjectKind::Buffer,
            Object::Texture { .. } => ObjectKind::Texture,
            Object::View { kind } => *kind,
        }
    }

    fn bytes(&self) -> Option<&Vec<u8>> {
        match self {
            Object::Buffer { bytes, .. } | Object::Texture { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    fn bytes_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Object::Buffer { bytes, .. } | Object::Texture { bytes, .. } => Some(bytes),
            _ => None,
        }
    }
}

/// What a kernel sees while it runs.
pub struct Invocation<'a> {
    pub groups: [u32; 3],
    read: &'a [Option<Vec<u8>>],
    constant: &'a [Option<Vec<u8>>],
    read_write: &'a mut [Option<Vec<u8>>],
}

impl Invocation<'_> {
    /// Contents behind the read view at `slot`.
    pub fn read(&self, slot: usize) -> Option<&[u8]> {
        self.read.get(slot)?.as_deref()
    }

    pub fn constant(&self, slot: usize) -> Option<&[u8]> {
        self.constant.get(slot)?.as_deref()
    }

    /// Contents behind the read-write view at `slot`.  Writes land in the buffer.
    pub fn read_write(&mut self, slot: usize) -> Option<&mut [u8]> {
        self.read_write.get_mut(slot)?.as_deref_mut()
    }
}

type Kernel = Box<dyn FnMut(&mut Invocation<'_>)>;

pub struct SoftwareBackend {
    config: SoftwareConfig,
    next_id: u64,
    objects: HashMap<ObjectId, Object>,
    counts: HashMap<ObjectKind, Counts>,
    double_releases: usize,
    kernels: HashMap<String, Kernel>,
    failures: Vec<(Operation, Status)>,
    mapped: Option<ObjectId>,
    bound_read: Vec<Option<SoftwareView>>,
    bound_constant: Vec<Option<SoftwareBuffer>>,
    bound_write: Vec<Option<SoftwareView>>,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        SoftwareBackend::new(SoftwareConfig::default())
    }
}

impl std::fmt::Debug for SoftwareBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareBackend")
            .field("config", &self.config)
            .field("live_objects", &self.objects.len())
            .field("kernels", &self.kernels.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SoftwareBackend {
    pub fn new(config: SoftwareConfig) -> Self {
        SoftwareBackend {
            config,
            next_id: 1,
            objects: HashMap::new(),
            counts: HashMap::new(),
            double_releases: 0,
            kernels: HashMap::new(),
            failures: Vec::new(),
            mapped: None,
            bound_read: Vec::new(),
            bound_constant: Vec::new(),
            bound_write: Vec::new(),
        }
    }

    /// Makes `entry_point` compilable.  Dispatching it runs `kernel` once.
    pub fn register_kernel(
        &mut self,
        entry_point: impl Into<String>,
        kernel: impl FnMut(&mut Invocation<'_>) + 'static,
    ) {
        self.kernels.insert(entry_point.into(), Box::new(kernel));
    }

    /// The next call of `operation` fails with `status`.
    pub fn fail_next(&mut self, operation: Operation, status: Status) {
        self.failures.push((operation, status));
    }

    pub fn counts(&self, kind: ObjectKind) -> Counts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    /// Releases of objects that were already gone.
    pub fn double_releases(&self) -> usize {
        self.double_releases
    }

    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Number of occupied slots of `kind`.
    pub fn bound_count(&self, kind: ViewKind) -> usize {
        match kind {
            ViewKind::ReadOnly => self.bound_read.iter().flatten().count(),
            ViewKind::ReadWrite => self.bound_write.iter().flatten().count(),
            ViewKind::Constant => self.bound_constant.iter().flatten().count(),
        }
    }

    pub fn buffer_bytes(&self, buffer: &SoftwareBuffer) -> Option<&[u8]> {
        self.objects.get(&buffer.0)?.bytes().map(Vec::as_slice)
    }

    /// Texture contents including row padding.
    pub fn texture_bytes(&self, texture: &SoftwareTexture) -> Option<&[u8]> {
        self.objects.get(&texture.0)?.bytes().map(Vec::as_slice)
    }

    fn take_failure(&mut self, operation: Operation) -> Result<(), Status> {
        match self.failures.iter().position(|(op, _)| *op == operation) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }

    fn insert(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.counts.entry(object.kind()).or_default().created += 1;
        self.objects.insert(id, object);
        id
    }

    fn release(&mut self, id: ObjectId) {
        match self.objects.remove(&id) {
            Some(object) => {
                self.counts.entry(object.kind()).or_default().released += 1;
                if self.mapped == Some(id) {
                    self.mapped = None;
                }
            }
            None => {
                logwise::warn_sync!("software object {id} released twice", id = id.0);
                self.double_releases += 1;
            }
        }
    }

    fn aligned_row_pitch(&self, row_bytes: usize) -> Option<usize> {
        row_bytes.checked_next_multiple_of(self.config.row_pitch_alignment.max(1))
    }

    fn snapshot(&self, target: ObjectId) -> Option<Vec<u8>> {
        self.objects.get(&target)?.bytes().cloned()
    }
}

/// `len` zeroed bytes, or [Status::OutOfMemory] when they can't be had.
fn zeroed(len: usize) -> Result<Vec<u8>, Status> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| Status::OutOfMemory)?;
    bytes.resize(len, 0);
    Ok(bytes)
}

fn place<T: Clone>(slots: &mut Vec<Option<T>>, start_slot: u32, values: &[Option<T>]) {
    let start = start_slot as usize;
    if slots.len() < start + values.len() {
        slots.resize(start + values.len(), None);
    }
    slots[start..start + values.len()].clone_from_slice(values);
}

impl Backend for SoftwareBackend {
    type Device = SoftwareDevice;
    type Context = SoftwareContext;
    type Program = SoftwareProgram;
    type Buffer = SoftwareBuffer;
    type Texture = SoftwareTexture;
    type ReadView = SoftwareView;
    type WriteView = SoftwareView;

    fn create_device(
        &mut self,
        config: &DeviceConfig,
    ) -> Result<(Self::Device, Self::Context), Status> {
        self.take_failure(Operation::CreateDevice)?;
        if config.driver_type == DriverType::Null {
            return Err(Status::Fail);
        }
        let device = self.insert(Object::Device);
        let context = self.insert(Object::Context);
        Ok((SoftwareDevice(device), SoftwareContext(context)))
    }

    fn release_device(&mut self, device: Self::Device) {
        self.release(device.0);
    }

    fn release_context(&mut self, context: Self::Context) {
        self.bound_read.clear();
        self.bound_constant.clear();
        self.bound_write.clear();
        self.release(context.0);
    }

    fn compile(
        &mut self,
        _device: &Self::Device,
        request: &CompileRequest<'_>,
    ) -> Result<Self::Program, CompileFailure> {
        self.take_failure(Operation::Compile)
            .map_err(|status| CompileFailure {
                status,
                diagnostics: format!("{}: compilation failed", request.debug_name),
            })?;
        if !self.kernels.contains_key(request.entry_point) {
            return Err(CompileFailure {
                status: Status::Fail,
                diagnostics: format!(
                    "{}: error X3501: '{}': entrypoint not found",
                    request.debug_name, request.entry_point
                ),
            });
        }
        let id = self.insert(Object::Program {
            entry_point: request.entry_point.to_string(),
        });
        Ok(SoftwareProgram(id))
    }

    fn release_program(&mut self, program: Self::Program) {
        self.release(program.0);
    }

    fn create_buffer(
        &mut self,
        _device: &Self::Device,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self::Buffer, Status> {
        self.take_failure(Operation::CreateBuffer)?;
        let len = usize::try_from(desc.byte_width).map_err(|_| Status::OutOfMemory)?;
        let bytes = match initial_data {
            Some(data) => data.get(..len).ok_or(Status::InvalidArg)?.to_vec(),
            None => zeroed(len)?,
        };
        let id = self.insert(Object::Buffer {
            bytes,
            usage: desc.usage,
        });
        Ok(SoftwareBuffer(id))
    }

    fn create_buffer_read_view(
        &mut self,
        _device: &Self::Device,
        buffer: &Self::Buffer,
        _desc: &BufferDesc,
    ) -> Result<Self::ReadView, Status> {
        self.take_failure(Operation::CreateReadView)?;
        let id = self.insert(Object::View {
            kind: ObjectKind::ReadView,
        });
        Ok(SoftwareView {
            id,
            target: buffer.0,
        })
    }

    fn create_buffer_write_view(
        &mut self,
        _device: &Self::Device,
        buffer: &Self::Buffer,
        _desc: &BufferDesc,
    ) -> Result<Self::WriteView, Status> {
        self.take_failure(Operation::CreateWriteView)?;
        let id = self.insert(Object::View {
            kind: ObjectKind::WriteView,
        });
        Ok(SoftwareView {
            id,
            target: buffer.0,
        })
    }

    fn create_texture(
        &mut self,
        _device: &Self::Device,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self::Texture, Status> {
        self.take_failure(Operation::CreateTexture)?;
        let row_bytes = usize::try_from(desc.row_bytes()).map_err(|_| Status::OutOfMemory)?;
        let rows = desc.height as usize;
        let row_pitch = self
            .aligned_row_pitch(row_bytes)
            .ok_or(Status::OutOfMemory)?;
        let mut bytes = zeroed(row_pitch.checked_mul(rows).ok_or(Status::OutOfMemory)?)?;
        if let Some(data) = initial_data {
            let data = data.get(..row_bytes * rows).ok_or(Status::InvalidArg)?;
            for (row, chunk) in data.chunks_exact(row_bytes.max(1)).enumerate() {
                let offset = row * row_pitch;
                bytes[offset..offset + chunk.len()].copy_from_slice(chunk);
            }
        }
        let id = self.insert(Object::Texture { bytes, row_pitch });
        Ok(SoftwareTexture(id))
    }

    fn create_texture_read_view(
        &mut self,
        _device: &Self::Device,
        texture: &Self::Texture,
        _desc: &TextureDesc,
    ) -> Result<Self::ReadView, Status> {
        self.take_failure(Operation::CreateTextureView)?;
        let id = self.insert(Object::View {
            kind: ObjectKind::ReadView,
        });
        Ok(SoftwareView {
            id,
            target: texture.0,
        })
    }

    fn release_buffer(&mut self, buffer: Self::Buffer) {
        self.release(buffer.0);
    }

    fn release_texture(&mut self, texture: Self::Texture) {
        self.release(texture.0);
    }

    fn release_read_view(&mut self, view: Self::ReadView) {
        self.release(view.id);
    }

    fn release_write_view(&mut self, view: Self::WriteView) {
        self.release(view.id);
    }

    fn map(
        &mut self,
        _context: &Self::Context,
        resource: Resource<'_, Self>,
        mode: MapMode,
    ) -> Result<MappedRegion, Status> {
        self.take_failure(Operation::Map)?;
        if self.mapped.is_some() {
            return Err(Status::InvalidCall);
        }
        let id = match resource {
            Resource::Buffer(buffer) => buffer.0,
            Resource::Texture(texture) => texture.0,
        };
        let region = match self.objects.get(&id) {
            Some(Object::Buffer { bytes, usage }) => {
                if mode == MapMode::Read && !usage.cpu_readable() {
                    return Err(Status::InvalidArg);
                }
                MappedRegion {
                    row_pitch: bytes.len(),
                    len: bytes.len(),
                }
            }
            Some(Object::Texture { bytes, row_pitch }) => {
                if mode == MapMode::Read {
                    return Err(Status::InvalidArg);
                }
                MappedRegion {
                    row_pitch: *row_pitch,
                    len: bytes.len(),
                }
            }
            _ => return Err(Status::InvalidArg),
        };
        self.mapped = Some(id);
        Ok(region)
    }

    fn mapped_bytes(&mut self, resource: Resource<'_, Self>) -> &mut [u8] {
        let id = match resource {
            Resource::Buffer(buffer) => buffer.0,
            Resource::Texture(texture) => texture.0,
        };
        if self.mapped != Some(id) {
            return &mut [];
        }
        match self.objects.get_mut(&id).and_then(Object::bytes_mut) {
            Some(bytes) => bytes.as_mut_slice(),
            None => &mut [],
        }
    }

    fn unmap(
        &mut self,
        _context: &Self::Context,
        resource: Resource<'_, Self>,
    ) -> Result<(), Status> {
        let id = match resource {
            Resource::Buffer(buffer) => buffer.0,
            Resource::Texture(texture) => texture.0,
        };
        if self.mapped == Some(id) {
            self.mapped = None;
        }
        self.take_failure(Operation::Unmap)
    }

    fn copy_buffer(
        &mut self,
        _context: &Self::Context,
        destination: &Self::Buffer,
        source: &Self::Buffer,
    ) -> Result<(), Status> {
        self.take_failure(Operation::Copy)?;
        let source = self.snapshot(source.0).ok_or(Status::InvalidArg)?;
        let destination = self
            .objects
            .get_mut(&destination.0)
            .and_then(Object::bytes_mut)
            .ok_or(Status::InvalidArg)?;
        let len = source.len().min(destination.len());
        destination[..len].copy_from_slice(&source[..len]);
        Ok(())
    }

    fn set_read_views(
        &mut self,
        _context: &Self::Context,
        start_slot: u32,
        views: &[Option<Self::ReadView>],
    ) {
        place(&mut self.bound_read, start_slot, views);
    }

    fn set_constant_buffers(
        &mut self,
        _context: &Self::Context,
        start_slot: u32,
        buffers: &[Option<Self::Buffer>],
    ) {
        place(&mut self.bound_constant, start_slot, buffers);
    }

    fn set_write_views(
        &mut self,
        _context: &Self::Context,
        start_slot: u32,
        views: &[Option<Self::WriteView>],
    ) {
        place(&mut self.bound_write, start_slot, views);
    }

    fn dispatch(
        &mut self,
        _context: &Self::Context,
        program: &Self::Program,
        groups: [u32; 3],
    ) -> Result<(), Status> {
        self.take_failure(Operation::Dispatch)?;
        let entry_point = match self.objects.get(&program.0) {
            Some(Object::Program { entry_point }) => entry_point.clone(),
            _ => return Err(Status::InvalidCall),
        };

        let read: Vec<Option<Vec<u8>>> = self
            .bound_read
            .iter()
            .map(|view| view.as_ref().and_then(|v| self.snapshot(v.target)))
            .collect();
        let constant: Vec<Option<Vec<u8>>> = self
            .bound_constant
            .iter()
            .map(|buffer| buffer.as_ref().and_then(|b| self.snapshot(b.0)))
            .collect();
        let targets: Vec<Option<ObjectId>> = self
            .bound_write
            .iter()
            .map(|view| view.as_ref().map(|v| v.target))
            .collect();
        let mut read_write: Vec<Option<Vec<u8>>> = targets
            .iter()
            .map(|target| {
                let target = (*target)?;
                self.objects
                    .get_mut(&target)
                    .and_then(Object::bytes_mut)
                    .map(std::mem::take)
            })
            .collect();

        let kernel = self
            .kernels
            .get_mut(&entry_point)
            .ok_or(Status::InvalidCall)?;
        let mut invocation = Invocation {
            groups,
            read: &read,
            constant: &constant,
            read_write: &mut read_write,
        };
        kernel(&mut invocation);

        for (target, bytes) in targets.into_iter().zip(read_write) {
            if let (Some(target), Some(bytes)) = (target, bytes)
                && let Some(slot) = self.objects.get_mut(&target).and_then(Object::bytes_mut)
            {
                *slot = bytes;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(backend: &mut SoftwareBackend) -> (SoftwareDevice, SoftwareContext) {
        backend.create_device(&DeviceConfig::default()).unwrap()
    }

    #[test]
    fn null_driver_fails() {
        let mut backend = SoftwareBackend::default();
        let config = DeviceConfig::new(DriverType::Null, Default::default());
        assert_eq!(backend.create_device(&config).unwrap_err(), Status::Fail);
    }

    #[test]
    fn failures_are_one_shot() {
        let mut backend = SoftwareBackend::default();
        let (device, _) = device(&mut backend);
        backend.fail_next(Operation::CreateTexture, Status::OutOfMemory);
        let desc = TextureDesc {
            width: 1,
            height: 1,
            format: crate::pixel_formats::PixelFormat::R8Unorm,
        };
        assert_eq!(
            backend.create_texture(&device, &desc, None).unwrap_err(),
            Status::OutOfMemory
        );
        assert!(backend.create_texture(&device, &desc, None).is_ok());
    }

    #[test]
    fn padded_initial_texture_data() {
        let mut backend = SoftwareBackend::new(SoftwareConfig {
            row_pitch_alignment: 4,
        });
        let (device, _) = device(&mut backend);
        let desc = TextureDesc {
            width: 3,
            height: 2,
            format: crate::pixel_formats::PixelFormat::R8Unorm,
        };
        let texture = backend
            .create_texture(&device, &desc, Some(&[1, 2, 3, 4, 5, 6]))
            .unwrap();
        assert_eq!(
            backend.texture_bytes(&texture).unwrap(),
            &[1, 2, 3, 0, 4, 5, 6, 0]
        );
    }

    #[test]
    fn oversized_resources_are_out_of_memory() {
        let mut backend = SoftwareBackend::new(SoftwareConfig {
            row_pitch_alignment: 256,
        });
        let (device, _) = device(&mut backend);
        let desc = BufferDesc {
            usage: BufferUsage::ReadWrite,
            element_size: u32::MAX,
            element_count: u32::MAX,
            byte_width: u32::MAX as u64 * u32::MAX as u64,
        };
        assert_eq!(
            backend.create_buffer(&device, &desc, None).unwrap_err(),
            Status::OutOfMemory
        );
        let desc = TextureDesc {
            width: u32::MAX,
            height: u32::MAX,
            format: crate::pixel_formats::PixelFormat::R32G32B32A32Float,
        };
        assert_eq!(
            backend.create_texture(&device, &desc, None).unwrap_err(),
            Status::OutOfMemory
        );
        assert_eq!(backend.live_objects(), 2);
    }

    #[test]
    fn double_release_is_counted() {
        let mut backend = SoftwareBackend::default();
        let (device, _) = device(&mut backend);
        let desc = BufferDesc {
            usage: BufferUsage::Input,
            element_size: 4,
            element_count: 1,
            byte_width: 4,
        };
        let buffer = backend.create_buffer(&device, &desc, None).unwrap();
        backend.release_buffer(buffer.clone());
        backend.release_buffer(buffer);
        assert_eq!(backend.counts(ObjectKind::Buffer).released, 1);
        assert_eq!(backend.double_releases(), 1);
    }

    #[test]
    fn device_local_buffers_refuse_read_maps() {
        let mut backend = SoftwareBackend::default();
        let (device, context) = device(&mut backend);
        let desc = BufferDesc {
            usage: BufferUsage::ReadWrite,
            element_size: 4,
            element_count: 1,
            byte_width: 4,
        };
        let buffer = backend.create_buffer(&device, &desc, None).unwrap();
        assert_eq!(
            backend
                .map(&context, Resource::Buffer(&buffer), MapMode::Read)
                .unwrap_err(),
            Status::InvalidArg
        );
        assert!(!backend.is_mapped());
    }
}
