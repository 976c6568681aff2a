// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The seam between the session and a GPU.
//!
//! A [Backend] creates and releases native objects and executes the handful of
//! commands the compute model needs.  It never sees handles; the session
//! validates those before any call reaches here.

use crate::factory::{BufferDesc, TextureDesc};
use crate::session::DeviceConfig;
use crate::shader::{CompileFailure, CompileRequest};
use crate::status::Status;

pub mod software;

#[cfg(feature = "backend_wgpu")]
mod wgpu;

#[cfg(feature = "backend_wgpu")]
pub use wgpu::WgpuBackend;

/// The backend [crate::Session] uses when none is named.
#[cfg(feature = "backend_wgpu")]
pub type DefaultBackend = WgpuBackend;
/// The backend [crate::Session] uses when none is named.
#[cfg(not(feature = "backend_wgpu"))]
pub type DefaultBackend = software::SoftwareBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// Discard the previous contents and write new ones.
    WriteDiscard,
    Read,
}

/// Layout of an active mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRegion {
    /// Distance in bytes between the starts of consecutive rows.  Equals the
    /// length for buffers.
    pub row_pitch: usize,
    pub len: usize,
}

/// A mappable resource.
pub enum Resource<'a, B: Backend + ?Sized> {
    Buffer(&'a B::Buffer),
    Texture(&'a B::Texture),
}

impl<B: Backend + ?Sized> Clone for Resource<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<B: Backend + ?Sized> Copy for Resource<'_, B> {}

/// A GPU, as seen by [crate::Session].
///
/// At most one mapping is active at a time; the session always pairs
/// [Backend::map] with [Backend::unmap] before doing anything else.
pub trait Backend {
    type Device;
    type Context;
    type Program;
    type Buffer: Clone;
    type Texture;
    type ReadView: Clone;
    type WriteView: Clone;

    fn create_device(
        &mut self,
        config: &DeviceConfig,
    ) -> Result<(Self::Device, Self::Context), Status>;
    fn release_device(&mut self, device: Self::Device);
    fn release_context(&mut self, context: Self::Context);

    fn compile(
        &mut self,
        device: &Self::Device,
        request: &CompileRequest<'_>,
    ) -> Result<Self::Program, CompileFailure>;
    fn release_program(&mut self, program: Self::Program);

    /// `initial_data`, when present, is at least `desc.byte_width` long.
    fn create_buffer(
        &mut self,
        device: &Self::Device,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self::Buffer, Status>;
    fn create_buffer_read_view(
        &mut self,
        device: &Self::Device,
        buffer: &Self::Buffer,
        desc: &BufferDesc,
    ) -> Result<Self::ReadView, Status>;
    fn create_buffer_write_view(
        &mut self,
        device: &Self::Device,
        buffer: &Self::Buffer,
        desc: &BufferDesc,
    ) -> Result<Self::WriteView, Status>;
    /// `initial_data`, when present, holds tightly packed rows.
    fn create_texture(
        &mut self,
        device: &Self::Device,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self::Texture, Status>;
    fn create_texture_read_view(
        &mut self,
        device: &Self::Device,
        texture: &Self::Texture,
        desc: &TextureDesc,
    ) -> Result<Self::ReadView, Status>;

    fn release_buffer(&mut self, buffer: Self::Buffer);
    fn release_texture(&mut self, texture: Self::Texture);
    fn release_read_view(&mut self, view: Self::ReadView);
    fn release_write_view(&mut self, view: Self::WriteView);

    fn map(
        &mut self,
        context: &Self::Context,
        resource: Resource<'_, Self>,
        mode: MapMode,
    ) -> Result<MappedRegion, Status>;
    /// The bytes of the active mapping of `resource`.  Empty when it isn't mapped.
    fn mapped_bytes(&mut self, resource: Resource<'_, Self>) -> &mut [u8];
    /// Ends the mapping of `resource`.
    ///
    /// The mapping is gone afterwards even when this fails.  A backend that uploads discarded
    /// writes here reports a failed upload as its status.
    fn unmap(
        &mut self,
        context: &Self::Context,
        resource: Resource<'_, Self>,
    ) -> Result<(), Status>;

    /// Copies the whole of `source` into `destination`.
    fn copy_buffer(
        &mut self,
        context: &Self::Context,
        destination: &Self::Buffer,
        source: &Self::Buffer,
    ) -> Result<(), Status>;

    fn set_read_views(
        &mut self,
        context: &Self::Context,
        start_slot: u32,
        views: &[Option<Self::ReadView>],
    );
    fn set_constant_buffers(
        &mut self,
        context: &Self::Context,
        start_slot: u32,
        buffers: &[Option<Self::Buffer>],
    );
    fn set_write_views(
        &mut self,
        context: &Self::Context,
        start_slot: u32,
        views: &[Option<Self::WriteView>],
    );
    /// Runs `program` over the currently bound views.
    fn dispatch(
        &mut self,
        context: &Self::Context,
        program: &Self::Program,
        groups: [u32; 3],
    ) -> Result<(), Status>;
}
