// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Moving bytes between the CPU and the device.

Uploads map the destination for a discarding write, copy, and unmap.  Readback goes through a
staging buffer: the source is copied into it on the device, then the staging buffer is mapped
for reading.

Every mapping lives in a [Mapped] guard.  The success path ends it with [Mapped::finish], which
reports a failed unmap (on wgpu, the upload itself); early exits unmap on drop.
*/

use crate::Error;
use crate::handles::{BufferHandle, ContextHandle, TextureHandle};
use crate::imp::{Backend, MapMode, MappedRegion, Resource};
use crate::pixel_formats::{ReprC, elements_as_bytes, elements_as_bytes_mut};
use crate::session::Session;
use crate::status::Status;

/// An active mapping.  Unmaps on drop unless [Mapped::finish] already did.
pub(crate) struct Mapped<'a, B: Backend> {
    backend: &'a mut B,
    context: &'a B::Context,
    resource: Resource<'a, B>,
    region: MappedRegion,
    finished: bool,
}

impl<'a, B: Backend> Mapped<'a, B> {
    pub(crate) fn map(
        backend: &'a mut B,
        context: &'a B::Context,
        resource: Resource<'a, B>,
        mode: MapMode,
    ) -> Result<Self, Error> {
        let region = backend.map(context, resource, mode).map_err(|status| {
            logwise::error_sync!(
                "map failed with {status}",
                status = logwise::privacy::LogIt(&status)
            );
            Error::Backend(status)
        })?;
        Ok(Mapped {
            backend,
            context,
            resource,
            region,
            finished: false,
        })
    }

    /// Unmaps, propagating the backend's status.
    pub(crate) fn finish(mut self) -> Result<(), Error> {
        self.finished = true;
        self.backend
            .unmap(self.context, self.resource)
            .map_err(|status| {
                logwise::error_sync!(
                    "unmap failed with {status}",
                    status = logwise::privacy::LogIt(&status)
                );
                Error::Backend(status)
            })
    }

    pub(crate) fn row_pitch(&self) -> usize {
        self.region.row_pitch
    }

    /// The mapped bytes, at least `len` of them.
    pub(crate) fn bytes(&mut self, len: usize) -> Result<&mut [u8], Error> {
        let region_len = self.region.len;
        let bytes = self.backend.mapped_bytes(self.resource);
        let available = region_len.min(bytes.len());
        if available < len {
            return Err(Error::Backend(Status::InvalidCall));
        }
        Ok(&mut bytes[..available])
    }
}

impl<B: Backend> Drop for Mapped<'_, B> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        //already failing; the original error wins
        if let Err(status) = self.backend.unmap(self.context, self.resource) {
            logwise::warn_sync!(
                "unmap after an earlier failure also failed with {status}",
                status = logwise::privacy::LogIt(&status)
            );
        }
    }
}

/// Copies `rows` rows of `row_bytes` from tightly packed `source` into `destination`, whose rows
/// start every `row_pitch` bytes.
///
/// Returns the number of copies made: one when the layouts agree, one per row otherwise.
pub(crate) fn copy_rows(
    destination: &mut [u8],
    row_pitch: usize,
    source: &[u8],
    row_bytes: usize,
    rows: usize,
) -> Result<usize, Error> {
    let total = row_bytes * rows;
    if source.len() < total {
        return Err(Error::InvalidArgument("source is shorter than the texture region"));
    }
    if rows == 1 || row_pitch == row_bytes {
        if destination.len() < total {
            return Err(Error::Backend(Status::InvalidCall));
        }
        destination[..total].copy_from_slice(&source[..total]);
        return Ok(1);
    }
    if rows == 0 {
        return Ok(0);
    }
    if row_pitch < row_bytes || destination.len() < row_pitch * (rows - 1) + row_bytes {
        return Err(Error::Backend(Status::InvalidCall));
    }
    for (row, chunk) in source.chunks_exact(row_bytes).take(rows).enumerate() {
        let offset = row * row_pitch;
        destination[offset..offset + row_bytes].copy_from_slice(chunk);
    }
    Ok(rows)
}

impl<B: Backend> Session<B> {
    /// Uploads `source` to the start of `destination`.
    pub fn write(
        &mut self,
        context: ContextHandle,
        destination: BufferHandle,
        source: &[u8],
    ) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        let destination = self.registry.buffer(destination)?;
        if source.is_empty() {
            return Err(Error::InvalidArgument("nothing to write"));
        }
        if source.len() as u64 > destination.desc.byte_width {
            return Err(Error::InvalidArgument("source is longer than the buffer"));
        }
        let mut mapped = Mapped::map(
            &mut self.backend,
            &context.native,
            Resource::Buffer(&destination.native),
            MapMode::WriteDiscard,
        )?;
        mapped.bytes(source.len())?[..source.len()].copy_from_slice(source);
        mapped.finish()?;
        logwise::trace_sync!("wrote {bytes} bytes", bytes = source.len());
        Ok(())
    }

    /// Uploads `height` tightly packed rows of `width` elements to `texture`.
    ///
    /// Rows are copied one at a time when the device's row pitch differs from
    /// `width * element_size`.
    pub fn write_texture(
        &mut self,
        context: ContextHandle,
        texture: TextureHandle,
        source: &[u8],
        width: u32,
        height: u32,
        element_size: u32,
    ) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        let texture = self.registry.texture(texture)?;
        if width > texture.desc.width || height > texture.desc.height {
            return Err(Error::InvalidArgument("region is larger than the texture"));
        }
        let row_bytes = width as usize * element_size as usize;
        if row_bytes as u64 > texture.desc.row_bytes() {
            return Err(Error::InvalidArgument("rows are wider than the texture"));
        }
        let rows = height as usize;
        if source.len() < row_bytes * rows {
            return Err(Error::InvalidArgument("source is shorter than the texture region"));
        }

        let mut mapped = Mapped::map(
            &mut self.backend,
            &context.native,
            Resource::Texture(&texture.native),
            MapMode::WriteDiscard,
        )?;
        let row_pitch = mapped.row_pitch();
        let needed = if rows == 0 {
            0
        } else {
            row_pitch.max(row_bytes) * (rows - 1) + row_bytes
        };
        let copies = copy_rows(mapped.bytes(needed)?, row_pitch, source, row_bytes, rows)?;
        mapped.finish()?;
        logwise::trace_sync!(
            "texture upload of {rows} rows with pitch {pitch} took {copies} copies",
            rows = rows,
            pitch = row_pitch,
            copies = copies
        );
        Ok(())
    }

    /// Copies all of `source` into `destination` on the device.
    pub fn copy(
        &mut self,
        context: ContextHandle,
        destination: BufferHandle,
        source: BufferHandle,
    ) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        let destination = self.registry.buffer(destination)?;
        let source = self.registry.buffer(source)?;
        if destination.desc.byte_width != source.desc.byte_width {
            return Err(Error::InvalidArgument("buffers differ in size"));
        }
        self.backend
            .copy_buffer(&context.native, &destination.native, &source.native)
            .map_err(Error::Backend)
    }

    /// Reads the first `destination.len()` bytes of `source` through `staging`.
    pub fn read(
        &mut self,
        context: ContextHandle,
        staging: BufferHandle,
        source: BufferHandle,
        destination: &mut [u8],
    ) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        let staging = self.registry.buffer(staging)?;
        let source = self.registry.buffer(source)?;
        if destination.is_empty() {
            return Err(Error::InvalidArgument("nothing to read"));
        }
        if !staging.desc.usage.cpu_readable() {
            return Err(Error::InvalidArgument("readback requires a staging buffer"));
        }
        let len = destination.len() as u64;
        if len > staging.desc.byte_width || len > source.desc.byte_width {
            return Err(Error::InvalidArgument("read is longer than the buffers"));
        }

        self.backend
            .copy_buffer(&context.native, &staging.native, &source.native)
            .map_err(Error::Backend)?;
        let interval = logwise::perfwarn_begin!("kernels_and_views read map");
        let mut mapped = Mapped::map(
            &mut self.backend,
            &context.native,
            Resource::Buffer(&staging.native),
            MapMode::Read,
        )?;
        drop(interval);
        destination.copy_from_slice(&mapped.bytes(destination.len())?[..destination.len()]);
        mapped.finish()
    }

    /// [Session::write] for typed elements.
    pub fn write_elements<T: ReprC>(
        &mut self,
        context: ContextHandle,
        destination: BufferHandle,
        source: &[T],
    ) -> Result<(), Error> {
        self.write(context, destination, elements_as_bytes(source))
    }

    /// [Session::read] for typed elements.
    pub fn read_elements<T: ReprC>(
        &mut self,
        context: ContextHandle,
        staging: BufferHandle,
        source: BufferHandle,
        destination: &mut [T],
    ) -> Result<(), Error> {
        self.read(context, staging, source, elements_as_bytes_mut(destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::{DeviceHandle, Handle};
    use crate::imp::software::{Operation, SoftwareBackend, SoftwareConfig};
    use crate::pixel_formats::PixelFormat;
    use crate::session::DeviceConfig;

    fn session(
        config: SoftwareConfig,
    ) -> (Session<SoftwareBackend>, DeviceHandle, ContextHandle) {
        let mut session = Session::new(SoftwareBackend::new(config));
        let mut device = DeviceHandle::invalid();
        let mut context = ContextHandle::invalid();
        session
            .create_device(&DeviceConfig::default(), &mut device, &mut context)
            .unwrap();
        (session, device, context)
    }

    #[test]
    fn contiguous_rows_copy_once() {
        let source: Vec<u8> = (0..12).collect();
        let mut destination = vec![0u8; 12];
        assert_eq!(copy_rows(&mut destination, 6, &source, 6, 2).unwrap(), 1);
        assert_eq!(destination, source);
    }

    #[test]
    fn single_row_copies_once_regardless_of_pitch() {
        let source = [1u8, 2, 3];
        let mut destination = vec![0u8; 256];
        assert_eq!(copy_rows(&mut destination, 256, &source, 3, 1).unwrap(), 1);
        assert_eq!(&destination[..3], &source);
    }

    #[test]
    fn padded_rows_copy_per_row() {
        let source: Vec<u8> = (1..=6).collect();
        let mut destination = vec![0u8; 16];
        assert_eq!(copy_rows(&mut destination, 8, &source, 3, 2).unwrap(), 2);
        assert_eq!(destination, [1, 2, 3, 0, 0, 0, 0, 0, 4, 5, 6, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn short_destination_is_an_error_not_a_panic() {
        let source = [0u8; 8];
        let mut destination = vec![0u8; 9];
        assert!(copy_rows(&mut destination, 8, &source, 4, 2).is_err());
    }

    #[test]
    fn texture_upload_honors_row_pitch() {
        let (mut session, device, context) = session(SoftwareConfig {
            row_pitch_alignment: 16,
        });
        let mut texture = TextureHandle::invalid();
        session
            .create_input_texture(device, 3, 2, PixelFormat::R8Unorm, None, &mut texture)
            .unwrap();
        session
            .write_texture(context, texture, &[1, 2, 3, 4, 5, 6], 3, 2, 1)
            .unwrap();
        let native = &session.registry.textures[texture].native;
        let bytes = session.backend().texture_bytes(native).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..3], &[1, 2, 3]);
        assert_eq!(&bytes[16..19], &[4, 5, 6]);
        assert!(!session.backend().is_mapped());
    }

    #[test]
    fn upload_then_read_back() {
        let (mut session, device, context) = session(SoftwareConfig::default());
        let mut buffer = BufferHandle::invalid();
        let mut staging = BufferHandle::invalid();
        session
            .create_read_write_buffer(device, 4, 4, None, &mut buffer)
            .unwrap();
        session.create_staging_buffer(device, 4, 4, &mut staging).unwrap();
        session
            .write_elements(context, buffer, &[1.5f32, -2.0, 3.25, 0.0])
            .unwrap();
        let mut out = [0f32; 4];
        session.read_elements(context, staging, buffer, &mut out).unwrap();
        assert_eq!(out, [1.5, -2.0, 3.25, 0.0]);
        assert!(!session.backend().is_mapped());
    }

    #[test]
    fn read_requires_staging() {
        let (mut session, device, context) = session(SoftwareConfig::default());
        let mut a = BufferHandle::invalid();
        let mut b = BufferHandle::invalid();
        session.create_read_write_buffer(device, 4, 1, None, &mut a).unwrap();
        session.create_read_write_buffer(device, 4, 1, None, &mut b).unwrap();
        let mut out = [0u8; 4];
        let err = session.read(context, a, b, &mut out).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArg);
    }

    #[test]
    fn failed_map_leaves_nothing_mapped() {
        let (mut session, device, context) = session(SoftwareConfig::default());
        let mut buffer = BufferHandle::invalid();
        session.create_input_buffer(device, 4, 1, &mut buffer).unwrap();
        session
            .backend_mut()
            .fail_next(Operation::Map, Status::WasStillDrawing);
        let err = session.write(context, buffer, &[1, 2, 3, 4]).unwrap_err();
        assert_eq!(err.status(), Status::WasStillDrawing);
        assert!(!session.backend().is_mapped());
        session.write(context, buffer, &[1, 2, 3, 4]).unwrap();
    }

    #[test]
    fn failed_unmap_fails_the_upload() {
        let (mut session, device, context) = session(SoftwareConfig::default());
        let mut buffer = BufferHandle::invalid();
        session.create_input_buffer(device, 4, 1, &mut buffer).unwrap();
        session
            .backend_mut()
            .fail_next(Operation::Unmap, Status::InvalidCall);
        let err = session.write(context, buffer, &[1, 2, 3, 4]).unwrap_err();
        assert_eq!(err.status(), Status::InvalidCall);
        assert!(!session.backend().is_mapped());

        let mut texture = TextureHandle::invalid();
        session
            .create_input_texture(device, 2, 1, PixelFormat::R8Unorm, None, &mut texture)
            .unwrap();
        session
            .backend_mut()
            .fail_next(Operation::Unmap, Status::OutOfMemory);
        let err = session
            .write_texture(context, texture, &[1, 2], 2, 1, 1)
            .unwrap_err();
        assert_eq!(err.status(), Status::OutOfMemory);
        assert!(!session.backend().is_mapped());

        //one-shot, so the next upload succeeds
        session.write(context, buffer, &[1, 2, 3, 4]).unwrap();
    }

    #[test]
    fn copy_requires_matching_sizes() {
        let (mut session, device, context) = session(SoftwareConfig::default());
        let mut small = BufferHandle::invalid();
        let mut large = BufferHandle::invalid();
        session.create_read_write_buffer(device, 4, 1, None, &mut small).unwrap();
        session.create_read_write_buffer(device, 4, 2, None, &mut large).unwrap();
        let err = session.copy(context, small, large).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArg);
        let err = session.copy(context, BufferHandle::invalid(), large).unwrap_err();
        assert_eq!(err.status(), Status::Fail);
    }
}
