// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Resource creation.

Each buffer is created in one of five usage classes, and the class alone decides which views it
gets and how the CPU may reach it:

| Usage                  | Views                | CPU access   |
|------------------------|----------------------|--------------|
| [BufferUsage::ReadWrite] | read + read-write  | none         |
| [BufferUsage::ReadOnly]  | read               | none         |
| [BufferUsage::Input]     | none               | write        |
| [BufferUsage::Staging]   | none               | read + write |
| [BufferUsage::Constant]  | none               | write        |

Input textures get a read view and accept CPU writes.

All creation functions share the slot protocol: a live resource already in the output slot is
released, the slot is nulled, and it is only written once the resource and all of its views
exist.  If any step fails, everything created so far in that call is released again.
*/

use crate::Error;
use crate::handles::{BufferEntry, BufferHandle, DeviceHandle, TextureEntry, TextureHandle};
use crate::imp::Backend;
use crate::pixel_formats::PixelFormat;
use crate::session::Session;
use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Structured buffer the shader reads and writes.
    ReadWrite,
    /// Structured buffer the shader only reads.
    ReadOnly,
    /// CPU-written buffer, renamed on every map.
    Input,
    /// CPU-visible buffer for moving data off the device.
    Staging,
    /// Small CPU-written parameter block.
    Constant,
}

impl BufferUsage {
    pub const fn has_read_view(self) -> bool {
        matches!(self, BufferUsage::ReadWrite | BufferUsage::ReadOnly)
    }

    pub const fn has_write_view(self) -> bool {
        matches!(self, BufferUsage::ReadWrite)
    }

    pub const fn cpu_readable(self) -> bool {
        matches!(self, BufferUsage::Staging)
    }

    pub const fn cpu_writable(self) -> bool {
        matches!(
            self,
            BufferUsage::Input | BufferUsage::Staging | BufferUsage::Constant
        )
    }
}

/// Shape of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub usage: BufferUsage,
    pub element_size: u32,
    pub element_count: u32,
    pub byte_width: u64,
}

impl BufferDesc {
    fn structured(usage: BufferUsage, element_size: u32, element_count: u32) -> Result<Self, Error> {
        if element_size == 0 || element_count == 0 {
            return Err(Error::InvalidArgument("buffer must have at least one non-empty element"));
        }
        Ok(BufferDesc {
            usage,
            element_size,
            element_count,
            byte_width: element_size as u64 * element_count as u64,
        })
    }
}

/// Shape of an input texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl TextureDesc {
    /// Bytes in one tightly packed row.
    pub const fn row_bytes(&self) -> u64 {
        self.width as u64 * self.format.bytes_per_pixel() as u64
    }

    pub const fn tight_len(&self) -> u64 {
        self.row_bytes() * self.height as u64
    }
}

impl<B: Backend> Session<B> {
    /// Creates a structured buffer with read and read-write views.
    pub fn create_read_write_buffer(
        &mut self,
        device: DeviceHandle,
        element_size: u32,
        element_count: u32,
        initial_data: Option<&[u8]>,
        buffer: &mut BufferHandle,
    ) -> Result<(), Error> {
        self.release_buffer(buffer);
        self.create_buffer(
            device,
            BufferUsage::ReadWrite,
            element_size,
            element_count,
            initial_data,
            buffer,
        )
    }

    /// Creates a structured buffer with a read view.
    pub fn create_read_buffer(
        &mut self,
        device: DeviceHandle,
        element_size: u32,
        element_count: u32,
        initial_data: Option<&[u8]>,
        buffer: &mut BufferHandle,
    ) -> Result<(), Error> {
        self.release_buffer(buffer);
        self.create_buffer(
            device,
            BufferUsage::ReadOnly,
            element_size,
            element_count,
            initial_data,
            buffer,
        )
    }

    /// Creates a CPU-writable buffer with no views.
    pub fn create_input_buffer(
        &mut self,
        device: DeviceHandle,
        element_size: u32,
        element_count: u32,
        buffer: &mut BufferHandle,
    ) -> Result<(), Error> {
        self.release_buffer(buffer);
        self.create_buffer(
            device,
            BufferUsage::Input,
            element_size,
            element_count,
            None,
            buffer,
        )
    }

    /// Creates a staging buffer for readback.
    pub fn create_staging_buffer(
        &mut self,
        device: DeviceHandle,
        element_size: u32,
        element_count: u32,
        buffer: &mut BufferHandle,
    ) -> Result<(), Error> {
        self.release_buffer(buffer);
        self.create_buffer(
            device,
            BufferUsage::Staging,
            element_size,
            element_count,
            None,
            buffer,
        )
    }

    /// Creates a constant buffer of `byte_length` bytes.
    pub fn create_constant_buffer(
        &mut self,
        device: DeviceHandle,
        byte_length: u32,
        buffer: &mut BufferHandle,
    ) -> Result<(), Error> {
        self.release_buffer(buffer);
        self.create_buffer(
            device,
            BufferUsage::Constant,
            byte_length,
            1,
            None,
            buffer,
        )
    }

    fn create_buffer(
        &mut self,
        device: DeviceHandle,
        usage: BufferUsage,
        element_size: u32,
        element_count: u32,
        initial_data: Option<&[u8]>,
        buffer: &mut BufferHandle,
    ) -> Result<(), Error> {
        let owner = device;
        let device = self.registry.device(device)?;
        let desc = BufferDesc::structured(usage, element_size, element_count)?;
        if let Some(data) = initial_data
            && (data.len() as u64) < desc.byte_width
        {
            return Err(Error::InvalidArgument("initial data is shorter than the buffer"));
        }

        let native = self
            .backend
            .create_buffer(&device.native, &desc, initial_data)
            .map_err(|status| creation_failed("buffer", status))?;
        let read_view = if desc.usage.has_read_view() {
            match self
                .backend
                .create_buffer_read_view(&device.native, &native, &desc)
            {
                Ok(view) => Some(view),
                Err(status) => {
                    self.backend.release_buffer(native);
                    return Err(creation_failed("buffer read view", status));
                }
            }
        } else {
            None
        };
        let write_view = if desc.usage.has_write_view() {
            match self
                .backend
                .create_buffer_write_view(&device.native, &native, &desc)
            {
                Ok(view) => Some(view),
                Err(status) => {
                    if let Some(view) = read_view {
                        self.backend.release_read_view(view);
                    }
                    self.backend.release_buffer(native);
                    return Err(creation_failed("buffer read-write view", status));
                }
            }
        } else {
            None
        };

        logwise::trace_sync!(
            "created {usage} buffer of {bytes} bytes",
            usage = logwise::privacy::LogIt(&desc.usage),
            bytes = desc.byte_width
        );
        *buffer = self.registry.buffers.insert(BufferEntry {
            device: owner,
            native,
            read_view,
            write_view,
            desc,
        });
        Ok(())
    }

    /// Creates a 2D texture with a read view.
    ///
    /// `initial_data`, when present, holds `height` tightly packed rows.
    pub fn create_input_texture(
        &mut self,
        device: DeviceHandle,
        width: u32,
        height: u32,
        format: PixelFormat,
        initial_data: Option<&[u8]>,
        texture: &mut TextureHandle,
    ) -> Result<(), Error> {
        self.release_texture(texture);
        let owner = device;
        let device = self.registry.device(device)?;
        if width == 0 || height == 0 {
            return Err(Error::InvalidArgument("texture must not be empty"));
        }
        let desc = TextureDesc {
            width,
            height,
            format,
        };
        if let Some(data) = initial_data
            && (data.len() as u64) < desc.tight_len()
        {
            return Err(Error::InvalidArgument("initial data is shorter than the texture"));
        }

        let native = self
            .backend
            .create_texture(&device.native, &desc, initial_data)
            .map_err(|status| creation_failed("texture", status))?;
        let read_view = match self
            .backend
            .create_texture_read_view(&device.native, &native, &desc)
        {
            Ok(view) => view,
            Err(status) => {
                self.backend.release_texture(native);
                return Err(creation_failed("texture read view", status));
            }
        };
        *texture = self.registry.textures.insert(TextureEntry {
            device: owner,
            native,
            read_view,
            desc,
        });
        Ok(())
    }
}

fn creation_failed(what: &'static str, status: Status) -> Error {
    logwise::warn_sync!(
        "creating {what} failed with {status}",
        what = logwise::privacy::LogIt(&what),
        status = logwise::privacy::LogIt(&status)
    );
    Error::Backend(status)
}
