// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wgpu::util::DeviceExt;

use super::Error;
use super::error::scoped;
use crate::factory::{BufferDesc, BufferUsage};

/// A buffer on a wgpu device.
#[derive(Debug, Clone)]
pub struct WgpuBuffer {
    pub(super) id: u64,
    pub(super) raw: wgpu::Buffer,
    /// Requested size.  The allocation may be larger.
    pub(super) len: usize,
    pub(super) usage: BufferUsage,
}

pub(super) fn usages(usage: BufferUsage) -> wgpu::BufferUsages {
    match usage {
        BufferUsage::ReadWrite | BufferUsage::ReadOnly | BufferUsage::Input => {
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC
        }
        BufferUsage::Staging => wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        BufferUsage::Constant => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    }
}

/// Allocation size for `desc`.
pub(super) fn allocation_size(desc: &BufferDesc) -> u64 {
    let alignment = match desc.usage {
        //uniform structs are laid out in 16-byte units
        BufferUsage::Constant => 16,
        _ => wgpu::COPY_BUFFER_ALIGNMENT,
    };
    desc.byte_width.div_ceil(alignment) * alignment
}

pub(super) fn create(
    device: &wgpu::Device,
    id: u64,
    desc: &BufferDesc,
    initial_data: Option<&[u8]>,
) -> Result<WgpuBuffer, Error> {
    let size = allocation_size(desc);
    let label = format!("kernels_and_views buffer {id}");
    let usage = usages(desc.usage);
    let raw = scoped(device, || match initial_data {
        Some(data) => {
            let mut contents = data[..desc.byte_width as usize].to_vec();
            contents.resize(size as usize, 0);
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&label),
                contents: &contents,
                usage,
            })
        }
        None => device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&label),
            size,
            usage,
            mapped_at_creation: false,
        }),
    })?;
    Ok(WgpuBuffer {
        id,
        raw,
        len: desc.byte_width as usize,
        usage: desc.usage,
    })
}

/// Uploads `bytes` to the start of `buffer`.
pub(super) fn upload(queue: &wgpu::Queue, buffer: &WgpuBuffer, bytes: &[u8]) {
    let mut padded = bytes.to_vec();
    padded.resize(buffer.raw.size() as usize, 0);
    queue.write_buffer(&buffer.raw, 0, &padded);
}

/// Reads back the requested bytes of a staging buffer.
pub(super) fn read_back(device: &wgpu::Device, buffer: &WgpuBuffer) -> Result<Vec<u8>, Error> {
    let interval = logwise::perfwarn_begin!("kernels_and_views read_back");
    let (sender, receiver) = r#continue::continuation();
    buffer
        .raw
        .slice(..)
        .map_async(wgpu::MapMode::Read, move |result| sender.send(result));
    //a failed poll surfaces as a failed map below
    let _ = device.poll(wgpu::PollType::Wait);
    test_executors::sleep_on(receiver)?;
    let mut bytes = buffer.raw.slice(..).get_mapped_range().to_vec();
    buffer.raw.unmap();
    drop(interval);
    bytes.truncate(buffer.len);
    Ok(bytes)
}
