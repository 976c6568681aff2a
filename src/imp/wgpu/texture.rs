// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wgpu::util::DeviceExt;
use wgpu::{Extent3d, TexelCopyBufferLayout, TexelCopyTextureInfo};

use super::Error;
use super::error::scoped;
use crate::factory::TextureDesc;

/// A 2D texture on a wgpu device.
#[derive(Debug)]
pub struct WgpuTexture {
    pub(super) id: u64,
    pub(super) raw: wgpu::Texture,
    pub(super) format: wgpu::TextureFormat,
    pub(super) height: u32,
    /// Distance between rows in uploads.
    pub(super) row_pitch: usize,
}

/// Rows uploaded to a texture must start on 256-byte boundaries.
pub(super) fn aligned_bytes_per_row(row_bytes: usize) -> usize {
    let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    row_bytes.div_ceil(alignment) * alignment
}

fn extent(desc: &TextureDesc) -> Extent3d {
    Extent3d {
        width: desc.width,
        height: desc.height,
        depth_or_array_layers: 1,
    }
}

pub(super) fn create(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    id: u64,
    desc: &TextureDesc,
    initial_data: Option<&[u8]>,
) -> Result<WgpuTexture, Error> {
    let format = desc.format.wgpu_format()?;
    let label = format!("kernels_and_views texture {id}");
    let descriptor = wgpu::TextureDescriptor {
        label: Some(&label),
        size: extent(desc),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    };
    let raw = scoped(device, || match initial_data {
        Some(data) => device.create_texture_with_data(
            queue,
            &descriptor,
            wgpu::util::TextureDataOrder::LayerMajor,
            &data[..desc.tight_len() as usize],
        ),
        None => device.create_texture(&descriptor),
    })?;
    Ok(WgpuTexture {
        id,
        raw,
        format,
        height: desc.height,
        row_pitch: aligned_bytes_per_row(desc.row_bytes() as usize),
    })
}

/// The length of a mapping of `texture`.
pub(super) fn mapped_len(texture: &WgpuTexture) -> usize {
    texture.row_pitch * texture.height as usize
}

/// Uploads pitched rows to the whole of `texture`.
pub(super) fn upload(queue: &wgpu::Queue, texture: &WgpuTexture, bytes: &[u8]) {
    queue.write_texture(
        TexelCopyTextureInfo {
            texture: &texture.raw,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(texture.row_pitch as u32),
            rows_per_image: Some(texture.height),
        },
        texture.raw.size(),
    );
}
