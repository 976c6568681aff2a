// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::pixel_formats::PixelFormat;

use super::Error;

impl PixelFormat {
    /// The wgpu format with the same texel layout.  Typeless formats map to their uint variant,
    /// and three-channel formats have no equivalent.
    pub(super) fn wgpu_format(self) -> Result<wgpu::TextureFormat, Error> {
        match self {
            PixelFormat::R32G32B32A32Typeless | PixelFormat::R32G32B32A32Uint => {
                Ok(wgpu::TextureFormat::Rgba32Uint)
            }
            PixelFormat::R32G32B32A32Float => Ok(wgpu::TextureFormat::Rgba32Float),
            PixelFormat::R32G32B32A32Sint => Ok(wgpu::TextureFormat::Rgba32Sint),
            PixelFormat::R32G32Typeless | PixelFormat::R32G32Uint => {
                Ok(wgpu::TextureFormat::Rg32Uint)
            }
            PixelFormat::R32G32Float => Ok(wgpu::TextureFormat::Rg32Float),
            PixelFormat::R32G32Sint => Ok(wgpu::TextureFormat::Rg32Sint),
            PixelFormat::R32Typeless | PixelFormat::R32Uint => Ok(wgpu::TextureFormat::R32Uint),
            PixelFormat::R32Float => Ok(wgpu::TextureFormat::R32Float),
            PixelFormat::R32Sint => Ok(wgpu::TextureFormat::R32Sint),
            PixelFormat::R8G8B8A8Unorm => Ok(wgpu::TextureFormat::Rgba8Unorm),
            PixelFormat::R8Unorm => Ok(wgpu::TextureFormat::R8Unorm),
            PixelFormat::R32G32B32Typeless
            | PixelFormat::R32G32B32Float
            | PixelFormat::R32G32B32Uint
            | PixelFormat::R32G32B32Sint => Err(Error::UnsupportedFormat),
        }
    }
}

/// How a shader samples a bound texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Float,
    Uint,
    Sint,
}

impl SampleKind {
    pub(super) fn of(format: wgpu::TextureFormat) -> Self {
        match format {
            wgpu::TextureFormat::Rgba32Uint
            | wgpu::TextureFormat::Rg32Uint
            | wgpu::TextureFormat::R32Uint => SampleKind::Uint,
            wgpu::TextureFormat::Rgba32Sint
            | wgpu::TextureFormat::Rg32Sint
            | wgpu::TextureFormat::R32Sint => SampleKind::Sint,
            _ => SampleKind::Float,
        }
    }

    pub(super) fn wgpu(self) -> wgpu::TextureSampleType {
        match self {
            //32-bit floats aren't filterable without an extra feature
            SampleKind::Float => wgpu::TextureSampleType::Float { filterable: false },
            SampleKind::Uint => wgpu::TextureSampleType::Uint,
            SampleKind::Sint => wgpu::TextureSampleType::Sint,
        }
    }
}
