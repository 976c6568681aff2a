// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel formats for input textures, and the byte-level view of element types.
//!
//! [PixelFormat] carries the DXGI numeric code of each format so that callers
//! which already store those codes can pass them straight through with
//! [PixelFormat::from_dxgi].
//!
//! ```
//! use kernels_and_views::pixel_formats::PixelFormat;
//!
//! assert_eq!(PixelFormat::R32G32B32A32Float.dxgi(), 2);
//! assert_eq!(PixelFormat::R32G32B32A32Float.bytes_per_pixel(), 16);
//! assert_eq!(PixelFormat::from_dxgi(41), Some(PixelFormat::R32Float));
//! ```

/// A texel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R32G32B32A32Typeless,
    R32G32B32A32Float,
    R32G32B32A32Uint,
    R32G32B32A32Sint,
    R32G32B32Typeless,
    R32G32B32Float,
    R32G32B32Uint,
    R32G32B32Sint,
    R32G32Typeless,
    R32G32Float,
    R32G32Uint,
    R32G32Sint,
    R8G8B8A8Unorm,
    R32Typeless,
    R32Float,
    R32Uint,
    R32Sint,
    R8Unorm,
}

/// How a format's channels are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Typeless,
    Float,
    Uint,
    Sint,
    Unorm,
}

const ALL: [PixelFormat; 18] = [
    PixelFormat::R32G32B32A32Typeless,
    PixelFormat::R32G32B32A32Float,
    PixelFormat::R32G32B32A32Uint,
    PixelFormat::R32G32B32A32Sint,
    PixelFormat::R32G32B32Typeless,
    PixelFormat::R32G32B32Float,
    PixelFormat::R32G32B32Uint,
    PixelFormat::R32G32B32Sint,
    PixelFormat::R32G32Typeless,
    PixelFormat::R32G32Float,
    PixelFormat::R32G32Uint,
    PixelFormat::R32G32Sint,
    PixelFormat::R8G8B8A8Unorm,
    PixelFormat::R32Typeless,
    PixelFormat::R32Float,
    PixelFormat::R32Uint,
    PixelFormat::R32Sint,
    PixelFormat::R8Unorm,
];

impl PixelFormat {
    /// The `DXGI_FORMAT` value.
    pub const fn dxgi(self) -> u32 {
        match self {
            PixelFormat::R32G32B32A32Typeless => 1,
            PixelFormat::R32G32B32A32Float => 2,
            PixelFormat::R32G32B32A32Uint => 3,
            PixelFormat::R32G32B32A32Sint => 4,
            PixelFormat::R32G32B32Typeless => 5,
            PixelFormat::R32G32B32Float => 6,
            PixelFormat::R32G32B32Uint => 7,
            PixelFormat::R32G32B32Sint => 8,
            PixelFormat::R32G32Typeless => 15,
            PixelFormat::R32G32Float => 16,
            PixelFormat::R32G32Uint => 17,
            PixelFormat::R32G32Sint => 18,
            PixelFormat::R8G8B8A8Unorm => 28,
            PixelFormat::R32Typeless => 39,
            PixelFormat::R32Float => 41,
            PixelFormat::R32Uint => 42,
            PixelFormat::R32Sint => 43,
            PixelFormat::R8Unorm => 61,
        }
    }

    /// Looks up a format by its `DXGI_FORMAT` value.
    pub fn from_dxgi(code: u32) -> Option<Self> {
        ALL.into_iter().find(|format| format.dxgi() == code)
    }

    pub const fn channels(self) -> u8 {
        match self {
            PixelFormat::R32G32B32A32Typeless
            | PixelFormat::R32G32B32A32Float
            | PixelFormat::R32G32B32A32Uint
            | PixelFormat::R32G32B32A32Sint
            | PixelFormat::R8G8B8A8Unorm => 4,
            PixelFormat::R32G32B32Typeless
            | PixelFormat::R32G32B32Float
            | PixelFormat::R32G32B32Uint
            | PixelFormat::R32G32B32Sint => 3,
            PixelFormat::R32G32Typeless
            | PixelFormat::R32G32Float
            | PixelFormat::R32G32Uint
            | PixelFormat::R32G32Sint => 2,
            PixelFormat::R32Typeless
            | PixelFormat::R32Float
            | PixelFormat::R32Uint
            | PixelFormat::R32Sint
            | PixelFormat::R8Unorm => 1,
        }
    }

    pub const fn channel_type(self) -> ChannelType {
        match self {
            PixelFormat::R32G32B32A32Typeless
            | PixelFormat::R32G32B32Typeless
            | PixelFormat::R32G32Typeless
            | PixelFormat::R32Typeless => ChannelType::Typeless,
            PixelFormat::R32G32B32A32Float
            | PixelFormat::R32G32B32Float
            | PixelFormat::R32G32Float
            | PixelFormat::R32Float => ChannelType::Float,
            PixelFormat::R32G32B32A32Uint
            | PixelFormat::R32G32B32Uint
            | PixelFormat::R32G32Uint
            | PixelFormat::R32Uint => ChannelType::Uint,
            PixelFormat::R32G32B32A32Sint
            | PixelFormat::R32G32B32Sint
            | PixelFormat::R32G32Sint
            | PixelFormat::R32Sint => ChannelType::Sint,
            PixelFormat::R8G8B8A8Unorm | PixelFormat::R8Unorm => ChannelType::Unorm,
        }
    }

    pub const fn bytes_per_pixel(self) -> u32 {
        let channel_bytes = match self.channel_type() {
            ChannelType::Unorm => 1,
            _ => 4,
        };
        self.channels() as u32 * channel_bytes
    }
}

/// Marker trait for element types that move through buffers as plain bytes.
///
/// # Safety
///
/// Implementors must be `repr(C)` or primitive, contain no padding,
/// and accept every bit pattern as a valid value.
pub unsafe trait ReprC: Copy {}

unsafe impl ReprC for u8 {}
unsafe impl ReprC for i8 {}
unsafe impl ReprC for u16 {}
unsafe impl ReprC for i16 {}
unsafe impl ReprC for u32 {}
unsafe impl ReprC for i32 {}
unsafe impl ReprC for u64 {}
unsafe impl ReprC for i64 {}
unsafe impl ReprC for f32 {}
unsafe impl ReprC for f64 {}
unsafe impl<T: ReprC, const N: usize> ReprC for [T; N] {}

pub(crate) fn elements_as_bytes<T: ReprC>(t: &[T]) -> &[u8] {
    //safe because ReprC guarantees no padding
    unsafe { std::slice::from_raw_parts(t.as_ptr() as *const u8, std::mem::size_of_val(t)) }
}

pub(crate) fn elements_as_bytes_mut<T: ReprC>(t: &mut [T]) -> &mut [u8] {
    //safe because ReprC accepts every bit pattern
    unsafe { std::slice::from_raw_parts_mut(t.as_mut_ptr() as *mut u8, std::mem::size_of_val(t)) }
}
