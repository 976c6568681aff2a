// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Typed handles and the registry that resolves them.

A handle is a generational key into a per-kind arena owned by the [crate::Session].  The key's type
plays the role of a type tag, and the arena's slot version plays the role of the liveness bit: once
an entry is released, every copy of its handle stops resolving, and a freshly allocated entry in
the same slot gets a new version.

The null key ([Handle::invalid]) never resolves.

```
use kernels_and_views::{BufferHandle, Handle};

let invalid = BufferHandle::invalid();
assert_eq!(invalid, BufferHandle::default());
assert_eq!(BufferHandle::from_raw(invalid.to_raw()), invalid);
```
*/

use std::fmt::{Display, Formatter};

use slotmap::{Key, KeyData, SlotMap, new_key_type};

use crate::Error;
use crate::factory::{BufferDesc, TextureDesc};
use crate::imp::Backend;
use crate::session::DeviceConfig;

new_key_type! {
    /// A GPU device.
    pub struct DeviceHandle;
    /// The immediate command context of a device.
    pub struct ContextHandle;
    /// A compiled compute program.
    pub struct ShaderHandle;
    /// A buffer in one of the five usage classes.
    pub struct BufferHandle;
    /// A 2D input texture.
    pub struct TextureHandle;
}

/// The kind of entity a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Device,
    Context,
    Shader,
    Buffer,
    Texture,
}

impl Display for HandleKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandleKind::Device => "device",
            HandleKind::Context => "context",
            HandleKind::Shader => "shader",
            HandleKind::Buffer => "buffer",
            HandleKind::Texture => "texture",
        };
        f.write_str(name)
    }
}

/// Operations shared by every handle type.
pub trait Handle: Key {
    const KIND: HandleKind;

    /// The null handle.  Never live.
    fn invalid() -> Self {
        Self::null()
    }

    /// Flattens the handle for a boundary that only carries integers.
    fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    /// Rebuilds a handle from [Handle::to_raw].
    ///
    /// Any value is accepted; forged or stale values simply fail validation.
    fn from_raw(raw: u64) -> Self {
        Self::from(KeyData::from_ffi(raw))
    }
}

impl Handle for DeviceHandle {
    const KIND: HandleKind = HandleKind::Device;
}
impl Handle for ContextHandle {
    const KIND: HandleKind = HandleKind::Context;
}
impl Handle for ShaderHandle {
    const KIND: HandleKind = HandleKind::Shader;
}
impl Handle for BufferHandle {
    const KIND: HandleKind = HandleKind::Buffer;
}
impl Handle for TextureHandle {
    const KIND: HandleKind = HandleKind::Texture;
}

pub(crate) struct DeviceEntry<B: Backend> {
    pub(crate) native: B::Device,
    pub(crate) config: DeviceConfig,
}

pub(crate) struct ContextEntry<B: Backend> {
    pub(crate) native: B::Context,
}

pub(crate) struct ShaderEntry<B: Backend> {
    pub(crate) device: DeviceHandle,
    pub(crate) program: B::Program,
    pub(crate) entry_point: String,
}

pub(crate) struct BufferEntry<B: Backend> {
    pub(crate) device: DeviceHandle,
    pub(crate) native: B::Buffer,
    pub(crate) read_view: Option<B::ReadView>,
    pub(crate) write_view: Option<B::WriteView>,
    pub(crate) desc: BufferDesc,
}

impl<B: Backend> BufferEntry<B> {
    pub(crate) fn release(self, backend: &mut B) {
        if let Some(view) = self.read_view {
            backend.release_read_view(view);
        }
        if let Some(view) = self.write_view {
            backend.release_write_view(view);
        }
        backend.release_buffer(self.native);
    }
}

pub(crate) struct TextureEntry<B: Backend> {
    pub(crate) device: DeviceHandle,
    pub(crate) native: B::Texture,
    pub(crate) read_view: B::ReadView,
    pub(crate) desc: TextureDesc,
}

impl<B: Backend> TextureEntry<B> {
    pub(crate) fn release(self, backend: &mut B) {
        backend.release_read_view(self.read_view);
        backend.release_texture(self.native);
    }
}

/// Entries created on a device.
pub(crate) trait Owned {
    fn device(&self) -> DeviceHandle;
}

impl<B: Backend> Owned for ShaderEntry<B> {
    fn device(&self) -> DeviceHandle {
        self.device
    }
}

impl<B: Backend> Owned for BufferEntry<B> {
    fn device(&self) -> DeviceHandle {
        self.device
    }
}

impl<B: Backend> Owned for TextureEntry<B> {
    fn device(&self) -> DeviceHandle {
        self.device
    }
}

/// Arenas for every entity kind.
///
/// Shaders, buffers and textures stop resolving once the device they were created on is gone,
/// though they stay in their arenas until released.
pub(crate) struct Registry<B: Backend> {
    pub(crate) devices: SlotMap<DeviceHandle, DeviceEntry<B>>,
    pub(crate) contexts: SlotMap<ContextHandle, ContextEntry<B>>,
    pub(crate) shaders: SlotMap<ShaderHandle, ShaderEntry<B>>,
    pub(crate) buffers: SlotMap<BufferHandle, BufferEntry<B>>,
    pub(crate) textures: SlotMap<TextureHandle, TextureEntry<B>>,
}

impl<B: Backend> Registry<B> {
    pub(crate) fn new() -> Self {
        Registry {
            devices: SlotMap::with_key(),
            contexts: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
        }
    }

    pub(crate) fn contains<H: Handle>(&self, handle: H) -> bool {
        let data = handle.data();
        match H::KIND {
            HandleKind::Device => self.devices.contains_key(DeviceHandle::from(data)),
            HandleKind::Context => self.contexts.contains_key(ContextHandle::from(data)),
            HandleKind::Shader => self.owned(&self.shaders, ShaderHandle::from(data)).is_some(),
            HandleKind::Buffer => self.owned(&self.buffers, BufferHandle::from(data)).is_some(),
            HandleKind::Texture => {
                self.owned(&self.textures, TextureHandle::from(data)).is_some()
            }
        }
    }

    fn owned<'a, K: Key, T: Owned>(&self, arena: &'a SlotMap<K, T>, key: K) -> Option<&'a T> {
        arena
            .get(key)
            .filter(|entry| self.devices.contains_key(entry.device()))
    }

    pub(crate) fn device(&self, handle: DeviceHandle) -> Result<&DeviceEntry<B>, Error> {
        self.devices.get(handle).ok_or_else(|| rejected(handle))
    }

    pub(crate) fn context(&self, handle: ContextHandle) -> Result<&ContextEntry<B>, Error> {
        self.contexts.get(handle).ok_or_else(|| rejected(handle))
    }

    pub(crate) fn shader(&self, handle: ShaderHandle) -> Result<&ShaderEntry<B>, Error> {
        self.owned(&self.shaders, handle).ok_or_else(|| rejected(handle))
    }

    pub(crate) fn buffer(&self, handle: BufferHandle) -> Result<&BufferEntry<B>, Error> {
        self.owned(&self.buffers, handle).ok_or_else(|| rejected(handle))
    }

    pub(crate) fn texture(&self, handle: TextureHandle) -> Result<&TextureEntry<B>, Error> {
        self.owned(&self.textures, handle).ok_or_else(|| rejected(handle))
    }
}

fn rejected<H: Handle>(handle: H) -> Error {
    logwise::warn_sync!(
        "rejected {kind} handle {raw}",
        kind = logwise::privacy::LogIt(&H::KIND),
        raw = handle.to_raw()
    );
    Error::InvalidHandle { kind: H::KIND }
}
