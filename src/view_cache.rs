// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Reusable scratch arrays of native views.

Binding a list of handles to the compute stage needs a contiguous array of native views.  Rather
than allocate one per call, the cache keeps one array per [ViewKind], grows it to the largest
count ever requested, and hands out a borrow of its prefix.  The borrow ends before the next
session call, so a stale array can't be observed.
*/

use std::fmt::{Display, Formatter};

use crate::Error;
use crate::handles::{BufferHandle, Registry, TextureHandle};
use crate::imp::Backend;

/// The three binding kinds of the compute stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ReadOnly,
    ReadWrite,
    Constant,
}

impl Display for ViewKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ViewKind::ReadOnly => "read-only",
            ViewKind::ReadWrite => "read-write",
            ViewKind::Constant => "constant",
        };
        f.write_str(name)
    }
}

/// What to materialize.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Request<'a, H> {
    /// `n` empty slots, for unbinding.
    Unbind(usize),
    Bind(&'a [H]),
}

struct Scratch<T> {
    slots: Vec<Option<T>>,
}

impl<T: Clone> Scratch<T> {
    fn new() -> Self {
        Scratch { slots: Vec::new() }
    }

    fn reserve(&mut self, count: usize) -> &mut [Option<T>] {
        if self.slots.len() < count {
            self.slots.resize(count, None);
        }
        &mut self.slots[..count]
    }

    fn unbind(&mut self, count: usize) -> &[Option<T>] {
        let slots = self.reserve(count);
        slots.fill(None);
        slots
    }
}

pub(crate) struct ViewCache<B: Backend> {
    read: Scratch<B::ReadView>,
    write: Scratch<B::WriteView>,
    constant: Scratch<B::Buffer>,
}

impl<B: Backend> ViewCache<B> {
    pub(crate) fn new() -> Self {
        ViewCache {
            read: Scratch::new(),
            write: Scratch::new(),
            constant: Scratch::new(),
        }
    }

    pub(crate) fn high_water(&self, kind: ViewKind) -> usize {
        match kind {
            ViewKind::ReadOnly => self.read.slots.len(),
            ViewKind::ReadWrite => self.write.slots.len(),
            ViewKind::Constant => self.constant.slots.len(),
        }
    }

    /// Frees all three arrays.
    pub(crate) fn clear(&mut self) {
        self.read.slots = Vec::new();
        self.write.slots = Vec::new();
        self.constant.slots = Vec::new();
    }

    pub(crate) fn read_views(
        &mut self,
        registry: &Registry<B>,
        request: Request<'_, BufferHandle>,
    ) -> Result<&[Option<B::ReadView>], Error> {
        let buffers = match request {
            Request::Unbind(count) => return Ok(self.read.unbind(count)),
            Request::Bind(buffers) => buffers,
        };
        let slots = self.read.reserve(buffers.len());
        for (slot, &handle) in slots.iter_mut().zip(buffers) {
            let view = registry.buffer(handle)?.read_view.as_ref().ok_or(Error::MissingView {
                view: ViewKind::ReadOnly,
            })?;
            *slot = Some(view.clone());
        }
        Ok(&*slots)
    }

    /// Buffers first, then textures, in one array.
    pub(crate) fn read_views_with_textures(
        &mut self,
        registry: &Registry<B>,
        buffers: &[BufferHandle],
        textures: &[TextureHandle],
    ) -> Result<&[Option<B::ReadView>], Error> {
        let slots = self.read.reserve(buffers.len() + textures.len());
        let (buffer_slots, texture_slots) = slots.split_at_mut(buffers.len());
        for (slot, &handle) in buffer_slots.iter_mut().zip(buffers) {
            let view = registry.buffer(handle)?.read_view.as_ref().ok_or(Error::MissingView {
                view: ViewKind::ReadOnly,
            })?;
            *slot = Some(view.clone());
        }
        for (slot, &handle) in texture_slots.iter_mut().zip(textures) {
            *slot = Some(registry.texture(handle)?.read_view.clone());
        }
        Ok(&*slots)
    }

    pub(crate) fn write_views(
        &mut self,
        registry: &Registry<B>,
        request: Request<'_, BufferHandle>,
    ) -> Result<&[Option<B::WriteView>], Error> {
        let buffers = match request {
            Request::Unbind(count) => return Ok(self.write.unbind(count)),
            Request::Bind(buffers) => buffers,
        };
        let slots = self.write.reserve(buffers.len());
        for (slot, &handle) in slots.iter_mut().zip(buffers) {
            let view = registry.buffer(handle)?.write_view.as_ref().ok_or(Error::MissingView {
                view: ViewKind::ReadWrite,
            })?;
            *slot = Some(view.clone());
        }
        Ok(&*slots)
    }

    /// Constant buffers bind the buffer itself; any live buffer qualifies.
    pub(crate) fn constant_buffers(
        &mut self,
        registry: &Registry<B>,
        request: Request<'_, BufferHandle>,
    ) -> Result<&[Option<B::Buffer>], Error> {
        let buffers = match request {
            Request::Unbind(count) => return Ok(self.constant.unbind(count)),
            Request::Bind(buffers) => buffers,
        };
        let slots = self.constant.reserve(buffers.len());
        for (slot, &handle) in slots.iter_mut().zip(buffers) {
            *slot = Some(registry.buffer(handle)?.native.clone());
        }
        Ok(&*slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;
    use crate::handles::{ContextHandle, DeviceHandle, Handle};
    use crate::imp::software::SoftwareBackend;
    use crate::session::DeviceConfig;

    fn session_with_buffers(count: usize) -> (Session<SoftwareBackend>, Vec<BufferHandle>) {
        let mut session = Session::new(SoftwareBackend::default());
        let mut device = DeviceHandle::invalid();
        let mut context = ContextHandle::invalid();
        session
            .create_device(&DeviceConfig::default(), &mut device, &mut context)
            .unwrap();
        let mut buffers = Vec::new();
        for _ in 0..count {
            let mut buffer = BufferHandle::invalid();
            session
                .create_read_write_buffer(device, 4, 4, None, &mut buffer)
                .unwrap();
            buffers.push(buffer);
        }
        (session, buffers)
    }

    #[test]
    fn unbind_request_yields_empty_slots() {
        let (mut session, buffers) = session_with_buffers(2);
        let Session {
            registry, views, ..
        } = &mut session;
        views.read_views(registry, Request::Bind(&buffers)).unwrap();
        let slots = views.read_views(registry, Request::Unbind(5)).unwrap();
        assert_eq!(slots.len(), 5);
        assert!(slots.iter().all(Option::is_none));
        assert_eq!(views.high_water(ViewKind::ReadOnly), 5);
        assert_eq!(views.high_water(ViewKind::ReadWrite), 0);
    }

    #[test]
    fn grows_but_never_shrinks() {
        let (mut session, buffers) = session_with_buffers(3);
        let Session {
            registry, views, ..
        } = &mut session;
        assert_eq!(views.write_views(registry, Request::Bind(&buffers)).unwrap().len(), 3);
        assert_eq!(views.write_views(registry, Request::Bind(&buffers[..1])).unwrap().len(), 1);
        assert_eq!(views.high_water(ViewKind::ReadWrite), 3);
        assert_eq!(views.high_water(ViewKind::ReadOnly), 0);
    }

    #[test]
    fn invalid_handle_aborts_at_its_position() {
        let (mut session, buffers) = session_with_buffers(5);
        let Session {
            registry, views, ..
        } = &mut session;
        let first: Vec<_> = views
            .read_views(registry, Request::Bind(&buffers[..3]))
            .unwrap()
            .to_vec();
        let second = [buffers[3], BufferHandle::invalid(), buffers[4]];
        let err = views.read_views(registry, Request::Bind(&second)).unwrap_err();
        assert!(matches!(err, Error::InvalidHandle { .. }));
        let expected_zero = registry.buffers[buffers[3]].read_view.clone();
        assert_eq!(views.read.slots[0], expected_zero);
        assert_eq!(views.read.slots[2], first[2]);
    }

    #[test]
    fn buffers_then_textures() {
        let (mut session, buffers) = session_with_buffers(1);
        let device = session.registry.devices.keys().next().unwrap();
        let mut texture = TextureHandle::invalid();
        session
            .create_input_texture(
                device,
                2,
                2,
                crate::pixel_formats::PixelFormat::R32Float,
                None,
                &mut texture,
            )
            .unwrap();
        let Session {
            registry, views, ..
        } = &mut session;
        let slots = views
            .read_views_with_textures(registry, &buffers, &[texture])
            .unwrap()
            .to_vec();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0], registry.buffers[buffers[0]].read_view.clone());
        assert_eq!(slots[1], Some(registry.textures[texture].read_view.clone()));
    }

    #[test]
    fn missing_view_is_rejected() {
        let (mut session, _) = session_with_buffers(0);
        let device = session.registry.devices.keys().next().unwrap();
        let mut staging = BufferHandle::invalid();
        session
            .create_staging_buffer(device, 4, 1, &mut staging)
            .unwrap();
        let Session {
            registry, views, ..
        } = &mut session;
        let err = views
            .write_views(registry, Request::Bind(&[staging]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingView {
                view: ViewKind::ReadWrite
            }
        ));
    }
}
