// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Binding resources to the compute stage and dispatching.

Each binding call validates the context and every handle, materializes the native views through
the view cache, and binds them starting at slot 0.  [Session::unbind_all] clears every slot that
was ever bound, using the cache's high-water marks.
*/

use crate::Error;
use crate::handles::{BufferHandle, ContextHandle, ShaderHandle, TextureHandle};
use crate::imp::Backend;
use crate::session::Session;
use crate::view_cache::{Request, ViewKind};

/// Everything bound for one [Session::run].
#[derive(Debug, Clone, Copy, Default)]
pub struct Bindings<'a> {
    pub read: &'a [BufferHandle],
    /// Bound after `read`, in the same slot range.
    pub textures: &'a [TextureHandle],
    pub constant: &'a [BufferHandle],
    pub read_write: &'a [BufferHandle],
}

impl<B: Backend> Session<B> {
    /// Binds the read views of `buffers` at slots `0..buffers.len()`.
    pub fn set_read_buffers(
        &mut self,
        context: ContextHandle,
        buffers: &[BufferHandle],
    ) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        if buffers.is_empty() {
            return Ok(());
        }
        let views = self.views.read_views(&self.registry, Request::Bind(buffers))?;
        self.backend.set_read_views(&context.native, 0, views);
        logwise::trace_sync!("bound {count} read views", count = buffers.len());
        Ok(())
    }

    /// Binds the read views of `buffers` followed by those of `textures`.
    pub fn set_read_buffers_and_textures(
        &mut self,
        context: ContextHandle,
        buffers: &[BufferHandle],
        textures: &[TextureHandle],
    ) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        if buffers.is_empty() && textures.is_empty() {
            return Ok(());
        }
        let views = self
            .views
            .read_views_with_textures(&self.registry, buffers, textures)?;
        self.backend.set_read_views(&context.native, 0, views);
        logwise::trace_sync!(
            "bound {buffers} buffer and {textures} texture read views",
            buffers = buffers.len(),
            textures = textures.len()
        );
        Ok(())
    }

    pub fn set_constant_buffers(
        &mut self,
        context: ContextHandle,
        buffers: &[BufferHandle],
    ) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        if buffers.is_empty() {
            return Ok(());
        }
        let natives = self
            .views
            .constant_buffers(&self.registry, Request::Bind(buffers))?;
        self.backend.set_constant_buffers(&context.native, 0, natives);
        Ok(())
    }

    pub fn set_read_write_buffers(
        &mut self,
        context: ContextHandle,
        buffers: &[BufferHandle],
    ) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        if buffers.is_empty() {
            return Ok(());
        }
        let views = self.views.write_views(&self.registry, Request::Bind(buffers))?;
        self.backend.set_write_views(&context.native, 0, views);
        logwise::trace_sync!("bound {count} read-write views", count = buffers.len());
        Ok(())
    }

    /// Runs `shader` with `groups` thread groups over whatever is currently bound.
    pub fn dispatch(
        &mut self,
        context: ContextHandle,
        shader: ShaderHandle,
        groups: [u32; 3],
    ) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        let shader = self.registry.shader(shader)?;
        logwise::trace_sync!(
            "dispatch {entry} {x}x{y}x{z}",
            entry = logwise::privacy::LogIt(&shader.entry_point),
            x = groups[0],
            y = groups[1],
            z = groups[2]
        );
        self.backend
            .dispatch(&context.native, &shader.program, groups)
            .map_err(|status| {
                logwise::error_sync!(
                    "dispatch failed with {status}",
                    status = logwise::privacy::LogIt(&status)
                );
                Error::Backend(status)
            })
    }

    /// Clears every slot of every kind that has ever been bound.
    pub fn unbind_all(&mut self, context: ContextHandle) -> Result<(), Error> {
        let context = self.registry.context(context)?;
        let count = self.views.high_water(ViewKind::ReadOnly);
        if count > 0 {
            let views = self.views.read_views(&self.registry, Request::Unbind(count))?;
            self.backend.set_read_views(&context.native, 0, views);
        }
        let count = self.views.high_water(ViewKind::ReadWrite);
        if count > 0 {
            let views = self.views.write_views(&self.registry, Request::Unbind(count))?;
            self.backend.set_write_views(&context.native, 0, views);
        }
        let count = self.views.high_water(ViewKind::Constant);
        if count > 0 {
            let natives = self
                .views
                .constant_buffers(&self.registry, Request::Unbind(count))?;
            self.backend.set_constant_buffers(&context.native, 0, natives);
        }
        Ok(())
    }

    /// Binds every list in `bindings`, then dispatches.
    pub fn run(
        &mut self,
        context: ContextHandle,
        shader: ShaderHandle,
        bindings: &Bindings<'_>,
        groups: [u32; 3],
    ) -> Result<(), Error> {
        if bindings.textures.is_empty() {
            self.set_read_buffers(context, bindings.read)?;
        } else {
            self.set_read_buffers_and_textures(context, bindings.read, bindings.textures)?;
        }
        self.set_constant_buffers(context, bindings.constant)?;
        self.set_read_write_buffers(context, bindings.read_write)?;
        self.dispatch(context, shader, groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::{DeviceHandle, Handle};
    use crate::imp::software::SoftwareBackend;
    use crate::session::DeviceConfig;
    use crate::shader::CompileFlags;
    use crate::status::Status;

    fn session() -> (Session<SoftwareBackend>, DeviceHandle, ContextHandle) {
        let mut session = Session::new(SoftwareBackend::default());
        let mut device = DeviceHandle::invalid();
        let mut context = ContextHandle::invalid();
        session
            .create_device(&DeviceConfig::default(), &mut device, &mut context)
            .unwrap();
        (session, device, context)
    }

    #[test]
    fn empty_lists_still_validate_context() {
        let (mut session, _, context) = session();
        session.set_read_buffers(context, &[]).unwrap();
        let err = session
            .set_read_buffers(ContextHandle::invalid(), &[])
            .unwrap_err();
        assert_eq!(err.status(), Status::Fail);
        assert_eq!(session.high_water(ViewKind::ReadOnly), 0);
    }

    #[test]
    fn unbind_all_clears_to_high_water() {
        let (mut session, device, context) = session();
        let mut buffers = [BufferHandle::invalid(); 3];
        for buffer in &mut buffers {
            session
                .create_read_write_buffer(device, 4, 1, None, buffer)
                .unwrap();
        }
        session.set_read_write_buffers(context, &buffers).unwrap();
        session.set_read_write_buffers(context, &buffers[..1]).unwrap();
        assert_eq!(session.backend().bound_count(ViewKind::ReadWrite), 3);
        session.unbind_all(context).unwrap();
        assert_eq!(session.high_water(ViewKind::ReadWrite), 3);
        assert_eq!(session.backend().bound_count(ViewKind::ReadWrite), 0);
    }

    #[test]
    fn run_binds_and_dispatches() {
        let (mut session, device, context) = session();
        session.backend_mut().register_kernel("add", |invocation| {
            let input = invocation.read(0).map(<[u8]>::to_vec).unwrap_or_default();
            let bias = invocation.constant(0).map(|c| c[0]).unwrap_or(0);
            if let Some(output) = invocation.read_write(0) {
                for (out, value) in output.iter_mut().zip(input) {
                    *out = value + bias;
                }
            }
        });
        let mut shader = ShaderHandle::invalid();
        session
            .compile_shader(device, "", "add", "cs_5_0", CompileFlags::NONE, &mut shader)
            .unwrap();
        let mut input = BufferHandle::invalid();
        let mut bias = BufferHandle::invalid();
        let mut output = BufferHandle::invalid();
        let mut staging = BufferHandle::invalid();
        session
            .create_read_buffer(device, 1, 4, Some(&[1, 2, 3, 4]), &mut input)
            .unwrap();
        session.create_constant_buffer(device, 16, &mut bias).unwrap();
        session.write(context, bias, &[10]).unwrap();
        session
            .create_read_write_buffer(device, 1, 4, None, &mut output)
            .unwrap();
        session.create_staging_buffer(device, 1, 4, &mut staging).unwrap();

        let bindings = Bindings {
            read: &[input],
            constant: &[bias],
            read_write: &[output],
            ..Default::default()
        };
        session.run(context, shader, &bindings, [1, 1, 1]).unwrap();
        let mut out = [0u8; 4];
        session.read(context, staging, output, &mut out).unwrap();
        assert_eq!(out, [11, 12, 13, 14]);
    }

    #[test]
    fn dispatch_rejects_released_shader() {
        let (mut session, _, context) = session();
        let err = session
            .dispatch(context, ShaderHandle::invalid(), [1, 1, 1])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHandle { .. }));
    }
}
