// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The [Session] owns every native object, the handle arenas and the view cache.

There is no process-wide state.  All operations take `&mut self`, so a session is used from one
thread at a time and every borrow of cached views ends before the next call.
*/

use std::path::Path;

use crate::Error;
use crate::handles::{
    BufferHandle, ContextEntry, ContextHandle, DeviceEntry, DeviceHandle, Handle, Registry,
    ShaderEntry, ShaderHandle, TextureHandle,
};
use crate::imp::{Backend, DefaultBackend};
use crate::shader::{CompileFlags, CompileRequest, read_source};
use crate::view_cache::{ViewCache, ViewKind};

/// Which kind of adapter to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DriverType {
    Unknown,
    #[default]
    Hardware,
    Reference,
    /// A device that accepts calls but can't execute anything.
    Null,
    Software,
    Warp,
}

/// Minimum capability level for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum FeatureLevel {
    Level9_1,
    Level9_2,
    Level9_3,
    Level10_0,
    Level10_1,
    #[default]
    Level11_0,
}

impl FeatureLevel {
    /// The `D3D_FEATURE_LEVEL` value.
    pub const fn code(self) -> u32 {
        match self {
            FeatureLevel::Level9_1 => 0x9100,
            FeatureLevel::Level9_2 => 0x9200,
            FeatureLevel::Level9_3 => 0x9300,
            FeatureLevel::Level10_0 => 0xa000,
            FeatureLevel::Level10_1 => 0xa100,
            FeatureLevel::Level11_0 => 0xb000,
        }
    }
}

/// Device creation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceConfig {
    pub driver_type: DriverType,
    pub feature_level: FeatureLevel,
    pub debug_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            driver_type: DriverType::default(),
            feature_level: FeatureLevel::default(),
            debug_name: "kernels_and_views".to_string(),
        }
    }
}

impl DeviceConfig {
    pub fn new(driver_type: DriverType, feature_level: FeatureLevel) -> Self {
        DeviceConfig {
            driver_type,
            feature_level,
            ..Default::default()
        }
    }
}

/// A device, its context, and everything created on them.
pub struct Session<B: Backend = DefaultBackend> {
    pub(crate) backend: B,
    pub(crate) registry: Registry<B>,
    pub(crate) views: ViewCache<B>,
    active: Option<(DeviceHandle, ContextHandle)>,
}

impl<B: Backend + Default> Default for Session<B> {
    fn default() -> Self {
        Session::new(B::default())
    }
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Self {
        Session {
            backend,
            registry: Registry::new(),
            views: ViewCache::new(),
            active: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Whether `handle` currently resolves in this session.
    pub fn is_live<H: Handle>(&self, handle: H) -> bool {
        self.registry.contains(handle)
    }

    /// Number of slots the scratch array for `kind` has grown to.
    pub fn high_water(&self, kind: ViewKind) -> usize {
        self.views.high_water(kind)
    }

    /// Creates the device and its immediate context.
    ///
    /// Any device and context created earlier by this session are released first, and both
    /// slots are reset.  On failure both slots stay null.
    ///
    /// Shaders, buffers and textures created on a released device stop validating and fail with
    /// [Error::InvalidHandle].  They still have to be released (or go with [Session::dispose]).
    pub fn create_device(
        &mut self,
        config: &DeviceConfig,
        device: &mut DeviceHandle,
        context: &mut ContextHandle,
    ) -> Result<(), Error> {
        self.release_device_pair();
        *device = DeviceHandle::invalid();
        *context = ContextHandle::invalid();

        let (native_device, native_context) =
            self.backend.create_device(config).map_err(|status| {
                logwise::error_sync!(
                    "device creation failed: {status}",
                    status = logwise::privacy::LogIt(&status)
                );
                Error::Backend(status)
            })?;
        let device_handle = self.registry.devices.insert(DeviceEntry {
            native: native_device,
            config: config.clone(),
        });
        let context_handle = self.registry.contexts.insert(ContextEntry {
            native: native_context,
        });
        self.active = Some((device_handle, context_handle));
        logwise::info_sync!(
            "created device {name} ({driver})",
            name = logwise::privacy::LogIt(&config.debug_name),
            driver = logwise::privacy::LogIt(&config.driver_type)
        );
        *device = device_handle;
        *context = context_handle;
        Ok(())
    }

    fn release_device_pair(&mut self) {
        if let Some((device, context)) = self.active.take() {
            if let Some(entry) = self.registry.contexts.remove(context) {
                self.backend.release_context(entry.native);
            }
            if let Some(entry) = self.registry.devices.remove(device) {
                logwise::info_sync!(
                    "released device {name}",
                    name = logwise::privacy::LogIt(&entry.config.debug_name)
                );
                self.backend.release_device(entry.native);
            }
        }
    }

    /// Compiles `source` into a compute program.
    ///
    /// A live shader already in `shader` is released first.  Compiler diagnostics are returned
    /// in [Error::Compile].
    pub fn compile_shader(
        &mut self,
        device: DeviceHandle,
        source: &str,
        entry_point: &str,
        profile: &str,
        flags: CompileFlags,
        shader: &mut ShaderHandle,
    ) -> Result<(), Error> {
        self.compile_labeled(device, source, entry_point, profile, flags, entry_point, shader)
    }

    /// Reads a shader from `path` and compiles it.
    ///
    /// A file that can't be read fails with [crate::Status::FileNotFound].
    pub fn compile_shader_file(
        &mut self,
        device: DeviceHandle,
        path: &Path,
        entry_point: &str,
        profile: &str,
        flags: CompileFlags,
        shader: &mut ShaderHandle,
    ) -> Result<(), Error> {
        self.release_shader(shader);
        self.registry.device(device)?;
        let source = read_source(path)?;
        let label = path.display().to_string();
        self.compile_labeled(device, &source, entry_point, profile, flags, &label, shader)
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_labeled(
        &mut self,
        device: DeviceHandle,
        source: &str,
        entry_point: &str,
        profile: &str,
        flags: CompileFlags,
        debug_name: &str,
        shader: &mut ShaderHandle,
    ) -> Result<(), Error> {
        self.release_shader(shader);
        let owner = device;
        let device = self.registry.device(device)?;
        let request = CompileRequest {
            source,
            entry_point,
            profile,
            flags,
            debug_name,
        };
        let program = self
            .backend
            .compile(&device.native, &request)
            .map_err(|failure| {
                logwise::error_sync!(
                    "compiling {name} failed: {diagnostics}",
                    name = logwise::privacy::LogIt(&debug_name),
                    diagnostics = logwise::privacy::LogIt(&failure.diagnostics)
                );
                Error::from(failure)
            })?;
        *shader = self.registry.shaders.insert(ShaderEntry {
            device: owner,
            program,
            entry_point: entry_point.to_string(),
        });
        Ok(())
    }

    /// Releases a shader and nulls the slot.  A no-op for handles that aren't live.
    pub fn release_shader(&mut self, shader: &mut ShaderHandle) {
        if let Some(entry) = self.registry.shaders.remove(*shader) {
            self.backend.release_program(entry.program);
        }
        *shader = ShaderHandle::invalid();
    }

    /// Releases a buffer with its views and nulls the slot.  A no-op for handles that aren't live.
    pub fn release_buffer(&mut self, buffer: &mut BufferHandle) {
        if let Some(entry) = self.registry.buffers.remove(*buffer) {
            entry.release(&mut self.backend);
        }
        *buffer = BufferHandle::invalid();
    }

    /// Releases a texture with its view and nulls the slot.  A no-op for handles that aren't live.
    pub fn release_texture(&mut self, texture: &mut TextureHandle) {
        if let Some(entry) = self.registry.textures.remove(*texture) {
            entry.release(&mut self.backend);
        }
        *texture = TextureHandle::invalid();
    }

    /// Global teardown.
    ///
    /// Frees the view cache, releases every live shader, buffer and texture, and then the
    /// device and context.  The session stays usable; a new device may be created afterwards.
    pub fn dispose(&mut self) {
        self.views.clear();
        for (_, entry) in self.registry.shaders.drain() {
            self.backend.release_program(entry.program);
        }
        for (_, entry) in self.registry.buffers.drain() {
            entry.release(&mut self.backend);
        }
        for (_, entry) in self.registry.textures.drain() {
            entry.release(&mut self.backend);
        }
        self.release_device_pair();
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::software::{ObjectKind, Operation, SoftwareBackend};
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
    fn second_device_releases_first() {
        let (mut session, first_device, first_context) = session();
        let mut device = DeviceHandle::invalid();
        let mut context = ContextHandle::invalid();
        session
            .create_device(&DeviceConfig::default(), &mut device, &mut context)
            .unwrap();
        assert!(!session.is_live(first_device));
        assert!(!session.is_live(first_context));
        assert!(session.is_live(device));
        assert_eq!(session.backend().counts(ObjectKind::Device).released, 1);
        assert_eq!(session.backend().counts(ObjectKind::Context).released, 1);
    }

    #[test]
    fn resources_of_a_replaced_device_stop_resolving() {
        let (mut session, device, _) = session();
        session.backend_mut().register_kernel("main", |_| {});
        let mut buffer = BufferHandle::invalid();
        let mut shader = ShaderHandle::invalid();
        session
            .create_read_write_buffer(device, 4, 16, None, &mut buffer)
            .unwrap();
        session
            .compile_shader(device, "", "main", "cs_5_0", CompileFlags::NONE, &mut shader)
            .unwrap();

        let mut device = DeviceHandle::invalid();
        let mut context = ContextHandle::invalid();
        session
            .create_device(&DeviceConfig::default(), &mut device, &mut context)
            .unwrap();
        assert!(!session.is_live(buffer));
        assert!(matches!(
            session.write(context, buffer, &[0; 64]),
            Err(Error::InvalidHandle {
                kind: crate::HandleKind::Buffer
            })
        ));
        assert!(matches!(
            session.dispatch(context, shader, [1, 1, 1]),
            Err(Error::InvalidHandle {
                kind: crate::HandleKind::Shader
            })
        ));

        //still released exactly once
        session.release_buffer(&mut buffer);
        session.release_shader(&mut shader);
        assert_eq!(session.backend().counts(ObjectKind::Buffer).released, 1);
        assert_eq!(session.backend().counts(ObjectKind::Program).released, 1);
        assert_eq!(session.backend().double_releases(), 0);
    }

    #[test]
    fn failed_device_leaves_null_slots() {
        let (mut session, _, _) = session();
        session
            .backend_mut()
            .fail_next(Operation::CreateDevice, Status::OutOfMemory);
        let mut device = DeviceHandle::invalid();
        let mut context = ContextHandle::invalid();
        let err = session
            .create_device(&DeviceConfig::default(), &mut device, &mut context)
            .unwrap_err();
        assert_eq!(err.status(), Status::OutOfMemory);
        assert_eq!(device, DeviceHandle::invalid());
        assert_eq!(context, ContextHandle::invalid());
    }

    #[test]
    fn compile_failure_carries_diagnostics() {
        let (mut session, device, _) = session();
        let mut shader = ShaderHandle::invalid();
        let err = session
            .compile_shader(device, "", "missing", "cs_5_0", CompileFlags::NONE, &mut shader)
            .unwrap_err();
        match err {
            Error::Compile { diagnostics, .. } => assert!(diagnostics.contains("missing")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(shader, ShaderHandle::invalid());
    }

    #[test]
    fn recompiling_into_a_slot_releases_once() {
        let (mut session, device, _) = session();
        session.backend_mut().register_kernel("main", |_| {});
        let mut shader = ShaderHandle::invalid();
        session
            .compile_shader(device, "", "main", "cs_5_0", CompileFlags::NONE, &mut shader)
            .unwrap();
        let first = shader;
        session
            .compile_shader(device, "", "main", "cs_5_0", CompileFlags::NONE, &mut shader)
            .unwrap();
        assert!(!session.is_live(first));
        assert!(session.is_live(shader));
        let counts = session.backend().counts(ObjectKind::Program);
        assert_eq!(counts.created, 2);
        assert_eq!(counts.released, 1);
        session.release_shader(&mut shader);
        session.release_shader(&mut shader);
        assert_eq!(session.backend().counts(ObjectKind::Program).released, 2);
        assert_eq!(session.backend().double_releases(), 0);
    }

    #[test]
    fn missing_shader_file() {
        let (mut session, device, _) = session();
        let mut shader = ShaderHandle::invalid();
        let err = session
            .compile_shader_file(
                device,
                Path::new("/no/such/kernel.hlsl"),
                "main",
                "cs_5_0",
                CompileFlags::NONE,
                &mut shader,
            )
            .unwrap_err();
        assert_eq!(err.status(), Status::FileNotFound);
    }

    #[test]
    fn compile_on_invalid_device() {
        let (mut session, _, _) = session();
        let mut shader = ShaderHandle::invalid();
        let err = session
            .compile_shader(
                DeviceHandle::invalid(),
                "",
                "main",
                "cs_5_0",
                CompileFlags::NONE,
                &mut shader,
            )
            .unwrap_err();
        assert_eq!(err.status(), Status::Fail);
    }
}
