// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Recompilable kernels.

A [KernelCache] holds the source of one shader file and compiles entry points on demand.  Each
compile prepends a caller-supplied parameter block (typically `#define`s) to the source.  The
compiled shader is reused for as long as the same entry point is asked for with the same
parameters; a different parameter block releases the old shader and compiles a new one.

A [KernelRepository] keeps one [KernelCache] per shader file and brings up the device they are
compiled on the first time it is needed.
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::Error;
use crate::handles::{ContextHandle, DeviceHandle, Handle, ShaderHandle};
use crate::imp::Backend;
use crate::session::{DeviceConfig, Session};
use crate::shader::{CompileFlags, read_source};

#[derive(Debug)]
struct Compiled {
    parameters: String,
    shader: ShaderHandle,
}

#[derive(Debug)]
pub struct KernelCache {
    source: String,
    profile: String,
    flags: CompileFlags,
    kernels: HashMap<String, Compiled>,
}

impl KernelCache {
    pub fn new(source: impl Into<String>, profile: impl Into<String>, flags: CompileFlags) -> Self {
        KernelCache {
            source: source.into(),
            profile: profile.into(),
            flags,
            kernels: HashMap::new(),
        }
    }

    /// Reads the shader source from `path`.
    pub fn from_file(
        path: &Path,
        profile: impl Into<String>,
        flags: CompileFlags,
    ) -> Result<Self, Error> {
        Ok(KernelCache::new(read_source(path)?, profile, flags))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the shader for `entry_point` compiled with `parameters`, compiling it if needed.
    pub fn get<B: Backend>(
        &mut self,
        session: &mut Session<B>,
        device: DeviceHandle,
        entry_point: &str,
        parameters: &str,
    ) -> Result<ShaderHandle, Error> {
        if let Some(compiled) = self.kernels.get(entry_point)
            && compiled.parameters == parameters
            && session.is_live(compiled.shader)
        {
            return Ok(compiled.shader);
        }

        let mut shader = match self.kernels.remove(entry_point) {
            Some(stale) => stale.shader,
            None => ShaderHandle::default(),
        };
        logwise::info_sync!(
            "compiling kernel {entry}",
            entry = logwise::privacy::LogIt(&entry_point)
        );
        let source = format!("{parameters}{}", self.source);
        session.compile_shader(
            device,
            &source,
            entry_point,
            &self.profile,
            self.flags,
            &mut shader,
        )?;
        self.kernels.insert(
            entry_point.to_string(),
            Compiled {
                parameters: parameters.to_string(),
                shader,
            },
        );
        Ok(shader)
    }

    /// Releases every compiled kernel.
    pub fn release<B: Backend>(&mut self, session: &mut Session<B>) {
        for (_, mut compiled) in self.kernels.drain() {
            session.release_shader(&mut compiled.shader);
        }
    }
}

/// Kernel caches keyed by shader file, sharing one lazily created device.
#[derive(Debug)]
pub struct KernelRepository {
    profile: String,
    flags: CompileFlags,
    config: DeviceConfig,
    device: Option<(DeviceHandle, ContextHandle)>,
    files: HashMap<PathBuf, KernelCache>,
}

impl KernelRepository {
    pub fn new(profile: impl Into<String>, flags: CompileFlags) -> Self {
        KernelRepository {
            profile: profile.into(),
            flags,
            config: DeviceConfig::default(),
            device: None,
            files: HashMap::new(),
        }
    }

    /// Configuration for the device created on first use.
    pub fn with_device_config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    /// The repository's device and context.
    ///
    /// Created on first use, and again whenever the previous pair no longer resolves (after
    /// [Session::dispose], or when another device replaced it).
    pub fn device<B: Backend>(
        &mut self,
        session: &mut Session<B>,
    ) -> Result<(DeviceHandle, ContextHandle), Error> {
        if let Some((device, context)) = self.device
            && session.is_live(device)
            && session.is_live(context)
        {
            return Ok((device, context));
        }
        let mut device = DeviceHandle::invalid();
        let mut context = ContextHandle::invalid();
        session.create_device(&self.config, &mut device, &mut context)?;
        self.device = Some((device, context));
        Ok((device, context))
    }

    /// The shader for `entry_point` in the file at `path`, compiled with `parameters`.
    ///
    /// The file is read once, the first time it is asked for.
    pub fn get<B: Backend>(
        &mut self,
        session: &mut Session<B>,
        path: &Path,
        entry_point: &str,
        parameters: &str,
    ) -> Result<ShaderHandle, Error> {
        let (device, _) = self.device(session)?;
        if !self.files.contains_key(path) {
            let cache = KernelCache::from_file(path, self.profile.as_str(), self.flags)?;
            self.files.insert(path.to_path_buf(), cache);
        }
        match self.files.get_mut(path) {
            Some(cache) => cache.get(session, device, entry_point, parameters),
            None => Err(Error::InvalidArgument("kernel file was not loaded")),
        }
    }

    /// Releases every compiled kernel and forgets the loaded files.  The device stays with
    /// `session`.
    pub fn release<B: Backend>(&mut self, session: &mut Session<B>) {
        for (_, mut cache) in self.files.drain() {
            cache.release(session);
        }
    }
}
