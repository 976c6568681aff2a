// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! kernels_and_views is a handle-validating layer for GPU compute.

It sits between a caller that only wants to say "run this kernel over these buffers" and a GPU
backend that will happily crash on a dangling pointer.  Everything the caller holds is an opaque,
typed [Handle]; every handle is checked before a native object is touched; and the arrays of native
views needed to bind resources are cached and reused across calls.

# Model

One [Session] owns one device, its immediate context, and everything created on them.  The
session is the only state; there are no globals.

| Step       | Operations                                                                                     |
|------------|------------------------------------------------------------------------------------------------|
| Device     | [Session::create_device]                                                                       |
| Shaders    | [Session::compile_shader], [Session::compile_shader_file], [KernelCache]                       |
| Resources  | [Session::create_read_write_buffer] and the other usage classes, [Session::create_input_texture] |
| Transfer   | [Session::write], [Session::write_texture], [Session::copy], [Session::read]                    |
| Dispatch   | [Session::set_read_buffers] and friends, [Session::dispatch], [Session::run], [Session::unbind_all] |
| Teardown   | [Session::release_buffer], [Session::release_texture], [Session::release_shader], [Session::dispose] |

Failures are [Error]s; [Error::status] flattens them into a [Status] code, and [status::decode]
turns any code into its fixed description.

# Backends

With the default `backend_wgpu` feature, [DefaultBackend] is a [wgpu](https://wgpu.rs) backend
running WGSL compute shaders.  The [SoftwareBackend] is always available: it keeps resources in
CPU memory, runs Rust closures as kernels, and counts every native object, which makes it the
backend of choice for tests.

```
use kernels_and_views::{
    BufferHandle, CompileFlags, ContextHandle, DeviceConfig, DeviceHandle, Handle, Session,
    ShaderHandle, SoftwareBackend,
};

let mut backend = SoftwareBackend::default();
backend.register_kernel("double", |invocation| {
    if let Some(values) = invocation.read_write(0) {
        for value in values {
            *value *= 2;
        }
    }
});
let mut session = Session::new(backend);
let mut device = DeviceHandle::invalid();
let mut context = ContextHandle::invalid();
session.create_device(&DeviceConfig::default(), &mut device, &mut context).unwrap();

let mut shader = ShaderHandle::invalid();
session.compile_shader(device, "", "double", "cs_5_0", CompileFlags::NONE, &mut shader).unwrap();

let mut buffer = BufferHandle::invalid();
let mut staging = BufferHandle::invalid();
session.create_read_write_buffer(device, 1, 4, Some(&[1, 2, 3, 4]), &mut buffer).unwrap();
session.create_staging_buffer(device, 1, 4, &mut staging).unwrap();

session.set_read_write_buffers(context, &[buffer]).unwrap();
session.dispatch(context, shader, [1, 1, 1]).unwrap();
session.unbind_all(context).unwrap();

let mut out = [0u8; 4];
session.read(context, staging, buffer, &mut out).unwrap();
assert_eq!(out, [2, 4, 6, 8]);
```
*/

logwise::declare_logging_domain!();

mod dispatch;
mod error;
mod factory;
pub mod handles;
mod imp;
mod kernels;
pub mod pixel_formats;
mod session;
mod shader;
pub mod status;
mod transfer;
mod view_cache;

pub use dispatch::Bindings;
pub use error::Error;
pub use factory::{BufferDesc, BufferUsage, TextureDesc};
pub use handles::{BufferHandle, ContextHandle, DeviceHandle, Handle, HandleKind, ShaderHandle, TextureHandle};
pub use imp::{Backend, DefaultBackend, MapMode, MappedRegion, Resource};
pub use kernels::{KernelCache, KernelRepository};
pub use pixel_formats::{PixelFormat, ReprC};
pub use session::{DeviceConfig, DriverType, FeatureLevel, Session};
pub use shader::{CompileFailure, CompileFlags, CompileRequest};
pub use status::{Status, decode};
pub use view_cache::ViewKind;

pub use imp::software::{
    Counts, Invocation, ObjectKind, Operation, SoftwareBackend, SoftwareBuffer, SoftwareConfig,
    SoftwareContext, SoftwareDevice, SoftwareProgram, SoftwareTexture, SoftwareView,
};

#[cfg(feature = "backend_wgpu")]
pub use imp::WgpuBackend;
