// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Creation, release and validation of handles, counted on the software backend.

use kernels_and_views::{
    BufferHandle, CompileFlags, ContextHandle, DeviceConfig, DeviceHandle, DriverType, Error,
    FeatureLevel, Handle, HandleKind, ObjectKind, Operation, PixelFormat, Session, ShaderHandle,
    SoftwareBackend, Status, TextureHandle, ViewKind,
};

fn session() -> (Session<SoftwareBackend>, DeviceHandle, ContextHandle) {
    let mut backend = SoftwareBackend::default();
    backend.register_kernel("main", |_| {});
    let mut session = Session::new(backend);
    let mut device = DeviceHandle::invalid();
    let mut context = ContextHandle::invalid();
    session
        .create_device(&DeviceConfig::default(), &mut device, &mut context)
        .unwrap();
    (session, device, context)
}

#[test]
fn recreating_a_live_handle_releases_it_once() {
    let (mut session, device, _) = session();
    let mut buffer = BufferHandle::invalid();
    session
        .create_read_write_buffer(device, 4, 8, None, &mut buffer)
        .unwrap();
    let first = buffer;
    session
        .create_read_write_buffer(device, 4, 8, None, &mut buffer)
        .unwrap();
    assert!(!session.is_live(first));
    assert!(session.is_live(buffer));

    let backend = session.backend();
    assert_eq!(backend.counts(ObjectKind::Buffer).created, 2);
    assert_eq!(backend.counts(ObjectKind::Buffer).released, 1);
    assert_eq!(backend.counts(ObjectKind::ReadView).released, 1);
    assert_eq!(backend.counts(ObjectKind::WriteView).released, 1);
    assert_eq!(backend.double_releases(), 0);
}

#[test]
fn failed_creation_leaves_the_slot_null() {
    let (mut session, device, _) = session();
    let mut buffer = BufferHandle::invalid();
    session
        .create_read_write_buffer(device, 4, 8, None, &mut buffer)
        .unwrap();

    session
        .backend_mut()
        .fail_next(Operation::CreateWriteView, Status::OutOfMemory);
    let err = session
        .create_read_write_buffer(device, 4, 8, None, &mut buffer)
        .unwrap_err();
    assert_eq!(err.status(), Status::OutOfMemory);
    assert_eq!(buffer, BufferHandle::invalid());

    //the partly built buffer is released along with the old one
    let backend = session.backend();
    assert_eq!(backend.counts(ObjectKind::Buffer).created, 2);
    assert_eq!(backend.counts(ObjectKind::Buffer).released, 2);
    assert_eq!(backend.counts(ObjectKind::ReadView).released, 2);
    assert_eq!(backend.double_releases(), 0);
}

#[test]
fn oversized_buffers_are_out_of_memory() {
    let (mut session, device, _) = session();
    let mut buffer = BufferHandle::invalid();
    let err = session
        .create_read_write_buffer(device, u32::MAX, u32::MAX, None, &mut buffer)
        .unwrap_err();
    assert_eq!(err.status(), Status::OutOfMemory);
    assert_eq!(buffer, BufferHandle::invalid());

    let mut texture = TextureHandle::invalid();
    let err = session
        .create_input_texture(
            device,
            u32::MAX,
            u32::MAX,
            PixelFormat::R32G32B32A32Float,
            None,
            &mut texture,
        )
        .unwrap_err();
    assert_eq!(err.status(), Status::OutOfMemory);
    assert_eq!(texture, TextureHandle::invalid());
    assert_eq!(session.backend().counts(ObjectKind::Buffer).created, 0);
}

#[test]
fn failed_compile_reports_diagnostics() {
    let (mut session, device, _) = session();
    let mut shader = ShaderHandle::invalid();
    let err = session
        .compile_shader(device, "", "missing", "cs_5_0", CompileFlags::NONE, &mut shader)
        .unwrap_err();
    assert!(matches!(err, Error::Compile { ref diagnostics, .. } if diagnostics.contains("missing")));
    assert_eq!(shader, ShaderHandle::invalid());
}

#[test]
fn view_sets_follow_usage() {
    let (mut session, device, context) = session();
    let mut read_write = BufferHandle::invalid();
    let mut read = BufferHandle::invalid();
    let mut input = BufferHandle::invalid();
    let mut staging = BufferHandle::invalid();
    session
        .create_read_write_buffer(device, 4, 4, None, &mut read_write)
        .unwrap();
    session
        .create_read_buffer(device, 4, 4, None, &mut read)
        .unwrap();
    session.create_input_buffer(device, 4, 4, &mut input).unwrap();
    session
        .create_staging_buffer(device, 4, 4, &mut staging)
        .unwrap();

    session.set_read_buffers(context, &[read_write, read]).unwrap();
    session.set_read_write_buffers(context, &[read_write]).unwrap();
    for buffer in [input, staging] {
        assert!(matches!(
            session.set_read_buffers(context, &[buffer]),
            Err(Error::MissingView {
                view: ViewKind::ReadOnly
            })
        ));
    }
    for buffer in [read, input, staging] {
        let err = session.set_read_write_buffers(context, &[buffer]).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingView {
                view: ViewKind::ReadWrite
            }
        ));
        assert_eq!(err.status(), Status::Fail);
    }
    let counts = session.backend().counts(ObjectKind::ReadView);
    assert_eq!(counts.created, 2);
    assert_eq!(session.backend().counts(ObjectKind::WriteView).created, 1);
}

#[test]
fn unbind_all_reaches_the_high_water_mark() {
    let (mut session, device, context) = session();
    let mut buffers = [BufferHandle::invalid(); 4];
    for buffer in &mut buffers {
        session
            .create_read_write_buffer(device, 4, 4, None, buffer)
            .unwrap();
    }
    session.set_read_buffers(context, &buffers).unwrap();
    session.set_read_buffers(context, &buffers[..1]).unwrap();
    session.set_read_write_buffers(context, &buffers[..2]).unwrap();
    session.set_constant_buffers(context, &buffers[..3]).unwrap();
    assert_eq!(session.high_water(ViewKind::ReadOnly), 4);
    assert_eq!(session.backend().bound_count(ViewKind::ReadOnly), 4);

    session.unbind_all(context).unwrap();
    for kind in [ViewKind::ReadOnly, ViewKind::ReadWrite, ViewKind::Constant] {
        assert_eq!(session.backend().bound_count(kind), 0);
    }
}

#[test]
fn released_and_forged_handles_are_rejected() {
    let (mut session, device, context) = session();
    let mut buffer = BufferHandle::invalid();
    session
        .create_read_write_buffer(device, 4, 4, None, &mut buffer)
        .unwrap();

    let raw = buffer.to_raw();
    assert_eq!(BufferHandle::from_raw(raw), buffer);
    let forged = BufferHandle::from_raw(raw + (2 << 32));
    assert!(!session.is_live(forged));
    assert!(matches!(
        session.write(context, forged, &[0; 4]),
        Err(Error::InvalidHandle {
            kind: HandleKind::Buffer
        })
    ));

    let copy = buffer;
    session.release_buffer(&mut buffer);
    assert_eq!(buffer, BufferHandle::invalid());
    let err = session.write(context, copy, &[0; 4]).unwrap_err();
    assert_eq!(err.status(), Status::Fail);

    //releasing a stale copy does nothing
    let mut stale = copy;
    session.release_buffer(&mut stale);
    assert_eq!(session.backend().double_releases(), 0);
}

#[test]
fn null_driver_fails_to_create_a_device() {
    let mut session = Session::new(SoftwareBackend::default());
    let mut device = DeviceHandle::invalid();
    let mut context = ContextHandle::invalid();
    let config = DeviceConfig::new(DriverType::Null, FeatureLevel::Level11_0);
    let err = session
        .create_device(&config, &mut device, &mut context)
        .unwrap_err();
    assert_eq!(err.status(), Status::Fail);
    assert_eq!(device, DeviceHandle::invalid());
    assert_eq!(context, ContextHandle::invalid());
}

#[test]
fn dispose_releases_everything() {
    let (mut session, device, _) = session();
    let mut buffer = BufferHandle::invalid();
    let mut texture = TextureHandle::invalid();
    let mut shader = ShaderHandle::invalid();
    session
        .create_read_write_buffer(device, 4, 4, None, &mut buffer)
        .unwrap();
    session
        .create_input_texture(device, 2, 2, PixelFormat::R8G8B8A8Unorm, None, &mut texture)
        .unwrap();
    session
        .compile_shader(device, "", "main", "cs_5_0", CompileFlags::NONE, &mut shader)
        .unwrap();
    assert!(session.backend().live_objects() > 0);

    session.dispose();
    assert_eq!(session.backend().live_objects(), 0);
    assert_eq!(session.backend().double_releases(), 0);
    assert!(!session.is_live(buffer));
    assert!(!session.is_live(device));

    //the session can bind a new device afterwards
    let mut device = DeviceHandle::invalid();
    let mut context = ContextHandle::invalid();
    session
        .create_device(&DeviceConfig::default(), &mut device, &mut context)
        .unwrap();
    assert!(session.is_live(context));
}
