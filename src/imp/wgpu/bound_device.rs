// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wgpu::{Limits, Trace};

use super::Error;
use crate::session::{DeviceConfig, DriverType, FeatureLevel};

/// A device together with its queue.
#[derive(Debug)]
pub struct BoundDevice {
    pub(super) id: u64,
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
}

/// The immediate context.  Shares the device's queue.
#[derive(Debug)]
pub struct BoundContext {
    pub(super) id: u64,
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
}

fn adapter_options(driver_type: DriverType) -> Result<wgpu::RequestAdapterOptions<'static, 'static>, Error> {
    let (power_preference, force_fallback_adapter) = match driver_type {
        DriverType::Hardware => (wgpu::PowerPreference::HighPerformance, false),
        DriverType::Unknown => (wgpu::PowerPreference::default(), false),
        DriverType::Software | DriverType::Warp | DriverType::Reference => {
            (wgpu::PowerPreference::default(), true)
        }
        DriverType::Null => return Err(Error::NoSuchAdapter),
    };
    Ok(wgpu::RequestAdapterOptions {
        power_preference,
        force_fallback_adapter,
        compatible_surface: None,
    })
}

fn limits(feature_level: FeatureLevel) -> Limits {
    match feature_level {
        FeatureLevel::Level11_0 => Limits::default(),
        //compute needs storage buffers, which the webgl2 limits don't have
        _ => Limits::downlevel_defaults(),
    }
}

pub(super) fn bind(
    instance: &wgpu::Instance,
    config: &DeviceConfig,
    device_id: u64,
    context_id: u64,
) -> Result<(BoundDevice, BoundContext), Error> {
    let options = adapter_options(config.driver_type)?;
    let interval = logwise::perfwarn_begin!("kernels_and_views request device");
    let adapter = test_executors::sleep_on(instance.request_adapter(&options))
        .map_err(|_| Error::NoSuchAdapter)?;
    let descriptor = wgpu::DeviceDescriptor {
        label: Some(&config.debug_name),
        required_features: wgpu::Features::empty(),
        required_limits: limits(config.feature_level).using_resolution(adapter.limits()),
        memory_hints: Default::default(),
        trace: Trace::Off,
    };
    let (device, queue) = test_executors::sleep_on(adapter.request_device(&descriptor))?;
    drop(interval);
    //errors outside an error scope would otherwise panic
    device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
        logwise::error_sync!(
            "uncaptured wgpu error: {error}",
            error = logwise::privacy::LogIt(&error)
        );
    }));
    logwise::info_sync!(
        "bound wgpu adapter {name}",
        name = logwise::privacy::LogIt(&adapter.get_info().name)
    );
    Ok((
        BoundDevice {
            id: device_id,
            device: device.clone(),
            queue: queue.clone(),
        },
        BoundContext {
            id: context_id,
            device,
            queue,
        },
    ))
}
