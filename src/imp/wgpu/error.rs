// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::fmt::Display;

use crate::status::Status;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    NoSuchAdapter,
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
    BufferAsyncError(#[from] wgpu::BufferAsyncError),
    Validation(String),
    OutOfMemory(String),
    UnsupportedFormat,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoSuchAdapter => write!(f, "No such adapter"),
            Error::RequestDeviceError(e) => write!(f, "{}", e),
            Error::BufferAsyncError(e) => write!(f, "{}", e),
            Error::Validation(e) => write!(f, "{}", e),
            Error::OutOfMemory(e) => write!(f, "{}", e),
            Error::UnsupportedFormat => write!(f, "Pixel format has no wgpu equivalent"),
        }
    }
}

impl Error {
    pub(crate) fn status(&self) -> Status {
        match self {
            Error::NoSuchAdapter | Error::RequestDeviceError(_) | Error::BufferAsyncError(_) => {
                Status::Fail
            }
            Error::Validation(_) => Status::InvalidCall,
            Error::OutOfMemory(_) => Status::OutOfMemory,
            Error::UnsupportedFormat => Status::InvalidArg,
        }
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        logwise::error_sync!("wgpu: {err}", err = logwise::privacy::LogIt(&error));
        error.status()
    }
}

/// Runs `f` inside validation and out-of-memory error scopes.
pub(crate) fn scoped<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> Result<T, Error> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = test_executors::sleep_on(device.pop_error_scope());
    let out_of_memory = test_executors::sleep_on(device.pop_error_scope());
    if let Some(e) = out_of_memory {
        return Err(Error::OutOfMemory(e.to_string()));
    }
    if let Some(e) = validation {
        return Err(Error::Validation(e.to_string()));
    }
    Ok(value)
}
