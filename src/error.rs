// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::handles::HandleKind;
use crate::status::Status;
use crate::view_cache::ViewKind;

/// Errors returned by [crate::Session] operations.
///
/// Handle and argument failures are detected before the backend is touched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A handle was null, stale, or of the wrong kind for this session.
    #[error("invalid {kind} handle")]
    InvalidHandle { kind: HandleKind },
    /// A live buffer was passed where it has no view of the requested kind.
    #[error("buffer has no {view} view")]
    MissingView { view: ViewKind },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The backend rejected the call.
    #[error("backend failure {0}")]
    Backend(Status),
    #[error("shader compilation failed with {status}:\n{diagnostics}")]
    Compile { status: Status, diagnostics: String },
}

impl Error {
    /// The status code for this error, for callers that only speak status codes.
    pub fn status(&self) -> Status {
        match self {
            Error::InvalidHandle { .. } | Error::MissingView { .. } => Status::Fail,
            Error::InvalidArgument(_) => Status::InvalidArg,
            Error::Backend(status) => *status,
            Error::Compile { status, .. } => *status,
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Backend(status)
    }
}
