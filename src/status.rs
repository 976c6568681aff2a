// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Backend status codes and their human-readable descriptions.

Every operation in this crate ultimately reports a [Status].  Backends produce one when a native
call fails, and [crate::Error::status] folds the crate's own validation failures into the same
space so that a flat caller only ever has to deal with a single integer.

The numeric values are the HRESULT codes the original DirectCompute boundary used, so that a
caller which already logs or compares those values keeps working.

```
use kernels_and_views::status::{decode, Status};

assert_eq!(Status::FileNotFound.code(), 0x887C0002u32 as i32);
assert_eq!(decode(Status::FileNotFound.code()), "D3D11_ERROR_FILE_NOT_FOUND - The file was not found.");
assert_eq!(decode(0x1234), "Unknown error code.");
```
*/

use std::fmt::{Display, Formatter};

/// A backend status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    False,
    FileNotFound,
    TooManyUniqueStateObjects,
    TooManyUniqueViewObjects,
    DeferredContextMapWithoutInitialDiscard,
    InvalidCall,
    WasStillDrawing,
    Fail,
    InvalidArg,
    OutOfMemory,
    /// A code outside the closed table.  Keeps the raw value.
    Unknown(i32),
}

const S_OK: i32 = 0;
const S_FALSE: i32 = 1;
const FILE_NOT_FOUND: i32 = 0x887C0002u32 as i32;
const TOO_MANY_UNIQUE_STATE_OBJECTS: i32 = 0x887C0001u32 as i32;
const TOO_MANY_UNIQUE_VIEW_OBJECTS: i32 = 0x887C0003u32 as i32;
const DEFERRED_CONTEXT_MAP_WITHOUT_INITIAL_DISCARD: i32 = 0x887C0004u32 as i32;
const INVALID_CALL: i32 = 0x887A0001u32 as i32;
const WAS_STILL_DRAWING: i32 = 0x887A000Au32 as i32;
const E_FAIL: i32 = 0x80004005u32 as i32;
const E_INVALIDARG: i32 = 0x80070057u32 as i32;
const E_OUTOFMEMORY: i32 = 0x8007000Eu32 as i32;

impl Status {
    /// Interprets a raw code.  Codes outside the table become [Status::Unknown].
    pub const fn from_code(code: i32) -> Self {
        match code {
            S_OK => Status::Ok,
            S_FALSE => Status::False,
            FILE_NOT_FOUND => Status::FileNotFound,
            TOO_MANY_UNIQUE_STATE_OBJECTS => Status::TooManyUniqueStateObjects,
            TOO_MANY_UNIQUE_VIEW_OBJECTS => Status::TooManyUniqueViewObjects,
            DEFERRED_CONTEXT_MAP_WITHOUT_INITIAL_DISCARD => {
                Status::DeferredContextMapWithoutInitialDiscard
            }
            INVALID_CALL => Status::InvalidCall,
            WAS_STILL_DRAWING => Status::WasStillDrawing,
            E_FAIL => Status::Fail,
            E_INVALIDARG => Status::InvalidArg,
            E_OUTOFMEMORY => Status::OutOfMemory,
            other => Status::Unknown(other),
        }
    }

    /// The raw code for this status.
    pub const fn code(self) -> i32 {
        match self {
            Status::Ok => S_OK,
            Status::False => S_FALSE,
            Status::FileNotFound => FILE_NOT_FOUND,
            Status::TooManyUniqueStateObjects => TOO_MANY_UNIQUE_STATE_OBJECTS,
            Status::TooManyUniqueViewObjects => TOO_MANY_UNIQUE_VIEW_OBJECTS,
            Status::DeferredContextMapWithoutInitialDiscard => {
                DEFERRED_CONTEXT_MAP_WITHOUT_INITIAL_DISCARD
            }
            Status::InvalidCall => INVALID_CALL,
            Status::WasStillDrawing => WAS_STILL_DRAWING,
            Status::Fail => E_FAIL,
            Status::InvalidArg => E_INVALIDARG,
            Status::OutOfMemory => E_OUTOFMEMORY,
            Status::Unknown(code) => code,
        }
    }

    /// Failure codes have the sign bit set.
    pub const fn is_failure(self) -> bool {
        self.code() < 0
    }

    /// The fixed description for this status.
    pub const fn description(self) -> &'static str {
        match self {
            Status::Unknown(_) => ERROR_TEXT[0],
            Status::FileNotFound => ERROR_TEXT[1],
            Status::TooManyUniqueStateObjects => ERROR_TEXT[2],
            Status::TooManyUniqueViewObjects => ERROR_TEXT[3],
            Status::DeferredContextMapWithoutInitialDiscard => ERROR_TEXT[4],
            Status::InvalidCall => ERROR_TEXT[5],
            Status::WasStillDrawing => ERROR_TEXT[6],
            Status::Fail => ERROR_TEXT[7],
            Status::InvalidArg => ERROR_TEXT[8],
            Status::OutOfMemory => ERROR_TEXT[9],
            Status::False => ERROR_TEXT[10],
            Status::Ok => ERROR_TEXT[11],
        }
    }
}

const ERROR_TEXT: [&str; 12] = [
    "Unknown error code.",
    "D3D11_ERROR_FILE_NOT_FOUND - The file was not found.",
    "D3D11_ERROR_TOO_MANY_UNIQUE_STATE_OBJECTS - There are too many unique instances of a particular type of state object.",
    "D3D11_ERROR_TOO_MANY_UNIQUE_VIEW_OBJECTS - There are too many unique instance of a particular type of view object.",
    "D3D11_ERROR_DEFERRED_CONTEXT_MAP_WITHOUT_INITIAL_DISCARD - The first call to ID3D11DeviceContext::Map after either ID3D11Device::CreateDeferredContext or ID3D11DeviceContext::FinishCommandList per Resource was not D3D11_MAP_WRITE_DISCARD.",
    "D3DERR_INVALIDCALL - The method call is invalid. For example, a method's parameter may not be a valid pointer.",
    "D3DERR_WASSTILLDRAWING - The previous blit operation that is transferring information to or from this surface is incomplete.",
    "E_FAIL - An undetermined error occurred.",
    "E_INVALIDARG - An invalid parameter was passed to the returning function.",
    "E_OUTOFMEMORY - Could not allocate sufficient memory to complete the call.",
    "S_FALSE - Alternate success value, indicating a successful but nonstandard completion (the precise meaning depends on context).",
    "S_OK - No error occurred.",
];

/// Decodes a raw status code into its fixed description.
///
/// Unrecognised codes decode to `"Unknown error code."`.
pub const fn decode(code: i32) -> &'static str {
    Status::from_code(code).description()
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}: {}", self.code() as u32, self.description())
    }
}
