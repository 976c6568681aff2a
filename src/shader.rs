// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shader compilation inputs.
*/

use std::ops::{BitOr, BitOrAssign};
use std::path::Path;

use crate::Error;
use crate::status::Status;

/// Compiler flag bits.
///
/// The values are the classic HLSL compiler bits.  Backends honor the ones
/// they have an equivalent for and ignore the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompileFlags(u32);

impl CompileFlags {
    pub const NONE: CompileFlags = CompileFlags(0);
    pub const DEBUG: CompileFlags = CompileFlags(1 << 0);
    pub const SKIP_VALIDATION: CompileFlags = CompileFlags(1 << 1);
    pub const SKIP_OPTIMIZATION: CompileFlags = CompileFlags(1 << 2);
    pub const PACK_MATRIX_ROW_MAJOR: CompileFlags = CompileFlags(1 << 3);
    pub const PACK_MATRIX_COLUMN_MAJOR: CompileFlags = CompileFlags(1 << 4);
    pub const PARTIAL_PRECISION: CompileFlags = CompileFlags(1 << 5);
    pub const AVOID_FLOW_CONTROL: CompileFlags = CompileFlags(1 << 9);
    pub const PREFER_FLOW_CONTROL: CompileFlags = CompileFlags(1 << 10);
    pub const ENABLE_STRICTNESS: CompileFlags = CompileFlags(1 << 11);
    pub const ENABLE_BACKWARDS_COMPATIBILITY: CompileFlags = CompileFlags(1 << 12);
    pub const IEEE_STRICTNESS: CompileFlags = CompileFlags(1 << 13);
    pub const OPTIMIZATION_LEVEL0: CompileFlags = CompileFlags(1 << 14);
    /// The default level, with no bits set.
    pub const OPTIMIZATION_LEVEL1: CompileFlags = CompileFlags(0);
    pub const OPTIMIZATION_LEVEL2: CompileFlags = CompileFlags((1 << 14) | (1 << 15));
    pub const OPTIMIZATION_LEVEL3: CompileFlags = CompileFlags(1 << 15);
    pub const WARNINGS_ARE_ERRORS: CompileFlags = CompileFlags(1 << 18);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        CompileFlags(bits)
    }

    pub const fn contains(self, other: CompileFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CompileFlags {
    type Output = CompileFlags;
    fn bitor(self, rhs: Self) -> Self::Output {
        CompileFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for CompileFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Everything a backend needs to build a compute program.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub source: &'a str,
    pub entry_point: &'a str,
    /// Target profile, e.g. `cs_5_0`.
    pub profile: &'a str,
    pub flags: CompileFlags,
    /// Used to label the program and its diagnostics.
    pub debug_name: &'a str,
}

/// A compilation failure reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    pub status: Status,
    pub diagnostics: String,
}

impl From<CompileFailure> for Error {
    fn from(failure: CompileFailure) -> Self {
        Error::Compile {
            status: failure.status,
            diagnostics: failure.diagnostics,
        }
    }
}

/// Reads shader source text from disk.
///
/// A file that can't be opened or read reports [Status::FileNotFound].
pub(crate) fn read_source(path: &Path) -> Result<String, Error> {
    let bytes = test_executors::sleep_on(async {
        let file = async_file::File::open(path, async_file::Priority::unit_test()).await?;
        file.read_all(async_file::Priority::unit_test()).await
    })
    .map_err(|e| {
        logwise::warn_sync!(
            "can't read shader {path}: {err}",
            path = logwise::privacy::LogIt(path),
            err = logwise::privacy::LogIt(&e)
        );
        Error::Backend(Status::FileNotFound)
    })?;
    std::str::from_utf8(&bytes)
        .map(str::to_owned)
        .map_err(|_| Error::InvalidArgument("shader source is not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimization_levels() {
        assert_eq!(CompileFlags::OPTIMIZATION_LEVEL2.bits(), 0xC000);
        assert!(CompileFlags::OPTIMIZATION_LEVEL2.contains(CompileFlags::OPTIMIZATION_LEVEL3));
        let mut flags = CompileFlags::DEBUG;
        flags |= CompileFlags::WARNINGS_ARE_ERRORS;
        assert_eq!(flags.bits(), 1 | (1 << 18));
        assert_eq!(flags, CompileFlags::DEBUG | CompileFlags::WARNINGS_ARE_ERRORS);
    }

    #[test]
    fn missing_file_reports_file_not_found() {
        let err = read_source(Path::new("/definitely/not/here.hlsl")).unwrap_err();
        assert_eq!(err.status(), Status::FileNotFound);
    }
}
