//! Errors raised while reading binary data.

use thiserror::Error;

use crate::FourCC;

/// Common error type for shenkit operations.
///
/// Variants raised by [`BinaryReader`](crate::BinaryReader) carry the
/// absolute offset they failed at.
#[derive(Debug, Error)]
pub enum Error {
    /// A read ran past the end of the buffer.
    #[error("read of {needed} bytes at {offset:#x} runs past the end ({available} left)")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A block tag did not match.
    #[error("bad tag at {offset:#x}: expected {expected}, found {found}")]
    InvalidMagic {
        offset: usize,
        expected: FourCC,
        found: FourCC,
    },

    /// A seek or sub-range fell outside the addressable region.
    #[error("range {offset}..{end} out of bounds (length {len})")]
    OutOfBounds { offset: usize, end: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A NUL-terminated string was not valid UTF-8.
    #[error("string at {offset:#x} is not UTF-8: {source}")]
    Utf8 {
        offset: usize,
        source: std::str::Utf8Error,
    },

    #[error("string at {offset:#x} has no NUL terminator")]
    MissingNullTerminator { offset: usize },
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
