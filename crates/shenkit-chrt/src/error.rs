//! Error types for character scene parsing.

use shenkit_common::FourCC;
use thiserror::Error;

/// Errors that can occur when parsing a character scene.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] shenkit_common::Error),

    /// The file does not start with `CHRS`.
    #[error("expected CHRS, found {0}")]
    InvalidMagic(FourCC),
}

/// Result type for character scene parsing.
pub type Result<T> = std::result::Result<T, Error>;
