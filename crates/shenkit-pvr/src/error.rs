//! Error types for texture decoding.

use shenkit_common::FourCC;
use thiserror::Error;

/// Errors that can occur when decoding a texture.
///
/// Unsupported pixel formats are not errors; they decode to a placeholder
/// [`Texture`](crate::Texture).
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] shenkit_common::Error),

    /// The chunk did not start with an expected tag.
    #[error("invalid texture magic: {0}")]
    InvalidMagic(FourCC),

    /// Dimensions that cannot be addressed by the twiddle layout.
    #[error("invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// PNG encoding error.
    #[cfg(feature = "png")]
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for texture operations.
pub type Result<T> = std::result::Result<T, Error>;
