//! Error types for model decoding.

use shenkit_common::FourCC;
use thiserror::Error;

/// Errors that can occur when decoding a model.
///
/// Only failures that leave nothing to decode (bad magic, unreadable root
/// node) are returned from [`decode_scene`](crate::decode_scene). Everything
/// else becomes a [`Diagnostic`](crate::Diagnostic) on the decoded graph.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] shenkit_common::Error),

    /// The file magic names no known model format.
    #[error("invalid model magic: {0}")]
    InvalidMagic(FourCC),

    /// A node header could not be read.
    #[error("malformed node at {offset:#x}: {reason}")]
    MalformedNode { offset: u64, reason: String },

    /// A strip or face block could not be read.
    #[error("malformed strip at {offset:#x}: {reason}")]
    MalformedStrip { offset: u64, reason: String },

    /// A mesh block tag outside the known set.
    #[error("unknown mesh block tag {tag:#010x} at {offset:#x}")]
    UnknownMeshBlockTag { offset: u64, tag: u32 },

    /// An embedded texture failed to decode.
    #[error("texture error: {0}")]
    Texture(#[from] shenkit_pvr::Error),
}

impl Error {
    pub(crate) fn node(offset: usize, reason: impl ToString) -> Self {
        Self::MalformedNode {
            offset: offset as u64,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn strip(offset: usize, reason: impl ToString) -> Self {
        Self::MalformedStrip {
            offset: offset as u64,
            reason: reason.to_string(),
        }
    }
}

/// Result type for model decoding.
pub type Result<T> = std::result::Result<T, Error>;
