//! Error types for the TAC crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when building or reading a TAC archive tree.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] shenkit_common::Error),

    /// The index file is truncated or its records do not fit the data file.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A data or index file named by the source layout does not exist.
    #[error("missing archive file: {}", .0.display())]
    MissingDataFile(PathBuf),

    /// Logical path lookup failed.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Logical path is not of the form `source/container/entry`.
    #[error("invalid logical path: {0}")]
    InvalidPath(String),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Invalid data-file discovery pattern.
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Result type for TAC operations.
pub type Result<T> = std::result::Result<T, Error>;
