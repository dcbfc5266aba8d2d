//! Common utilities for shenkit.
//!
//! This crate provides the foundational reading types shared by the archive
//! layer and every decoder:
//!
//! - [`BinaryReader`] - Little-endian cursor over a byte slice
//! - [`ByteSource`] - Owned, bounded, independently seekable view over a file
//!   mapping or a decompressed buffer
//! - [`FourCC`] - Four-character tags used by every container format

mod error;
mod fourcc;
mod reader;
mod source;

pub use error::{Error, Result};
pub use fourcc::FourCC;
pub use reader::BinaryReader;
pub use source::{ByteSource, SharedBytes};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Re-export memchr for NUL scanning
pub use memchr;
