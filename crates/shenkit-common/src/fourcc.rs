//! Four-character block tags.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Four-character code identifying a container, chunk or block.
///
/// Tags are compared as raw bytes; they are not guaranteed to be printable
/// ASCII (gzip headers and NUL-terminated sentinels show up in the same
/// position).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Build a tag from the first four bytes of a slice, padding with NUL.
    pub fn from_prefix(bytes: &[u8]) -> Self {
        let mut tag = [0u8; 4];
        let n = bytes.len().min(4);
        tag[..n].copy_from_slice(&bytes[..n]);
        Self(tag)
    }

    /// Raw bytes of the tag.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Whether the tag starts with the given byte prefix.
    #[inline]
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Lossy text form with trailing NULs removed and non-printable bytes
    /// replaced by `.`.
    pub fn to_text(&self) -> String {
        let end = self.0.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        self.0[..end]
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect()
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({:?})", self.to_text())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}
