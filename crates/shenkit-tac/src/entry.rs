//! Archive entries.

use std::fmt;

use shenkit_common::FourCC;

use crate::kind::FileKind;

/// Handle to an [`Entry`] in a resolver's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u32);

impl EntryId {
    /// Arena slot of this entry.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One addressable unit of the virtual archive filesystem.
///
/// `offset` and `length` locate the raw bytes inside the immediate container:
/// the data file for top-level entries, the parent's *decompressed* content
/// for children.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Logical path, `source/container/HASH[_child[N]]`.
    pub path: String,
    /// Display name: the magic for top-level entries, `name.ext` for children.
    pub name: String,
    /// Index of the owning archive in the resolver.
    pub archive: usize,
    /// Owning container entry.
    pub parent: Option<EntryId>,
    /// Entries contained in this one, in directory order.
    pub children: Vec<EntryId>,
    /// Raw offset in the immediate container.
    pub offset: u64,
    /// Raw length in the immediate container.
    pub length: u64,
    /// Whether the raw bytes are a gzip member.
    pub compressed: bool,
    /// Content length; the gzip ISIZE footer for compressed entries.
    pub content_length: u64,
    /// First four bytes of the (decompressed) content.
    pub magic: FourCC,
    /// Type tag: the magic text, or the directory extension when the magic
    /// was not recognised.
    pub type_tag: String,
    /// Classified kind, if any table row matched.
    pub kind: Option<FileKind>,
}

impl Entry {
    /// Whether this entry is a top-level record of its data file.
    #[inline]
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether this entry is a container that was expanded.
    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Last path segment (`HASH` or `HASH_child`).
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Child name without the extension, as used in directory records.
    pub fn stem(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }
}
