//! Texture-name index.
//!
//! Models and texture sets are separate containers joined only by naming
//! convention: a model's external texture reference is a synthetic name
//! (tag + number) registered by some pack's texture table.

use rustc_hash::FxHashMap;

use crate::entry::EntryId;

/// A texture registered by a pack's texture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureNameEntry {
    /// Pack entry owning the texture table.
    pub entry: EntryId,
    /// Offset of the texture node inside that entry's content.
    pub offset: u64,
}

/// Where to look first when resolving a texture name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureScope {
    /// No override: the most recent registration wins.
    #[default]
    Global,
    /// Prefer textures registered by this entry or anything below it,
    /// falling back to [`TextureScope::Global`].
    Container(EntryId),
}

/// Every registration per name, in registration order.
#[derive(Debug, Default)]
pub struct TextureIndex {
    by_name: FxHashMap<String, Vec<TextureNameEntry>>,
}

impl TextureIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` as living at `offset` inside `entry`.
    pub fn register(&mut self, name: impl Into<String>, entry: EntryId, offset: u64) {
        self.by_name
            .entry(name.into())
            .or_default()
            .push(TextureNameEntry { entry, offset });
    }

    /// Look up `name` under `scope`.
    ///
    /// `within(candidate, container)` decides whether a registration's entry
    /// sits inside a scoped container.
    pub fn lookup(
        &self,
        name: &str,
        scope: TextureScope,
        within: impl Fn(EntryId, EntryId) -> bool,
    ) -> Option<TextureNameEntry> {
        let registrations = self.by_name.get(name)?;
        if let TextureScope::Container(container) = scope {
            if let Some(found) = registrations.iter().rev().find(|t| within(t.entry, container)) {
                return Some(*found);
            }
        }
        registrations.last().copied()
    }

    /// All registrations of `name`, oldest first.
    pub fn registrations(&self, name: &str) -> &[TextureNameEntry] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no texture was registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registered names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_prefers_container_then_falls_back() {
        let mut index = TextureIndex::new();
        index.register("ab0112", EntryId(1), 24);
        index.register("ab0112", EntryId(5), 40);
        index.register("cd027", EntryId(1), 64);

        let same = |a: EntryId, b: EntryId| a == b;

        // Global: last registration wins.
        let found = index.lookup("ab0112", TextureScope::default(), same).unwrap();
        assert_eq!(found.entry, EntryId(5));

        // Scoped: the container's own registration wins.
        let found = index.lookup("ab0112", TextureScope::Container(EntryId(1)), same).unwrap();
        assert_eq!((found.entry, found.offset), (EntryId(1), 24));

        // Scoped but absent from the container: global fallback.
        let found = index.lookup("cd027", TextureScope::Container(EntryId(9)), same).unwrap();
        assert_eq!(found.entry, EntryId(1));

        assert!(index.lookup("zz000", TextureScope::Global, same).is_none());
        assert_eq!(index.registrations("ab0112").len(), 2);
        assert_eq!(index.len(), 2);
    }
}
