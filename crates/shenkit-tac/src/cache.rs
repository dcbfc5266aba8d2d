//! Memoised inflated payloads.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use shenkit_common::SharedBytes;

use crate::entry::EntryId;

/// Cache of fully inflated entry contents, keyed by entry.
///
/// The only shared mutable state in the archive layer. Two callers may race
/// to inflate the same entry; both produce identical bytes and the first
/// insert is kept, so the race only costs redundant work.
#[derive(Default)]
pub struct InflateCache {
    slots: RwLock<FxHashMap<EntryId, SharedBytes>>,
}

impl InflateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached content of `id`, if present.
    pub fn get(&self, id: EntryId) -> Option<SharedBytes> {
        self.slots.read().get(&id).map(Arc::clone)
    }

    /// Store `bytes` for `id` and return the cached value.
    ///
    /// If another caller populated the slot first, its value is returned and
    /// `bytes` is dropped.
    pub fn insert(&self, id: EntryId, bytes: SharedBytes) -> SharedBytes {
        Arc::clone(self.slots.write().entry(id).or_insert(bytes))
    }

    /// Cached content of `id`, computing it with `inflate` on a miss.
    ///
    /// `inflate` runs without the lock held.
    pub fn get_or_try_insert_with<E>(
        &self,
        id: EntryId,
        inflate: impl FnOnce() -> Result<Vec<u8>, E>,
    ) -> Result<SharedBytes, E> {
        if let Some(bytes) = self.get(id) {
            return Ok(bytes);
        }
        let bytes: SharedBytes = Arc::new(inflate()?);
        Ok(self.insert(id, bytes))
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Total cached bytes.
    pub fn total_bytes(&self) -> usize {
        self.slots.read().values().map(|b| (**b).as_ref().len()).sum()
    }

    /// Drop every cached payload.
    pub fn clear(&self) {
        self.slots.write().clear();
    }
}
