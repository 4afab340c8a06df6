//! Positional metadata for realized indices.
//!
//! Records live in an index-stable arena and are addressed by [`MetaId`]. A
//! record is created the first time an index is realized and is kept after the
//! item showing it is evicted, so realizing the index again restores the same
//! record instead of starting from a fresh estimate.

use std::fmt;

use crate::collections::map::HashMap;
use crate::window::ItemId;

/// Size and position of one logical index along the recycling axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meta {
    pub index: usize,
    pub size: f32,
    pub offset: f32,
}

impl Meta {
    pub fn new(index: usize, size: f32, offset: f32) -> Self {
        Self {
            index,
            size,
            offset,
        }
    }

    /// Offset of the far edge (`offset + size`).
    #[inline]
    pub fn end(&self) -> f32 {
        self.offset + self.size
    }
}

/// Handle to a record in a [`MetaStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaId(u32);

impl MetaId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Arena of [`Meta`] records keyed by logical index, plus the binding from
/// live item identities to records.
#[derive(Default)]
pub struct MetaStore {
    records: Vec<Meta>,
    by_index: HashMap<usize, MetaId>,
    by_item: HashMap<ItemId, MetaId>,
}

impl fmt::Debug for MetaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaStore")
            .field("records", &self.records.len())
            .field("bound_items", &self.by_item.len())
            .finish()
    }
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata currently bound to `item`.
    pub fn get(&self, item: ItemId) -> Option<&Meta> {
        self.by_item
            .get(&item)
            .map(|id| &self.records[id.0 as usize])
    }

    /// Stores `meta` for its index and binds `item` to that record.
    pub fn set(&mut self, item: ItemId, meta: Meta) -> MetaId {
        let id = self.set_by_index(meta);
        self.by_item.insert(item, id);
        id
    }

    /// Metadata cached for `index`, whether or not an item shows it.
    pub fn get_by_index(&self, index: usize) -> Option<&Meta> {
        self.by_index
            .get(&index)
            .map(|id| &self.records[id.0 as usize])
    }

    /// Writes `meta` into the record for `meta.index`, creating it on first use.
    ///
    /// Existing records are updated in place so their [`MetaId`] never changes.
    pub fn set_by_index(&mut self, meta: Meta) -> MetaId {
        if let Some(&id) = self.by_index.get(&meta.index) {
            self.records[id.0 as usize] = meta;
            return id;
        }
        let id = MetaId(self.records.len() as u32);
        self.records.push(meta);
        self.by_index.insert(meta.index, id);
        id
    }

    #[inline]
    pub fn has_index(&self, index: usize) -> bool {
        self.by_index.contains_key(&index)
    }

    pub fn id_for_index(&self, index: usize) -> Option<MetaId> {
        self.by_index.get(&index).copied()
    }

    /// Record behind a handle handed out by this store.
    #[inline]
    pub fn record(&self, id: MetaId) -> &Meta {
        &self.records[id.0 as usize]
    }

    #[inline]
    pub fn record_mut(&mut self, id: MetaId) -> &mut Meta {
        &mut self.records[id.0 as usize]
    }

    /// Moves every record by `delta` along the axis.
    pub fn shift_offsets(&mut self, delta: f32) {
        for meta in &mut self.records {
            meta.offset += delta;
        }
    }

    /// Binds `item` to an existing record.
    pub fn bind(&mut self, item: ItemId, id: MetaId) {
        self.by_item.insert(item, id);
    }

    /// Forgets the binding of an item that is about to be dropped.
    pub fn unbind(&mut self, item: ItemId) -> Option<MetaId> {
        self.by_item.remove(&item)
    }

    pub fn binding(&self, item: ItemId) -> Option<MetaId> {
        self.by_item.get(&item).copied()
    }

    /// Number of indices with cached metadata.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/meta_tests.rs"]
mod tests;
