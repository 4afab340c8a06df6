//! The contiguous run of realized items.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::meta::{MetaId, MetaStore};
use crate::pool::Variant;

/// Stable identity of a realized item.
///
/// Assigned once when the policy allocates the item and kept while the item
/// moves between window and pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

impl ItemId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Edge of the window a fill pass grows toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward lower logical indices.
    Start,
    /// Toward higher logical indices.
    End,
}

impl Direction {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Start => Direction::End,
            Direction::End => Direction::Start,
        }
    }
}

/// An item together with the handles the engine keeps beside it.
pub struct Slot<I> {
    id: ItemId,
    variant: Variant,
    meta: MetaId,
    item: I,
}

impl<I> Slot<I> {
    pub(crate) fn new(id: ItemId, variant: Variant, meta: MetaId, item: I) -> Self {
        Self {
            id,
            variant,
            meta,
            item,
        }
    }

    #[inline]
    pub fn id(&self) -> ItemId {
        self.id
    }

    #[inline]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Metadata record this item was last bound to.
    #[inline]
    pub fn meta_id(&self) -> MetaId {
        self.meta
    }

    pub(crate) fn rebind(&mut self, meta: MetaId) {
        self.meta = meta;
    }

    #[inline]
    pub fn item(&self) -> &I {
        &self.item
    }

    #[inline]
    pub fn item_mut(&mut self) -> &mut I {
        &mut self.item
    }

    pub fn into_item(self) -> I {
        self.item
    }
}

impl<I> fmt::Debug for Slot<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("variant", &self.variant)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Ordered slots whose logical indices increase by exactly one from front to
/// back.
///
/// The window only stores slots; indices live in the [`MetaStore`] and the
/// engine is responsible for pushing the right index at the right edge.
pub struct Window<I> {
    slots: VecDeque<Slot<I>>,
}

impl<I> Default for Window<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> fmt::Debug for Window<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots.iter()).finish()
    }
}

impl<I> Window<I> {
    pub fn new() -> Self {
        Self {
            slots: VecDeque::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn first(&self) -> Option<&Slot<I>> {
        self.slots.front()
    }

    pub fn last(&self) -> Option<&Slot<I>> {
        self.slots.back()
    }

    /// Slot at the given edge.
    pub fn edge(&self, direction: Direction) -> Option<&Slot<I>> {
        match direction {
            Direction::Start => self.slots.front(),
            Direction::End => self.slots.back(),
        }
    }

    /// Appends (`End`) or prepends (`Start`) a slot.
    pub fn push(&mut self, direction: Direction, slot: Slot<I>) {
        match direction {
            Direction::Start => self.slots.push_front(slot),
            Direction::End => self.slots.push_back(slot),
        }
    }

    /// Removes the slot at the given edge.
    pub fn pop(&mut self, direction: Direction) -> Option<Slot<I>> {
        match direction {
            Direction::Start => self.slots.pop_front(),
            Direction::End => self.slots.pop_back(),
        }
    }

    /// Removes the slot at `direction` if `predicate` accepts it.
    pub fn pop_if(
        &mut self,
        direction: Direction,
        predicate: impl FnOnce(&Slot<I>) -> bool,
    ) -> Option<Slot<I>> {
        if predicate(self.edge(direction)?) {
            self.pop(direction)
        } else {
            None
        }
    }

    pub fn get(&self, position: usize) -> Option<&Slot<I>> {
        self.slots.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Slot<I>> {
        self.slots.get_mut(position)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Slot<I>> + '_ {
        self.slots.iter()
    }

    /// Logical indices of the window, front to back.
    pub fn indices<'a>(&'a self, metas: &'a MetaStore) -> impl Iterator<Item = usize> + 'a {
        self.slots
            .iter()
            .map(move |slot| metas.record(slot.meta_id()).index)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.slots.iter().any(|slot| slot.id() == id)
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Slot<I>> + '_ {
        self.slots.drain(..)
    }
}

#[cfg(test)]
#[path = "tests/window_tests.rs"]
mod tests;
