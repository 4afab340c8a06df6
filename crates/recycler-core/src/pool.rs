//! Per-variant free lists of recycled items.
//!
//! A [`Pool`] keeps evicted [`Slot`]s grouped by [`Variant`] so that an item is
//! only ever reused for a request of the same variant. Pools may be shared by
//! several engines (row and column engines of a grid); sharing is guarded by
//! variant claims rather than locks: each variant belongs to at most one
//! engine.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collections::hasher;
use crate::collections::map::HashMap;
use crate::error::{RecyclerError, Result};
use crate::window::{ItemId, Slot};

/// Partition tag for pooled reuse eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Variant(pub u64);

impl Variant {
    /// Variant used by layouts that do not classify their items.
    pub const DEFAULT: Variant = Variant(0);

    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Derives a variant from a human readable label such as `"header"`.
    pub fn named(label: &str) -> Self {
        Self(hasher::hash_one(label))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variant #{:x}", self.0)
    }
}

/// Identity of one engine instance, used to own pool variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(u64);

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

impl EngineId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine #{}", self.0)
    }
}

/// Pool shared between engines on the same thread.
pub type SharedPool<I> = Rc<RefCell<Pool<I>>>;

/// Per-variant LIFO store of inactive, reusable items.
pub struct Pool<I> {
    free: HashMap<Variant, Vec<Slot<I>>>,
    claims: HashMap<Variant, EngineId>,
    /// Maximum number of slots retained per variant. `None` keeps everything.
    max_per_variant: Option<usize>,
    len: usize,
}

impl<I> fmt::Debug for Pool<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("variants", &self.free.len())
            .field("len", &self.len)
            .field("claims", &self.claims)
            .field("max_per_variant", &self.max_per_variant)
            .finish()
    }
}

impl<I> Default for Pool<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Pool<I> {
    pub fn new() -> Self {
        Self {
            free: HashMap::default(),
            claims: HashMap::default(),
            max_per_variant: None,
            len: 0,
        }
    }

    /// Creates a pool that retains at most `max` slots per variant.
    pub fn with_max_per_variant(max: usize) -> Self {
        Self {
            max_per_variant: Some(max),
            ..Self::new()
        }
    }

    /// Wraps a new unbounded pool for sharing between engines.
    pub fn shared() -> SharedPool<I> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Stores `slot` for later reuse.
    ///
    /// Returns the slot back when the variant is already at capacity; the
    /// caller is expected to drop it.
    pub fn push(&mut self, variant: Variant, slot: Slot<I>) -> Option<Slot<I>> {
        debug_assert_eq!(
            slot.variant(),
            variant,
            "slot pushed under a variant it was not created for"
        );
        let stack = self.free.entry(variant).or_default();
        if self.max_per_variant.is_some_and(|max| stack.len() >= max) {
            return Some(slot);
        }
        stack.push(slot);
        self.len += 1;
        None
    }

    /// Removes the most recently pushed slot of `variant`.
    pub fn pop(&mut self, variant: Variant) -> Option<Slot<I>> {
        let slot = self.free.get_mut(&variant)?.pop()?;
        self.len -= 1;
        Some(slot)
    }

    /// Total number of pooled slots across all variants.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of pooled slots of one variant.
    pub fn len_of(&self, variant: Variant) -> usize {
        self.free.get(&variant).map_or(0, Vec::len)
    }

    /// Returns whether a slot with this identity is currently pooled.
    pub fn contains(&self, id: ItemId) -> bool {
        self.free
            .values()
            .any(|stack| stack.iter().any(|slot| slot.id() == id))
    }

    /// Records that `engine` owns `variant`.
    ///
    /// Claiming a variant the engine already owns is a no-op.
    pub fn claim(&mut self, variant: Variant, engine: EngineId) -> Result<()> {
        match self.claims.get(&variant) {
            Some(&owner) if owner != engine => {
                Err(RecyclerError::VariantConflict { variant, owner })
            }
            Some(_) => Ok(()),
            None => {
                self.claims.insert(variant, engine);
                Ok(())
            }
        }
    }

    pub fn owner_of(&self, variant: Variant) -> Option<EngineId> {
        self.claims.get(&variant).copied()
    }

    /// Drops every claim held by `engine`.
    ///
    /// Slots of released variants stay pooled and become available to the
    /// next engine that claims the variant.
    pub fn release(&mut self, engine: EngineId) {
        self.claims.retain(|_, owner| *owner != engine);
    }

    /// Removes every pooled slot, returning them in unspecified order.
    pub fn drain(&mut self) -> Vec<Slot<I>> {
        self.len = 0;
        self.free.drain().flat_map(|(_, stack)| stack).collect()
    }
}

#[cfg(test)]
#[path = "tests/pool_tests.rs"]
mod tests;
