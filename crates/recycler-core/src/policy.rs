//! Policy interface every layout adapter implements.

use crate::error::{RecyclerError, Result};
use crate::meta::Meta;
use crate::pool::Variant;
use crate::window::Direction;

/// Read-only summary of the window handed to fullness queries.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowExtent {
    /// Metadata of the first realized item.
    pub first: Option<Meta>,
    /// Metadata of the last realized item.
    pub last: Option<Meta>,
    /// Number of realized items.
    pub len: usize,
    /// Running average of measured sizes (or the configured default).
    pub average_size: f32,
}

impl WindowExtent {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Leading edge of the realized content along the axis.
    pub fn start(&self) -> Option<f32> {
        self.first.map(|meta| meta.offset)
    }

    /// Trailing edge of the realized content along the axis.
    pub fn end(&self) -> Option<f32> {
        self.last.map(|meta| meta.end())
    }

    /// Whether the window already reaches the first logical index.
    pub fn at_first_index(&self) -> bool {
        self.first.is_some_and(|meta| meta.index == 0)
    }

    /// Whether the window already reaches the last of `size` indices.
    pub fn at_last_index(&self, size: usize) -> bool {
        self.last.is_some_and(|meta| meta.index + 1 >= size)
    }
}

/// Where an empty window starts filling from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Anchor {
    pub index: usize,
    /// Offset of the anchor item. `None` reuses the cached offset for the
    /// index, or `index * average_size` when nothing is cached.
    pub offset: Option<f32>,
}

impl Anchor {
    pub fn at(index: usize) -> Self {
        Self {
            index,
            offset: None,
        }
    }

    pub fn with_offset(index: usize, offset: f32) -> Self {
        Self {
            index,
            offset: Some(offset),
        }
    }
}

/// Sizing, classification and fullness decisions for one recycling axis.
///
/// The engine never assumes a coordinate system: it only relies on sizes and
/// offsets composing additively along one axis. Implementations hold no
/// engine state; they see the window through [`WindowExtent`] and [`Meta`].
///
/// `measure`, `position` and `allocate` have default bodies that fail with
/// [`RecyclerError::Unimplemented`], which surfaces an adapter that forgot to
/// provide them the first time the engine needs them.
pub trait RecyclePolicy {
    type Item;

    /// Total number of logical items.
    fn size(&self) -> usize;

    /// Reuse partition for `index`.
    fn variant_for(&self, index: usize) -> Variant {
        let _ = index;
        Variant::DEFAULT
    }

    /// Whether a realized item lies outside the retention threshold.
    fn should_recycle(&self, item: &Self::Item, meta: &Meta) -> bool;

    /// Whether the visible region is covered toward `direction`.
    fn is_client_full(&self, direction: Direction, extent: &WindowExtent) -> bool;

    /// Whether the prefetch buffer beyond the visible region is covered toward
    /// `direction`.
    fn has_enough_content(&self, direction: Direction, extent: &WindowExtent) -> bool;

    /// Binds `item` to `index` and returns its size along the axis.
    fn measure(&mut self, index: usize, item: &mut Self::Item) -> Result<f32> {
        let _ = (index, item);
        Err(RecyclerError::unimplemented("measure"))
    }

    /// Applies the position side effects for an already measured item.
    fn position(&mut self, item: &mut Self::Item, meta: &Meta) -> Result<()> {
        let _ = (item, meta);
        Err(RecyclerError::unimplemented("position"))
    }

    /// Creates a new item of `variant`. `Ok(None)` declines the allocation,
    /// which ends the current batch without an error.
    fn allocate(&mut self, variant: Variant) -> Result<Option<Self::Item>> {
        let _ = variant;
        Err(RecyclerError::unimplemented("allocate"))
    }

    /// Hides an item before it is parked in the pool.
    fn detach(&mut self, item: &mut Self::Item) {
        let _ = item;
    }

    /// Starting point for an empty window.
    fn anchor(&self, average_size: f32) -> Anchor {
        let _ = average_size;
        Anchor::default()
    }

    /// Every recorded offset moved by `delta` so that index 0 starts at zero.
    /// Scroll positions the policy keeps in the same coordinates should move
    /// with them.
    fn rebase(&mut self, delta: f32) {
        let _ = delta;
    }
}
