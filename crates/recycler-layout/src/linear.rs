//! Single-axis adapters: vertical lists and horizontal strips.
//!
//! [`LinearLayout`] is the [`RecyclePolicy`] shared by both orientations. It
//! folds item spacing into measured sizes, keeps items within the viewport
//! plus a retention margin, and prefetches a buffer of
//! [`PrefetchStrategy::prefetch_count`] items past the visible edge.
//! [`ListView`] owns the engine and exposes the scroll-facing API.

use std::cell::Cell;
use std::ops::Range;
use std::rc::Rc;

use recycler_core::{
    Anchor, Direction, HostScheduler, Meta, RecycleJob, RecyclePolicy, Recycler, Result,
    Variant, WindowExtent, DEFAULT_ITEM_SIZE_ESTIMATE,
};

use crate::prefetch::PrefetchStrategy;
use crate::viewport::{Viewport, ViewportHandler};

/// Orientation of a recycling axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// Host-side views a linear layout recycles.
pub trait ViewFactory {
    type View;

    /// Number of items in the backing data set.
    fn count(&self) -> usize;

    /// Reuse partition for `index`. Views are only rebound across indices
    /// of the same variant.
    fn variant_for(&self, index: usize) -> Variant {
        let _ = index;
        Variant::DEFAULT
    }

    /// Creates a view for `variant`, or `None` when the host cannot provide
    /// one right now.
    fn create(&mut self, variant: Variant) -> Option<Self::View>;

    /// Binds `view` to the data at `index` and returns its main-axis size.
    fn bind(&mut self, view: &mut Self::View, index: usize) -> f32;

    /// Moves `view` to `offset` along `axis`.
    fn place(&mut self, view: &mut Self::View, axis: Axis, offset: f32, size: f32);

    /// Hides a view that is leaving the window.
    fn detach(&mut self, view: &mut Self::View) {
        let _ = view;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinearLayoutConfig {
    /// Gap between consecutive items.
    pub spacing: f32,
    /// Extra distance past each viewport edge before an item is recycled.
    pub retention_margin: f32,
    pub prefetch: PrefetchStrategy,
}

impl Default for LinearLayoutConfig {
    fn default() -> Self {
        Self {
            spacing: 0.0,
            retention_margin: 0.0,
            prefetch: PrefetchStrategy::default(),
        }
    }
}

pub struct LinearLayout<F: ViewFactory> {
    axis: Axis,
    factory: F,
    config: LinearLayoutConfig,
    viewport: Viewport,
    unbounded: bool,
    average_hint: Cell<f32>,
}

impl<F: ViewFactory> LinearLayout<F> {
    pub fn new(axis: Axis, factory: F, config: LinearLayoutConfig) -> Self {
        Self {
            axis,
            factory,
            config,
            viewport: Viewport::default(),
            unbounded: false,
            average_hint: Cell::new(DEFAULT_ITEM_SIZE_ESTIMATE),
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn config(&self) -> &LinearLayoutConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Whether the last viewport size was unbounded and replaced by an
    /// estimate.
    pub fn is_unbounded(&self) -> bool {
        self.unbounded
    }

    pub fn set_viewport(&mut self, offset: f32, size: f32, average_item_size: f32) {
        let handler = ViewportHandler::new(size, average_item_size, self.config.spacing);
        self.unbounded = handler.is_infinite();
        self.viewport = handler.viewport(offset);
    }

    pub fn scroll_to(&mut self, offset: f32) {
        self.viewport.offset = offset;
    }

    fn prefetch_extent(&self, average_size: f32) -> f32 {
        self.config.prefetch.buffer_extent(average_size)
    }

    fn retention(&self) -> f32 {
        self.config
            .retention_margin
            .max(self.prefetch_extent(self.average_hint.get()))
    }
}

impl<F: ViewFactory> RecyclePolicy for LinearLayout<F> {
    type Item = F::View;

    fn size(&self) -> usize {
        self.factory.count()
    }

    fn variant_for(&self, index: usize) -> Variant {
        self.factory.variant_for(index)
    }

    fn should_recycle(&self, _item: &F::View, meta: &Meta) -> bool {
        !self.viewport.retains(meta, self.retention())
    }

    fn is_client_full(&self, direction: Direction, extent: &WindowExtent) -> bool {
        self.average_hint.set(extent.average_size);
        self.viewport.covers(direction, extent, self.size(), 0.0)
    }

    fn has_enough_content(&self, direction: Direction, extent: &WindowExtent) -> bool {
        self.average_hint.set(extent.average_size);
        let reach = self.prefetch_extent(extent.average_size);
        self.viewport.covers(direction, extent, self.size(), reach)
    }

    fn measure(&mut self, index: usize, view: &mut F::View) -> Result<f32> {
        let size = self.factory.bind(view, index);
        Ok(size.max(0.0) + self.config.spacing)
    }

    fn position(&mut self, view: &mut F::View, meta: &Meta) -> Result<()> {
        let size = (meta.size - self.config.spacing).max(0.0);
        self.factory.place(view, self.axis, meta.offset, size);
        Ok(())
    }

    fn allocate(&mut self, variant: Variant) -> Result<Option<F::View>> {
        Ok(self.factory.create(variant))
    }

    fn detach(&mut self, view: &mut F::View) {
        self.factory.detach(view);
    }

    fn anchor(&self, average_size: f32) -> Anchor {
        self.viewport.anchor(average_size, self.size())
    }

    fn rebase(&mut self, delta: f32) {
        self.viewport.offset = (self.viewport.offset + delta).max(0.0);
    }
}

/// A recycled list along one axis.
pub struct ListView<F: ViewFactory> {
    recycler: Recycler<LinearLayout<F>>,
}

impl<F> ListView<F>
where
    F: ViewFactory + 'static,
    F::View: 'static,
{
    pub fn new(
        axis: Axis,
        factory: F,
        config: LinearLayoutConfig,
        host: Rc<dyn HostScheduler>,
    ) -> Result<Self> {
        let recycler = Recycler::new(LinearLayout::new(axis, factory, config), host)?;
        Ok(Self { recycler })
    }

    /// Items stacked top to bottom.
    pub fn vertical(
        factory: F,
        config: LinearLayoutConfig,
        host: Rc<dyn HostScheduler>,
    ) -> Result<Self> {
        Self::new(Axis::Vertical, factory, config, host)
    }

    /// Items laid out left to right.
    pub fn horizontal(
        factory: F,
        config: LinearLayoutConfig,
        host: Rc<dyn HostScheduler>,
    ) -> Result<Self> {
        Self::new(Axis::Horizontal, factory, config, host)
    }

    /// Wraps an engine built elsewhere, e.g. one sharing a pool.
    pub fn from_recycler(recycler: Recycler<LinearLayout<F>>) -> Self {
        Self { recycler }
    }

    pub fn mount(&self) {
        self.recycler.mount();
    }

    pub fn unmount(&self) {
        self.recycler.unmount();
    }

    pub fn recycle(&self) -> RecycleJob {
        self.recycler.recycle()
    }

    pub fn set_viewport(&self, offset: f32, size: f32) {
        let average = self.recycler.average_item_size();
        self.recycler
            .with_policy_mut(|layout| layout.set_viewport(offset, size, average));
    }

    /// Moves the viewport and starts a recycle for the new position.
    pub fn scroll_to(&self, offset: f32) -> RecycleJob {
        self.recycler.with_policy_mut(|layout| layout.scroll_to(offset));
        self.recycler.recycle()
    }

    /// Shifts the viewport by `delta` and starts a recycle.
    pub fn scroll_by(&self, delta: f32) -> RecycleJob {
        let offset = self.viewport().offset + delta;
        self.scroll_to(offset.max(0.0))
    }

    pub fn viewport(&self) -> Viewport {
        self.recycler.with_policy(|layout| layout.viewport())
    }

    /// Indices of realized items that intersect the viewport.
    pub fn visible_range(&self) -> Option<Range<usize>> {
        let viewport = self.viewport();
        let mut range: Option<Range<usize>> = None;
        for meta in self.recycler.window_metas() {
            if meta.end() <= viewport.offset || meta.offset >= viewport.end() {
                continue;
            }
            range = Some(match range {
                Some(range) => range.start..meta.index + 1,
                None => meta.index..meta.index + 1,
            });
        }
        range
    }

    pub fn recycler(&self) -> &Recycler<LinearLayout<F>> {
        &self.recycler
    }

    pub fn with_factory<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        self.recycler.with_policy(|layout| f(layout.factory()))
    }

    pub fn with_factory_mut<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        self.recycler.with_policy_mut(|layout| f(layout.factory_mut()))
    }
}

#[cfg(test)]
#[path = "tests/linear_tests.rs"]
mod tests;
