//! Two-axis recycling.
//!
//! A [`Grid`] runs one engine over rows and one over columns. Both engines
//! recycle lightweight [`Track`] records out of a single shared pool, each
//! owning its own variant. Cells are realized for the cross product of the
//! two windows as soon as both jobs have covered the visible region, and
//! again after every prefetch batch; cells leaving that product are hidden
//! and kept on a free list for the next cell that enters it.
//!
//! Leading rows and columns can be frozen (see [`Table`](crate::Table)).
//! Frozen tracks are never part of an engine window: their cells stay
//! realized and follow the scroll position.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use futures::future;

use recycler_core::collections::map::HashMap;
use recycler_core::{
    Anchor, Direction, HostScheduler, LocalBoxFuture, Meta, Pool, RecycleOutcome,
    RecyclePolicy, Recycler, RecyclerStats, Result, SharedPool, Variant, WindowExtent,
    DEFAULT_ITEM_SIZE_ESTIMATE,
};
use smallvec::SmallVec;

use crate::linear::Axis;
use crate::prefetch::PrefetchStrategy;
use crate::viewport::Viewport;

/// Placement of a cell in content coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct CellRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Host-side cells a grid recycles.
pub trait CellFactory {
    type Cell;

    fn rows(&self) -> usize;

    fn columns(&self) -> usize;

    fn row_height(&mut self, row: usize) -> f32;

    fn column_width(&mut self, column: usize) -> f32;

    fn create_cell(&mut self, row: usize, column: usize) -> Self::Cell;

    fn bind_cell(&mut self, cell: &mut Self::Cell, row: usize, column: usize);

    fn place_cell(&mut self, cell: &mut Self::Cell, rect: CellRect);

    fn hide_cell(&mut self, cell: &mut Self::Cell) {
        let _ = cell;
    }
}

/// Scroll position and size of a grid's visible region.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct GridViewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl GridViewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridConfig {
    pub retention_margin: f32,
    /// Tracks prefetched past each edge, on both axes.
    pub prefetch: PrefetchStrategy,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            retention_margin: 0.0,
            prefetch: PrefetchStrategy::default(),
        }
    }
}

/// A realized row or column.
#[derive(Debug)]
pub struct Track {
    axis: Axis,
    index: Option<usize>,
}

impl Track {
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Logical row or column this track currently shows.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

/// Policy over the scrolling (non-frozen) tracks of one axis.
///
/// Engine index `i` is grid track `frozen + i`.
pub struct TrackPolicy<F> {
    axis: Axis,
    factory: Rc<RefCell<F>>,
    frozen: usize,
    variant: Variant,
    viewport: Viewport,
    /// Grid scroll position, moved along when the engine rebases offsets.
    scroll: Rc<Cell<GridViewport>>,
    retention_margin: f32,
    prefetch: PrefetchStrategy,
    average_hint: Cell<f32>,
}

impl<F: CellFactory> TrackPolicy<F> {
    fn new(
        axis: Axis,
        factory: Rc<RefCell<F>>,
        frozen: usize,
        scroll: Rc<Cell<GridViewport>>,
        config: &GridConfig,
    ) -> Self {
        let variant = match axis {
            Axis::Vertical => Variant::named("row"),
            Axis::Horizontal => Variant::named("column"),
        };
        Self {
            axis,
            factory,
            frozen,
            variant,
            viewport: Viewport::default(),
            scroll,
            retention_margin: config.retention_margin,
            prefetch: config.prefetch.clone(),
            average_hint: Cell::new(DEFAULT_ITEM_SIZE_ESTIMATE),
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn total(&self) -> usize {
        let factory = self.factory.borrow();
        match self.axis {
            Axis::Vertical => factory.rows(),
            Axis::Horizontal => factory.columns(),
        }
    }

    fn retention(&self) -> f32 {
        self.retention_margin
            .max(self.prefetch.buffer_extent(self.average_hint.get()))
    }
}

impl<F: CellFactory> RecyclePolicy for TrackPolicy<F> {
    type Item = Track;

    fn size(&self) -> usize {
        self.total().saturating_sub(self.frozen)
    }

    fn variant_for(&self, _index: usize) -> Variant {
        self.variant
    }

    fn should_recycle(&self, _track: &Track, meta: &Meta) -> bool {
        !self.viewport.retains(meta, self.retention())
    }

    fn is_client_full(&self, direction: Direction, extent: &WindowExtent) -> bool {
        self.average_hint.set(extent.average_size);
        self.viewport.covers(direction, extent, self.size(), 0.0)
    }

    fn has_enough_content(&self, direction: Direction, extent: &WindowExtent) -> bool {
        self.average_hint.set(extent.average_size);
        let reach = self.prefetch.buffer_extent(extent.average_size);
        self.viewport.covers(direction, extent, self.size(), reach)
    }

    fn measure(&mut self, index: usize, track: &mut Track) -> Result<f32> {
        let grid_index = self.frozen + index;
        track.index = Some(grid_index);
        let mut factory = self.factory.borrow_mut();
        let size = match self.axis {
            Axis::Vertical => factory.row_height(grid_index),
            Axis::Horizontal => factory.column_width(grid_index),
        };
        Ok(size.max(0.0))
    }

    fn position(&mut self, _track: &mut Track, _meta: &Meta) -> Result<()> {
        // Cells are placed by the grid from both windows.
        Ok(())
    }

    fn allocate(&mut self, _variant: Variant) -> Result<Option<Track>> {
        Ok(Some(Track {
            axis: self.axis,
            index: None,
        }))
    }

    fn detach(&mut self, track: &mut Track) {
        track.index = None;
    }

    fn anchor(&self, average_size: f32) -> Anchor {
        self.viewport.anchor(average_size, self.size())
    }

    fn rebase(&mut self, delta: f32) {
        let offset = (self.viewport.offset + delta).max(0.0);
        self.viewport.offset = offset;
        let mut scroll = self.scroll.get();
        match self.axis {
            Axis::Vertical => scroll.y = offset,
            Axis::Horizontal => scroll.x = offset,
        }
        self.scroll.set(scroll);
    }
}

/// Position and size of one track in content coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Span {
    index: usize,
    start: f32,
    size: f32,
}

type Spans = SmallVec<[Span; 32]>;

struct CellEntry<C> {
    cell: C,
    rect: CellRect,
}

struct Cells<C> {
    live: HashMap<(usize, usize), CellEntry<C>>,
    free: Vec<C>,
    created: u64,
    rebound: u64,
}

impl<C> Default for Cells<C> {
    fn default() -> Self {
        Self {
            live: HashMap::default(),
            free: Vec::new(),
            created: 0,
            rebound: 0,
        }
    }
}

/// What the cells were last synced against.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SyncStamp {
    rows: u64,
    columns: u64,
    viewport: GridViewport,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Frozen {
    rows: usize,
    columns: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridStats {
    pub rows: RecyclerStats,
    pub columns: RecyclerStats,
    pub live_cells: usize,
    pub free_cells: usize,
    pub cells_created: u64,
    pub cells_rebound: u64,
}

/// Everything a settled grid job needs to realize cells.
struct CellSync<F: CellFactory> {
    factory: Rc<RefCell<F>>,
    rows: Recycler<TrackPolicy<F>>,
    columns: Recycler<TrackPolicy<F>>,
    cells: Rc<RefCell<Cells<F::Cell>>>,
    viewport: Rc<Cell<GridViewport>>,
    frozen: Frozen,
    synced: Rc<Cell<Option<SyncStamp>>>,
}

impl<F: CellFactory> Clone for CellSync<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Rc::clone(&self.factory),
            rows: self.rows.clone(),
            columns: self.columns.clone(),
            cells: Rc::clone(&self.cells),
            viewport: Rc::clone(&self.viewport),
            frozen: self.frozen,
            synced: Rc::clone(&self.synced),
        }
    }
}

/// Frozen tracks stick to the viewport origin: `origin` is the scroll
/// position on that axis.
fn frozen_spans(count: usize, origin: f32, mut size_of: impl FnMut(usize) -> f32) -> Spans {
    let mut spans = Spans::new();
    let mut start = origin;
    for index in 0..count {
        let size = size_of(index).max(0.0);
        spans.push(Span { index, start, size });
        start += size;
    }
    spans
}

fn spans_extent(spans: &Spans) -> f32 {
    spans.iter().map(|span| span.size).sum()
}

/// Window tracks shifted past the frozen band.
fn body_spans(metas: &[Meta], frozen: usize, band: f32) -> Spans {
    metas
        .iter()
        .map(|meta| Span {
            index: frozen + meta.index,
            start: band + meta.offset,
            size: meta.size,
        })
        .collect()
}

impl<F: CellFactory> CellSync<F> {
    fn frozen_extents(&self) -> (f32, f32) {
        let mut factory = self.factory.borrow_mut();
        let height: f32 = (0..self.frozen.rows)
            .map(|row| factory.row_height(row).max(0.0))
            .sum();
        let width: f32 = (0..self.frozen.columns)
            .map(|column| factory.column_width(column).max(0.0))
            .sum();
        (width, height)
    }

    fn stamp(&self) -> SyncStamp {
        SyncStamp {
            rows: self.rows.revision(),
            columns: self.columns.revision(),
            viewport: self.viewport.get(),
        }
    }

    /// Whether the axis jobs started as `generations` are still the latest
    /// and have both covered the visible region.
    fn is_painted(&self, generations: (u64, u64)) -> bool {
        self.rows.generation() == generations.0
            && self.columns.generation() == generations.1
            && self.rows.is_painted()
            && self.columns.is_painted()
    }

    /// Syncs unless neither window nor the viewport changed since last time.
    fn sync_if_stale(&self) {
        let stamp = self.stamp();
        if self.synced.get() == Some(stamp) {
            return;
        }
        self.sync();
        self.synced.set(Some(stamp));
    }

    /// Realizes the cells covered by both windows and the frozen bands, and
    /// retires every other cell.
    fn sync(&self) {
        let viewport = self.viewport.get();
        let mut factory = self.factory.borrow_mut();
        let factory = &mut *factory;

        let mut row_spans = frozen_spans(self.frozen.rows, viewport.y, |row| {
            factory.row_height(row)
        });
        let mut column_spans = frozen_spans(self.frozen.columns, viewport.x, |column| {
            factory.column_width(column)
        });
        let band_height = spans_extent(&row_spans);
        let band_width = spans_extent(&column_spans);
        row_spans.extend(body_spans(
            &self.rows.window_metas(),
            self.frozen.rows,
            band_height,
        ));
        column_spans.extend(body_spans(
            &self.columns.window_metas(),
            self.frozen.columns,
            band_width,
        ));

        let mut cells = self.cells.borrow_mut();
        let cells = &mut *cells;
        let mut retired = std::mem::take(&mut cells.live);
        let mut live = HashMap::default();
        live.reserve(row_spans.len() * column_spans.len());
        let mut missing: SmallVec<[((usize, usize), CellRect); 32]> = SmallVec::new();

        for row in &row_spans {
            for column in &column_spans {
                let key = (row.index, column.index);
                let rect = CellRect {
                    x: column.start,
                    y: row.start,
                    width: column.size,
                    height: row.size,
                };
                match retired.remove(&key) {
                    Some(mut entry) => {
                        if entry.rect != rect {
                            factory.place_cell(&mut entry.cell, rect);
                            entry.rect = rect;
                        }
                        live.insert(key, entry);
                    }
                    None => missing.push((key, rect)),
                }
            }
        }

        let hidden = retired.len();
        for (_, mut entry) in retired.drain() {
            factory.hide_cell(&mut entry.cell);
            cells.free.push(entry.cell);
        }

        for ((row, column), rect) in missing {
            let mut cell = match cells.free.pop() {
                Some(cell) => {
                    cells.rebound += 1;
                    cell
                }
                None => {
                    cells.created += 1;
                    factory.create_cell(row, column)
                }
            };
            factory.bind_cell(&mut cell, row, column);
            factory.place_cell(&mut cell, rect);
            live.insert((row, column), CellEntry { cell, rect });
        }

        cells.live = live;
        log::trace!(
            "grid: {} live cells ({} rows x {} columns), {} hidden, {} free",
            cells.live.len(),
            row_spans.len(),
            column_spans.len(),
            hidden,
            cells.free.len()
        );
    }

    fn retire_all(&self) {
        self.synced.set(None);
        let mut factory = self.factory.borrow_mut();
        let mut cells = self.cells.borrow_mut();
        let cells = &mut *cells;
        for (_, mut entry) in cells.live.drain() {
            factory.hide_cell(&mut entry.cell);
            cells.free.push(entry.cell);
        }
    }
}

/// Combined result of the row and column jobs.
fn combine(rows: RecycleOutcome, columns: RecycleOutcome) -> RecycleOutcome {
    use RecycleOutcome::*;
    match (rows, columns) {
        (Unmounted, _) | (_, Unmounted) => Unmounted,
        (Superseded, _) | (_, Superseded) => Superseded,
        (Completed, Completed) => Completed,
    }
}

/// Recycled two-dimensional grid of cells.
pub struct Grid<F: CellFactory> {
    sync: CellSync<F>,
    pool: SharedPool<Track>,
}

impl<F> Grid<F>
where
    F: CellFactory + 'static,
    F::Cell: 'static,
{
    pub fn new(factory: F, config: GridConfig, host: Rc<dyn HostScheduler>) -> Result<Self> {
        Self::with_frozen(factory, config, 0, 0, host)
    }

    pub(crate) fn with_frozen(
        factory: F,
        config: GridConfig,
        frozen_rows: usize,
        frozen_columns: usize,
        host: Rc<dyn HostScheduler>,
    ) -> Result<Self> {
        let factory = Rc::new(RefCell::new(factory));
        let viewport = Rc::new(Cell::new(GridViewport::default()));
        let pool = Pool::shared();
        let rows = TrackPolicy::new(
            Axis::Vertical,
            Rc::clone(&factory),
            frozen_rows,
            Rc::clone(&viewport),
            &config,
        );
        let columns = TrackPolicy::new(
            Axis::Horizontal,
            Rc::clone(&factory),
            frozen_columns,
            Rc::clone(&viewport),
            &config,
        );
        let row_variant = rows.variant();
        let column_variant = columns.variant();
        let rows = Recycler::builder(rows, Rc::clone(&host))
            .pool(Rc::clone(&pool))
            .reserve_variant(row_variant)
            .build()?;
        let columns = Recycler::builder(columns, host)
            .pool(Rc::clone(&pool))
            .reserve_variant(column_variant)
            .build()?;
        Ok(Self {
            sync: CellSync {
                factory,
                rows,
                columns,
                cells: Rc::new(RefCell::new(Cells::default())),
                viewport,
                frozen: Frozen {
                    rows: frozen_rows,
                    columns: frozen_columns,
                },
                synced: Rc::new(Cell::new(None)),
            },
            pool,
        })
    }

    pub fn mount(&self) {
        self.sync.rows.mount();
        self.sync.columns.mount();
    }

    /// Cancels both jobs, parks every track and hides every cell.
    pub fn unmount(&self) {
        self.sync.rows.unmount();
        self.sync.columns.unmount();
        self.sync.retire_all();
    }

    /// Starts row and column jobs. Cells are realized as soon as both have
    /// covered the visible region, and again whenever a prefetch batch moves
    /// either window.
    ///
    /// A job superseded on either axis leaves the cells to the newer job.
    pub fn recycle(&self) -> LocalBoxFuture<Result<RecycleOutcome>> {
        let rows = self.sync.rows.recycle();
        let columns = self.sync.columns.recycle();
        let generations = (self.sync.rows.generation(), self.sync.columns.generation());
        let sync = self.sync.clone();
        Box::pin(async move {
            let mut jobs = future::join(rows, columns);
            let (rows, columns) = future::poll_fn(|cx| {
                let poll = Pin::new(&mut jobs).poll(cx);
                if poll.is_pending() && sync.is_painted(generations) {
                    sync.sync_if_stale();
                }
                poll
            })
            .await;
            let outcome = combine(rows?, columns?);
            if outcome == RecycleOutcome::Completed {
                sync.sync_if_stale();
            }
            Ok(outcome)
        })
    }

    /// Updates the visible region. Frozen bands are carved out of it before
    /// it reaches the track engines.
    pub fn set_viewport(&self, viewport: GridViewport) {
        self.sync.viewport.set(viewport);
        let (band_width, band_height) = self.sync.frozen_extents();
        self.sync.rows.with_policy_mut(|policy| {
            policy.viewport = Viewport::new(viewport.y, (viewport.height - band_height).max(0.0));
        });
        self.sync.columns.with_policy_mut(|policy| {
            policy.viewport = Viewport::new(viewport.x, (viewport.width - band_width).max(0.0));
        });
    }

    pub fn scroll_to(&self, x: f32, y: f32) -> LocalBoxFuture<Result<RecycleOutcome>> {
        let viewport = self.viewport();
        self.set_viewport(GridViewport { x, y, ..viewport });
        self.recycle()
    }

    pub fn viewport(&self) -> GridViewport {
        self.sync.viewport.get()
    }

    pub fn rows(&self) -> &Recycler<TrackPolicy<F>> {
        &self.sync.rows
    }

    pub fn columns(&self) -> &Recycler<TrackPolicy<F>> {
        &self.sync.columns
    }

    /// Pool both track engines recycle into.
    pub fn track_pool(&self) -> SharedPool<Track> {
        Rc::clone(&self.pool)
    }

    /// Realized cells as `(row, column)`, in row-major order.
    pub fn live_cells(&self) -> Vec<(usize, usize)> {
        let mut keys: Vec<_> = self.sync.cells.borrow().live.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn cell_rect(&self, row: usize, column: usize) -> Option<CellRect> {
        self.sync
            .cells
            .borrow()
            .live
            .get(&(row, column))
            .map(|entry| entry.rect)
    }

    pub fn with_cell<R>(&self, row: usize, column: usize, f: impl FnOnce(&F::Cell) -> R) -> Option<R> {
        self.sync
            .cells
            .borrow()
            .live
            .get(&(row, column))
            .map(|entry| f(&entry.cell))
    }

    pub fn with_factory<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        f(&self.sync.factory.borrow())
    }

    pub fn stats(&self) -> GridStats {
        let cells = self.sync.cells.borrow();
        GridStats {
            rows: self.sync.rows.stats(),
            columns: self.sync.columns.stats(),
            live_cells: cells.live.len(),
            free_cells: cells.free.len(),
            cells_created: cells.created,
            cells_rebound: cells.rebound,
        }
    }

    /// Engine invariants on both axes, plus the cell cross product. The cell
    /// count only matches once the latest job has synced its cells.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        self.sync.rows.check_invariants()?;
        self.sync.columns.check_invariants()?;
        let expected = (self.sync.frozen.rows + self.sync.rows.window_len())
            * (self.sync.frozen.columns + self.sync.columns.window_len());
        let live = self.sync.cells.borrow().live.len();
        if live != 0 && live != expected {
            return Err(format!(
                "{live} live cells for a {expected}-cell cross product"
            ));
        }
        Ok(())
    }

    pub(crate) fn frozen_counts(&self) -> (usize, usize) {
        (self.sync.frozen.rows, self.sync.frozen.columns)
    }

    pub(crate) fn frozen_extents(&self) -> (f32, f32) {
        self.sync.frozen_extents()
    }
}

impl<F: CellFactory> fmt::Debug for Grid<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("rows", &self.sync.rows)
            .field("columns", &self.sync.columns)
            .field("frozen", &self.sync.frozen)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/grid_tests.rs"]
mod tests;
