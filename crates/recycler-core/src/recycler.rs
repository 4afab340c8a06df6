//! The view-recycling engine.
//!
//! A [`Recycler`] keeps a contiguous [`Window`] of realized items, parks items
//! that leave the retention threshold in a per-variant [`Pool`], and grows the
//! window from either edge in batches whose size adapts to the measured cost
//! of previous batches.
//!
//! Work happens in [`RecycleJob`]s. A job waits for the next paint, then
//! covers the visible region in one go: toward the start edge (when the window
//! already has items) and then toward the end edge, until the policy reports
//! the client full on both. Prefetching beyond the visible region happens
//! afterwards in idle slices granted by the host. Every call to
//! [`Recycler::recycle`] bumps a generation counter; a job that wakes up to a
//! newer generation stops without touching the window again.
//!
//! Offsets of never-measured indices are estimates. When the start of the
//! window shows index 0 away from offset zero, or a later index with no room
//! left before it, every recorded offset is moved to correct the estimate and
//! the policy is told through [`RecyclePolicy::rebase`].
//!
//! Each batch runs in two passes: all new items are measured first, then all
//! of them are positioned, so no measurement ever observes a half-applied
//! layout.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use smallvec::SmallVec;
use web_time::{Duration, Instant};

use crate::error::{RecyclerError, Result};
use crate::meta::{Meta, MetaStore};
use crate::platform::{HostScheduler, LocalBoxFuture};
use crate::policy::{RecyclePolicy, WindowExtent};
use crate::pool::{EngineId, Pool, SharedPool, Variant};
use crate::window::{Direction, ItemId, Slot, Window};

/// Default estimated item size used before anything has been measured.
/// 48.0 is a common list row height.
pub const DEFAULT_ITEM_SIZE_ESTIMATE: f32 = 48.0;

/// Maximum items realized by one synchronous fill pass.
///
/// Guards against policies that never report full (for example when every
/// item measures zero).
pub const DEFAULT_MAX_ITEMS_PER_PASS: usize = 10_000;

/// Tunables for one engine.
#[derive(Clone, Debug, PartialEq)]
pub struct RecyclerConfig {
    /// Batch size of the first batch of every fill pass. Doubles per batch.
    pub initial_increment: usize,
    /// Size assumed for indices that were never measured.
    pub default_item_size: f32,
    /// Safety cap for items realized by one synchronous pass.
    pub max_items_per_pass: usize,
}

impl Default for RecyclerConfig {
    fn default() -> Self {
        Self {
            initial_increment: 1,
            default_item_size: DEFAULT_ITEM_SIZE_ESTIMATE,
            max_items_per_pass: DEFAULT_MAX_ITEMS_PER_PASS,
        }
    }
}

impl RecyclerConfig {
    fn validate(&self) -> Result<()> {
        if self.initial_increment == 0 {
            return Err(RecyclerError::invalid("initial_increment must be at least 1"));
        }
        if !self.default_item_size.is_finite() || self.default_item_size <= 0.0 {
            return Err(RecyclerError::invalid(format!(
                "default_item_size must be a positive finite number, got {}",
                self.default_item_size
            )));
        }
        if self.max_items_per_pass == 0 {
            return Err(RecyclerError::invalid("max_items_per_pass must be at least 1"));
        }
        Ok(())
    }
}

/// Lifecycle state of an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Unmounted,
    Idle,
    Filling(Direction),
}

/// How a [`RecycleJob`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecycleOutcome {
    /// Both fill passes ran to completion.
    Completed,
    /// A newer `recycle()` or an `unmount()` took over; this job stopped at
    /// its last suspension point.
    Superseded,
    /// The engine was not mounted when the job was requested.
    Unmounted,
}

/// Counters describing the engine's recent work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecyclerStats {
    /// Items currently realized in the window.
    pub items_in_window: usize,
    /// Items parked in the pool (all variants, including other engines' when
    /// the pool is shared).
    pub items_in_pool: usize,
    /// Items created through `allocate`.
    pub allocated: u64,
    /// Items taken from the pool instead of allocated.
    pub reused: u64,
    /// Items moved from the window into the pool.
    pub evicted: u64,
    pub jobs_completed: u64,
    pub jobs_superseded: u64,
}

struct Inner<P: RecyclePolicy> {
    id: EngineId,
    policy: P,
    window: Window<P::Item>,
    metas: MetaStore,
    pool: SharedPool<P::Item>,
    config: RecyclerConfig,
    state: EngineState,
    generation: u64,
    /// Generation whose job has covered the visible region.
    painted: Option<u64>,
    /// Bumped whenever the realized items or their offsets change.
    revision: u64,
    /// Cost of one item in the last batch that added items.
    unit_cost: Option<Duration>,
    measured_total: f64,
    measured_count: u64,
    stats: RecyclerStats,
}

impl<P: RecyclePolicy> Drop for Inner<P> {
    fn drop(&mut self) {
        if let Ok(mut pool) = self.pool.try_borrow_mut() {
            pool.release(self.id);
        }
    }
}

enum Flow {
    Continue,
    Abandoned,
}

/// What a batch stops early for once it is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Goal {
    /// The visible region is covered.
    Visible,
    /// The prefetch buffer is covered.
    Prefetch,
}

impl<P: RecyclePolicy> Inner<P> {
    fn average_item_size(&self) -> f32 {
        if self.measured_count == 0 {
            self.config.default_item_size
        } else {
            (self.measured_total / self.measured_count as f64) as f32
        }
    }

    fn extent(&self) -> WindowExtent {
        WindowExtent {
            first: self.window.first().map(|slot| *self.metas.record(slot.meta_id())),
            last: self.window.last().map(|slot| *self.metas.record(slot.meta_id())),
            len: self.window.len(),
            average_size: self.average_item_size(),
        }
    }

    fn is_client_full(&self, direction: Direction) -> bool {
        let extent = self.extent();
        self.policy.is_client_full(direction, &extent)
    }

    fn has_enough_content(&self, direction: Direction) -> bool {
        let extent = self.extent();
        self.policy.has_enough_content(direction, &extent)
    }

    fn reached(&self, goal: Goal, direction: Direction) -> bool {
        match goal {
            Goal::Visible => self.is_client_full(direction),
            Goal::Prefetch => self.has_enough_content(direction),
        }
    }

    /// Next logical index on the growing edge, or `None` once the range is
    /// exhausted.
    fn next_index(&self, direction: Direction) -> Option<usize> {
        let size = self.policy.size();
        if size == 0 {
            return None;
        }
        match self.window.edge(direction) {
            Some(edge) => {
                let index = self.metas.record(edge.meta_id()).index;
                match direction {
                    Direction::End => Some(index + 1).filter(|next| *next < size),
                    Direction::Start => index.checked_sub(1),
                }
            }
            None => {
                let anchor = self.policy.anchor(self.average_item_size());
                Some(anchor.index.min(size - 1))
            }
        }
    }

    /// Size and offset assumed for `index` before it is measured.
    fn provisional_meta(&self, direction: Direction, index: usize) -> Meta {
        let average = self.average_item_size();
        let cached = self.metas.get_by_index(index).copied();
        let size = cached.map_or(average, |meta| meta.size);
        let neighbor = self
            .window
            .edge(direction)
            .map(|slot| *self.metas.record(slot.meta_id()));
        let offset = match (direction, neighbor) {
            (Direction::End, Some(prev)) => prev.end(),
            (Direction::Start, Some(next)) => next.offset - size,
            (_, None) => {
                let anchor = self.policy.anchor(average);
                anchor
                    .offset
                    .or(cached.map(|meta| meta.offset))
                    .unwrap_or(index as f32 * average)
            }
        };
        Meta::new(index, size, offset)
    }

    /// Moves every slot at `edge` that the policy wants recycled into the pool.
    fn evict(&mut self, edge: Direction) -> usize {
        let mut evicted = 0;
        loop {
            let Inner {
                window,
                metas,
                policy,
                ..
            } = &mut *self;
            let Some(mut slot) = window.pop_if(edge, |slot| {
                policy.should_recycle(slot.item(), metas.record(slot.meta_id()))
            }) else {
                break;
            };
            policy.detach(slot.item_mut());
            self.park(slot);
            evicted += 1;
        }
        if evicted > 0 {
            self.stats.evicted += evicted as u64;
            self.revision += 1;
        }
        evicted
    }

    fn park(&mut self, slot: Slot<P::Item>) {
        let rejected = self.pool.borrow_mut().push(slot.variant(), slot);
        if let Some(rejected) = rejected {
            self.metas.unbind(rejected.id());
        }
    }

    fn claim(&self, variant: Variant) -> Result<()> {
        let mut pool = self.pool.borrow_mut();
        if pool.owner_of(variant) == Some(self.id) {
            return Ok(());
        }
        pool.claim(variant, self.id)
    }

    /// Realizes `index` at the growing edge. Returns `false` when the policy
    /// declined to allocate.
    fn realize(&mut self, direction: Direction, index: usize) -> Result<bool> {
        let variant = self.policy.variant_for(index);
        self.claim(variant)?;
        let provisional = self.provisional_meta(direction, index);
        let pooled = self.pool.borrow_mut().pop(variant);
        let slot = match pooled {
            Some(mut slot) => {
                self.stats.reused += 1;
                let meta = self.metas.set(slot.id(), provisional);
                slot.rebind(meta);
                slot
            }
            None => match self.policy.allocate(variant)? {
                Some(item) => {
                    self.stats.allocated += 1;
                    let id = ItemId::next();
                    let meta = self.metas.set(id, provisional);
                    Slot::new(id, variant, meta, item)
                }
                None => return Ok(false),
            },
        };
        self.window.push(direction, slot);
        Ok(true)
    }

    /// Window position of the `step`-th item of a batch of `added` items,
    /// counted outward from the previously existing window.
    fn batch_position(&self, direction: Direction, added: usize, step: usize) -> usize {
        match direction {
            Direction::End => self.window.len() - added + step,
            Direction::Start => added - 1 - step,
        }
    }

    /// Measure pass: sizes and offsets for the newest `added` items.
    fn measure_batch(&mut self, direction: Direction, added: usize) -> Result<()> {
        for step in 0..added {
            let position = self.batch_position(direction, added, step);
            let Inner {
                window,
                metas,
                policy,
                ..
            } = &mut *self;
            let neighbor = match direction {
                Direction::End => position.checked_sub(1),
                Direction::Start => Some(position + 1).filter(|next| *next < window.len()),
            }
            .and_then(|position| window.get(position))
            .map(|slot| *metas.record(slot.meta_id()));
            let Some(slot) = window.get_mut(position) else {
                break;
            };
            let meta_id = slot.meta_id();
            let provisional = *metas.record(meta_id);
            let size = policy.measure(provisional.index, slot.item_mut())?;
            let offset = match (direction, neighbor) {
                (Direction::End, Some(prev)) => prev.end(),
                (Direction::Start, Some(next)) => next.offset - size,
                (_, None) => provisional.offset,
            };
            *metas.record_mut(meta_id) = Meta::new(provisional.index, size, offset);
            self.measured_total += f64::from(size);
            self.measured_count += 1;
        }
        Ok(())
    }

    /// Mutate pass: positions the newest `added` items in measure order.
    fn position_batch(&mut self, direction: Direction, added: usize) -> Result<()> {
        for step in 0..added {
            let position = self.batch_position(direction, added, step);
            let Inner {
                window,
                metas,
                policy,
                ..
            } = &mut *self;
            if let Some(slot) = window.get_mut(position) {
                let meta = *metas.record(slot.meta_id());
                policy.position(slot.item_mut(), &meta)?;
            }
        }
        Ok(())
    }

    /// Positions every realized item again, after their offsets moved.
    fn position_window(&mut self) -> Result<()> {
        for position in 0..self.window.len() {
            let Inner {
                window,
                metas,
                policy,
                ..
            } = &mut *self;
            if let Some(slot) = window.get_mut(position) {
                let meta = *metas.record(slot.meta_id());
                policy.position(slot.item_mut(), &meta)?;
            }
        }
        Ok(())
    }

    /// Corrects accumulated estimate error at the start of the window: index 0
    /// must begin at zero, and any later index needs room for the indices
    /// before it. Moves every recorded offset and returns whether anything
    /// moved.
    fn rebase_origin(&mut self) -> bool {
        let Some(first) = self
            .window
            .first()
            .map(|slot| *self.metas.record(slot.meta_id()))
        else {
            return false;
        };
        let target = if first.index == 0 {
            0.0
        } else if first.offset <= 0.0 {
            first.index as f32 * self.average_item_size()
        } else {
            return false;
        };
        let delta = target - first.offset;
        if delta.abs() <= f32::EPSILON {
            return false;
        }
        self.metas.shift_offsets(delta);
        self.policy.rebase(delta);
        self.revision += 1;
        log::debug!(
            "recycler {}: index {} was at {}, moved all offsets by {}",
            self.id,
            first.index,
            first.offset,
            delta
        );
        true
    }

    /// One evict/allocate/measure/mutate batch of at most `limit` items.
    fn run_batch(
        &mut self,
        direction: Direction,
        limit: usize,
        goal: Goal,
        host: &dyn HostScheduler,
    ) -> Result<usize> {
        let started: Instant = host.now();
        self.evict(direction.opposite());

        let mut added = 0;
        while added < limit {
            let Some(index) = self.next_index(direction) else {
                break;
            };
            if !self.realize(direction, index)? {
                log::debug!("recycler {}: allocation declined at index {}", self.id, index);
                break;
            }
            added += 1;
            if self.reached(goal, direction) {
                break;
            }
        }
        if added == 0 {
            return Ok(0);
        }

        self.measure_batch(direction, added)?;
        if direction == Direction::Start && self.rebase_origin() {
            self.position_window()?;
        } else {
            self.position_batch(direction, added)?;
        }
        self.revision += 1;

        let elapsed = host.elapsed(started);
        self.unit_cost = Some(elapsed / added as u32);
        log::trace!(
            "recycler {}: {:?} batch added {} items in {:?} (window {})",
            self.id,
            direction,
            added,
            elapsed,
            self.window.len()
        );
        Ok(added)
    }

    /// Synchronous part of a fill pass: batches with doubling size until the
    /// client is full. Returns the next increment, or zero when the edge is
    /// exhausted.
    fn fill_to_full(
        &mut self,
        direction: Direction,
        mut increment: usize,
        host: &dyn HostScheduler,
    ) -> Result<usize> {
        let mut realized = 0;
        while !self.is_client_full(direction) {
            if realized >= self.config.max_items_per_pass {
                log::warn!(
                    "recycler {}: realized {} items toward {:?} without filling the client; \
                     stopping this pass",
                    self.id,
                    realized,
                    direction
                );
                return Ok(0);
            }
            let limit = increment.min(self.config.max_items_per_pass - realized);
            let added = self.run_batch(direction, limit, Goal::Visible, host)?;
            if added == 0 {
                return Ok(0);
            }
            realized += added;
            increment = increment.saturating_mul(2);
        }
        Ok(increment)
    }

    /// Covers the visible region toward both edges. Returns, per edge, the
    /// increment to prefetch with, or `None` when that edge needs no prefetch.
    fn fill_visible(
        &mut self,
        generation: u64,
        host: &dyn HostScheduler,
    ) -> Result<[(Direction, Option<usize>); 2]> {
        let initial = self.config.initial_increment;
        let mut start = None;
        if !self.window.is_empty() {
            if self.rebase_origin() {
                self.position_window()?;
            }
            self.state = EngineState::Filling(Direction::Start);
            let increment = self.fill_to_full(Direction::Start, initial, host)?;
            if increment > 0 && !self.has_enough_content(Direction::Start) {
                start = Some(increment);
            }
        }
        self.state = EngineState::Filling(Direction::End);
        let increment = self.fill_to_full(Direction::End, initial, host)?;
        let end = Some(increment).filter(|increment| *increment > 0);
        self.painted = Some(generation);
        Ok([(Direction::Start, start), (Direction::End, end)])
    }

    /// Batch size for an idle slice: as many items as the budget pays for at
    /// the last measured unit cost, between one and `increment`.
    fn prefetch_increment(&self, budget: Duration, increment: usize) -> usize {
        match self.unit_cost {
            Some(cost) if !cost.is_zero() => {
                let affordable = budget.as_nanos() / cost.as_nanos();
                usize::try_from(affordable)
                    .unwrap_or(usize::MAX)
                    .clamp(1, increment)
            }
            _ => increment,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state != EngineState::Unmounted
    }

    fn abandon(&mut self, generation: u64) {
        self.stats.jobs_superseded += 1;
        log::debug!(
            "recycler {}: job {} superseded by {}",
            self.id,
            generation,
            self.generation
        );
    }
}

/// Handle to a view-recycling engine.
///
/// Cloning the handle shares the engine. All state is single-threaded.
pub struct Recycler<P: RecyclePolicy> {
    inner: Rc<RefCell<Inner<P>>>,
    host: Rc<dyn HostScheduler>,
}

impl<P: RecyclePolicy> Clone for Recycler<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            host: Rc::clone(&self.host),
        }
    }
}

impl<P: RecyclePolicy> fmt::Debug for Recycler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Recycler")
                .field("id", &inner.id)
                .field("state", &inner.state)
                .field("generation", &inner.generation)
                .field("window", &inner.window.len())
                .finish(),
            Err(_) => f.debug_struct("Recycler").finish_non_exhaustive(),
        }
    }
}

/// Builder for [`Recycler`]; validates the configuration on [`build`](Self::build).
pub struct RecyclerBuilder<P: RecyclePolicy> {
    policy: P,
    host: Rc<dyn HostScheduler>,
    pool: Option<SharedPool<P::Item>>,
    config: RecyclerConfig,
    reserved: SmallVec<[Variant; 4]>,
}

impl<P: RecyclePolicy> RecyclerBuilder<P> {
    /// Shares `pool` with other engines. Variants reserved through
    /// [`reserve_variant`](Self::reserve_variant) are claimed at build time.
    pub fn pool(mut self, pool: SharedPool<P::Item>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn config(mut self, config: RecyclerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn initial_increment(mut self, increment: usize) -> Self {
        self.config.initial_increment = increment;
        self
    }

    pub fn default_item_size(mut self, size: f32) -> Self {
        self.config.default_item_size = size;
        self
    }

    pub fn max_items_per_pass(mut self, max: usize) -> Self {
        self.config.max_items_per_pass = max;
        self
    }

    /// Claims `variant` for this engine up front.
    pub fn reserve_variant(mut self, variant: Variant) -> Self {
        if !self.reserved.contains(&variant) {
            self.reserved.push(variant);
        }
        self
    }

    pub fn build(self) -> Result<Recycler<P>> {
        self.config.validate()?;
        let id = EngineId::next();
        let pool = self
            .pool
            .unwrap_or_else(|| Rc::new(RefCell::new(Pool::new())));
        {
            let mut pool_ref = pool.try_borrow_mut().map_err(|_| {
                RecyclerError::invalid("shared pool is borrowed while building an engine")
            })?;
            for variant in &self.reserved {
                if let Err(err) = pool_ref.claim(*variant, id) {
                    pool_ref.release(id);
                    return Err(RecyclerError::invalid(err.to_string()));
                }
            }
        }
        let inner = Inner {
            id,
            policy: self.policy,
            window: Window::new(),
            metas: MetaStore::new(),
            pool,
            config: self.config,
            state: EngineState::Unmounted,
            generation: 0,
            painted: None,
            revision: 0,
            unit_cost: None,
            measured_total: 0.0,
            measured_count: 0,
            stats: RecyclerStats::default(),
        };
        Ok(Recycler {
            inner: Rc::new(RefCell::new(inner)),
            host: self.host,
        })
    }
}

impl<P> Recycler<P>
where
    P: RecyclePolicy + 'static,
    P::Item: 'static,
{
    pub fn builder(policy: P, host: Rc<dyn HostScheduler>) -> RecyclerBuilder<P> {
        RecyclerBuilder {
            policy,
            host,
            pool: None,
            config: RecyclerConfig::default(),
            reserved: SmallVec::new(),
        }
    }

    /// Builds an engine with its own pool and the default configuration.
    pub fn new(policy: P, host: Rc<dyn HostScheduler>) -> Result<Self> {
        Self::builder(policy, host).build()
    }

    /// Starts a new fill sequence.
    ///
    /// The generation is bumped immediately, so any job still suspended from
    /// an earlier call stops at its next suspension point. The returned job
    /// must be polled (usually by spawning it on the host runtime) to make
    /// progress.
    pub fn recycle(&self) -> RecycleJob {
        let generation = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == EngineState::Unmounted {
                return RecycleJob::ready(Ok(RecycleOutcome::Unmounted));
            }
            inner.generation += 1;
            inner.generation
        };
        let engine = Rc::downgrade(&self.inner);
        let host = Rc::clone(&self.host);
        RecycleJob {
            future: Box::pin(run_job(engine, host, generation)),
        }
    }

    pub fn mount(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == EngineState::Unmounted {
            inner.state = EngineState::Idle;
            log::debug!("recycler {}: mounted", inner.id);
        }
    }

    /// Cancels any running job and parks every realized item in the pool.
    /// Cached metadata is kept for the next mount.
    pub fn unmount(&self) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if inner.state == EngineState::Unmounted {
            return;
        }
        inner.generation += 1;
        inner.state = EngineState::Unmounted;
        let slots: Vec<_> = inner.window.drain().collect();
        let count = slots.len();
        for mut slot in slots {
            inner.policy.detach(slot.item_mut());
            inner.park(slot);
        }
        inner.stats.evicted += count as u64;
        inner.revision += 1;
        log::debug!("recycler {}: unmounted, parked {} items", inner.id, count);
    }
}

impl<P: RecyclePolicy> Recycler<P> {
    pub fn id(&self) -> EngineId {
        self.inner.borrow().id
    }

    pub fn state(&self) -> EngineState {
        self.inner.borrow().state
    }

    pub fn is_mounted(&self) -> bool {
        self.state() != EngineState::Unmounted
    }

    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    /// Whether the latest job has covered the visible region. Its prefetch
    /// may still be running.
    pub fn is_painted(&self) -> bool {
        let inner = self.inner.borrow();
        inner.state != EngineState::Unmounted && inner.painted == Some(inner.generation)
    }

    /// Counter that changes whenever realized items or their offsets change.
    pub fn revision(&self) -> u64 {
        self.inner.borrow().revision
    }

    pub fn config(&self) -> RecyclerConfig {
        self.inner.borrow().config.clone()
    }

    pub fn pool(&self) -> SharedPool<P::Item> {
        Rc::clone(&self.inner.borrow().pool)
    }

    /// Logical indices of the window, first to last.
    pub fn window_indices(&self) -> Vec<usize> {
        let inner = self.inner.borrow();
        inner.window.indices(&inner.metas).collect()
    }

    /// Metadata of every realized item, first to last.
    pub fn window_metas(&self) -> Vec<Meta> {
        let inner = self.inner.borrow();
        inner
            .window
            .iter()
            .map(|slot| *inner.metas.record(slot.meta_id()))
            .collect()
    }

    /// Visits every realized item with its metadata, first to last.
    pub fn with_window(&self, mut f: impl FnMut(&P::Item, &Meta)) {
        let inner = self.inner.borrow();
        for slot in inner.window.iter() {
            f(slot.item(), inner.metas.record(slot.meta_id()));
        }
    }

    pub fn window_len(&self) -> usize {
        self.inner.borrow().window.len()
    }

    pub fn extent(&self) -> WindowExtent {
        self.inner.borrow().extent()
    }

    /// Cached metadata for `index`, if it was ever realized.
    pub fn meta_for_index(&self, index: usize) -> Option<Meta> {
        self.inner.borrow().metas.get_by_index(index).copied()
    }

    /// Whether `index` has cached metadata.
    pub fn has_meta(&self, index: usize) -> bool {
        self.inner.borrow().metas.has_index(index)
    }

    /// Handle of the metadata record for `index`, stable across eviction.
    pub fn meta_id_for_index(&self, index: usize) -> Option<crate::meta::MetaId> {
        self.inner.borrow().metas.id_for_index(index)
    }

    /// Running average of measured sizes, or the configured default.
    pub fn average_item_size(&self) -> f32 {
        self.inner.borrow().average_item_size()
    }

    /// Predicted length of the whole sequence along the axis.
    pub fn estimated_extent(&self) -> f32 {
        let inner = self.inner.borrow();
        inner.average_item_size() * inner.policy.size() as f32
    }

    /// Cost of one item in the most recent batch.
    pub fn unit_cost(&self) -> Option<Duration> {
        self.inner.borrow().unit_cost
    }

    pub fn stats(&self) -> RecyclerStats {
        let inner = self.inner.borrow();
        let items_in_pool = inner.pool.borrow().len();
        RecyclerStats {
            items_in_window: inner.window.len(),
            items_in_pool,
            ..inner.stats
        }
    }

    pub fn with_policy<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.inner.borrow().policy)
    }

    /// Mutates the policy, e.g. to feed it a new scroll position before the
    /// next `recycle()`.
    pub fn with_policy_mut<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.inner.borrow_mut().policy)
    }

    /// Verifies the window invariants: contiguous increasing indices, no gaps
    /// or overlaps between neighbors, and no item both realized and pooled.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let inner = self.inner.borrow();
        let pool = inner.pool.borrow();
        let mut previous: Option<Meta> = None;
        for slot in inner.window.iter() {
            let meta = *inner.metas.record(slot.meta_id());
            if inner.metas.binding(slot.id()) != Some(slot.meta_id()) {
                return Err(format!("item {:?} is not bound to its metadata", slot.id()));
            }
            if pool.contains(slot.id()) {
                return Err(format!("item {:?} is both realized and pooled", slot.id()));
            }
            if let Some(prev) = previous {
                if meta.index != prev.index + 1 {
                    return Err(format!(
                        "window indices not contiguous: {} followed by {}",
                        prev.index, meta.index
                    ));
                }
                let gap = (meta.offset - prev.end()).abs();
                if gap > 1e-3 * prev.end().abs().max(1.0) {
                    return Err(format!(
                        "index {} starts at {} but index {} ends at {}",
                        meta.index,
                        meta.offset,
                        prev.index,
                        prev.end()
                    ));
                }
            }
            previous = Some(meta);
        }
        Ok(())
    }
}

async fn run_job<P>(
    engine: Weak<RefCell<Inner<P>>>,
    host: Rc<dyn HostScheduler>,
    generation: u64,
) -> Result<RecycleOutcome>
where
    P: RecyclePolicy + 'static,
{
    let result = drive(&engine, host.as_ref(), generation).await;
    if let Err(err) = &result {
        if let Some(inner) = engine.upgrade() {
            let mut inner = inner.borrow_mut();
            if inner.is_current(generation) {
                inner.state = EngineState::Idle;
            }
            log::warn!("recycler {}: job {} failed: {}", inner.id, generation, err);
        }
    }
    result
}

async fn drive<P>(
    engine: &Weak<RefCell<Inner<P>>>,
    host: &dyn HostScheduler,
    generation: u64,
) -> Result<RecycleOutcome>
where
    P: RecyclePolicy + 'static,
{
    host.next_paint().await;

    let prefetch = {
        let Some(inner) = engine.upgrade() else {
            return Ok(RecycleOutcome::Superseded);
        };
        let mut inner = inner.borrow_mut();
        if !inner.is_current(generation) {
            inner.abandon(generation);
            return Ok(RecycleOutcome::Superseded);
        }
        inner.fill_visible(generation, host)?
    };

    for (direction, increment) in prefetch {
        let Some(increment) = increment else {
            continue;
        };
        if let Flow::Abandoned = fill(engine, host, direction, increment, generation).await? {
            return Ok(RecycleOutcome::Superseded);
        }
    }

    let Some(inner) = engine.upgrade() else {
        return Ok(RecycleOutcome::Superseded);
    };
    let mut inner = inner.borrow_mut();
    inner.state = EngineState::Idle;
    inner.stats.jobs_completed += 1;
    log::debug!(
        "recycler {}: job {} completed with {} items (indices {:?}..={:?})",
        inner.id,
        generation,
        inner.window.len(),
        inner.window.first().map(|slot| inner.metas.record(slot.meta_id()).index),
        inner.window.last().map(|slot| inner.metas.record(slot.meta_id()).index),
    );
    Ok(RecycleOutcome::Completed)
}

/// Prefetch toward one edge: extend the buffer one idle slice at a time,
/// topping up the visible region synchronously whenever it falls short.
async fn fill<P>(
    engine: &Weak<RefCell<Inner<P>>>,
    host: &dyn HostScheduler,
    direction: Direction,
    mut increment: usize,
    generation: u64,
) -> Result<Flow>
where
    P: RecyclePolicy + 'static,
{
    loop {
        let needs_prefetch = {
            let Some(inner) = engine.upgrade() else {
                return Ok(Flow::Abandoned);
            };
            let mut inner = inner.borrow_mut();
            if !inner.is_current(generation) {
                inner.abandon(generation);
                return Ok(Flow::Abandoned);
            }
            inner.state = EngineState::Filling(direction);
            increment = inner.fill_to_full(direction, increment, host)?;
            increment > 0 && !inner.has_enough_content(direction)
        };
        if !needs_prefetch {
            return Ok(Flow::Continue);
        }

        let budget = host.idle_budget().await;

        let Some(inner) = engine.upgrade() else {
            return Ok(Flow::Abandoned);
        };
        let mut inner = inner.borrow_mut();
        if !inner.is_current(generation) {
            inner.abandon(generation);
            return Ok(Flow::Abandoned);
        }
        let next = inner.prefetch_increment(budget.remaining(), increment);
        log::trace!(
            "recycler {}: idle slice of {:?} buys {} items toward {:?}",
            inner.id,
            budget.remaining(),
            next,
            direction
        );
        let added = inner.run_batch(direction, next, Goal::Prefetch, host)?;
        if added == 0 {
            return Ok(Flow::Continue);
        }
        increment = next.saturating_mul(2);
    }
}

/// Future returned by [`Recycler::recycle`].
#[must_use = "a recycle job does nothing unless polled or spawned"]
pub struct RecycleJob {
    future: LocalBoxFuture<Result<RecycleOutcome>>,
}

impl RecycleJob {
    fn ready(result: Result<RecycleOutcome>) -> Self {
        Self {
            future: Box::pin(std::future::ready(result)),
        }
    }
}

impl Future for RecycleJob {
    type Output = Result<RecycleOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

#[cfg(test)]
#[path = "tests/recycler_tests.rs"]
mod tests;
