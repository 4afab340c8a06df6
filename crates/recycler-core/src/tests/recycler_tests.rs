use super::*;
use crate::collections::map::HashMap;
use crate::{Anchor, ManualClock, TestRuntime};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Measure(usize),
    Position(usize),
    Detach,
}

#[derive(Debug)]
struct View {
    serial: usize,
    variant: Variant,
    bound: Option<usize>,
    offset: Option<f32>,
    attached: bool,
}

/// Vertical list over a scrollable viewport.
struct ListPolicy {
    size: usize,
    item_size: f32,
    overrides: HashMap<usize, f32>,
    scroll: f32,
    viewport: f32,
    buffer: f32,
    full_at_len: Option<usize>,
    header_every: Option<usize>,
    allocate_limit: Option<usize>,
    allocated: usize,
    cost: Option<(Rc<ManualClock>, Duration)>,
    follow_rebase: bool,
    rebased: Vec<f32>,
    events: Rc<RefCell<Vec<Event>>>,
}

impl ListPolicy {
    fn new(size: usize, item_size: f32, viewport: f32) -> Self {
        Self {
            size,
            item_size,
            overrides: HashMap::default(),
            scroll: 0.0,
            viewport,
            buffer: 0.0,
            full_at_len: None,
            header_every: None,
            allocate_limit: None,
            allocated: 0,
            cost: None,
            follow_rebase: false,
            rebased: Vec::new(),
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn size_of(&self, index: usize) -> f32 {
        self.overrides
            .get(&index)
            .copied()
            .unwrap_or(self.item_size)
    }

    fn covers(&self, direction: Direction, extent: &WindowExtent, reach: f32) -> bool {
        if self.size == 0 {
            return true;
        }
        if self.full_at_len.is_some_and(|limit| extent.len >= limit) {
            return true;
        }
        match direction {
            Direction::End => {
                extent.at_last_index(self.size)
                    || extent
                        .end()
                        .is_some_and(|end| end >= self.scroll + self.viewport + reach)
            }
            Direction::Start => {
                extent.at_first_index()
                    || extent
                        .start()
                        .is_some_and(|start| start <= self.scroll - reach)
            }
        }
    }
}

impl RecyclePolicy for ListPolicy {
    type Item = View;

    fn size(&self) -> usize {
        self.size
    }

    fn variant_for(&self, index: usize) -> Variant {
        match self.header_every {
            Some(every) if index % every == 0 => Variant::named("header"),
            _ => Variant::DEFAULT,
        }
    }

    fn should_recycle(&self, _item: &View, meta: &Meta) -> bool {
        meta.end() < self.scroll - self.buffer
            || meta.offset > self.scroll + self.viewport + self.buffer
    }

    fn is_client_full(&self, direction: Direction, extent: &WindowExtent) -> bool {
        self.covers(direction, extent, 0.0)
    }

    fn has_enough_content(&self, direction: Direction, extent: &WindowExtent) -> bool {
        self.covers(direction, extent, self.buffer)
    }

    fn measure(&mut self, index: usize, item: &mut View) -> Result<f32> {
        if let Some((clock, cost)) = &self.cost {
            clock.advance(*cost);
        }
        item.bound = Some(index);
        item.attached = true;
        self.events.borrow_mut().push(Event::Measure(index));
        Ok(self.size_of(index))
    }

    fn position(&mut self, item: &mut View, meta: &Meta) -> Result<()> {
        item.offset = Some(meta.offset);
        self.events.borrow_mut().push(Event::Position(meta.index));
        Ok(())
    }

    fn allocate(&mut self, variant: Variant) -> Result<Option<View>> {
        if self
            .allocate_limit
            .is_some_and(|limit| self.allocated >= limit)
        {
            return Ok(None);
        }
        self.allocated += 1;
        Ok(Some(View {
            serial: self.allocated,
            variant,
            bound: None,
            offset: None,
            attached: false,
        }))
    }

    fn detach(&mut self, item: &mut View) {
        item.attached = false;
        self.events.borrow_mut().push(Event::Detach);
    }

    fn anchor(&self, average_size: f32) -> Anchor {
        let index = (self.scroll / average_size).floor() as usize;
        Anchor::with_offset(index, index as f32 * average_size)
    }

    fn rebase(&mut self, delta: f32) {
        self.rebased.push(delta);
        if self.follow_rebase {
            self.scroll = (self.scroll + delta).max(0.0);
        }
    }
}

type Outcome = Rc<RefCell<Option<Result<RecycleOutcome>>>>;

fn engine(runtime: &TestRuntime, policy: ListPolicy) -> Recycler<ListPolicy> {
    let recycler = Recycler::builder(policy, runtime.host())
        .build()
        .expect("valid configuration");
    recycler.mount();
    recycler
}

fn spawn(runtime: &TestRuntime, job: RecycleJob) -> Outcome {
    let outcome: Outcome = Rc::new(RefCell::new(None));
    let captured = Rc::clone(&outcome);
    runtime
        .handle()
        .spawn_ui(async move {
            let result = job.await;
            *captured.borrow_mut() = Some(result);
        })
        .expect("runtime alive");
    runtime.handle().drain_ui();
    outcome
}

fn take(outcome: &Outcome) -> Option<Result<RecycleOutcome>> {
    outcome.borrow_mut().take()
}

/// Paints once, then grants generous idle slices until the job settles.
fn run_to_completion(runtime: &TestRuntime, recycler: &Recycler<ListPolicy>) -> RecycleOutcome {
    let outcome = spawn(runtime, recycler.recycle());
    runtime.paint();
    for _ in 0..64 {
        if outcome.borrow().is_some() {
            break;
        }
        runtime.idle(Duration::from_millis(100));
    }
    take(&outcome)
        .expect("job settled")
        .expect("job succeeded")
}

#[test]
fn first_recycle_fills_until_client_full() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(1000, 10.0, 1.0e9);
    policy.full_at_len = Some(10);
    for index in 0..10 {
        policy.overrides.insert(index, 10.0 + index as f32);
    }
    let events = Rc::clone(&policy.events);
    let recycler = engine(&runtime, policy);

    let outcome = spawn(&runtime, recycler.recycle());
    assert_eq!(recycler.window_len(), 0, "nothing happens before the paint");
    runtime.paint();

    assert_eq!(take(&outcome), Some(Ok(RecycleOutcome::Completed)));
    assert_eq!(recycler.window_indices(), (0..10).collect::<Vec<_>>());
    let mut expected_offset = 0.0;
    for meta in recycler.window_metas() {
        assert_eq!(meta.offset, expected_offset, "offset of index {}", meta.index);
        assert_eq!(meta.size, 10.0 + meta.index as f32);
        expected_offset += meta.size;
    }
    let mut serials = Vec::new();
    recycler.with_window(|view, meta| {
        assert_eq!(view.bound, Some(meta.index));
        assert_eq!(view.offset, Some(meta.offset));
        assert!(view.attached);
        serials.push(view.serial);
    });
    assert_eq!(serials, (1..=10).collect::<Vec<_>>());
    assert_eq!(recycler.state(), EngineState::Idle);
    recycler.check_invariants().expect("window invariants");

    use Event::{Measure as M, Position as P};
    assert_eq!(
        *events.borrow(),
        vec![
            M(0),
            P(0),
            M(1),
            M(2),
            P(1),
            P(2),
            M(3),
            M(4),
            M(5),
            M(6),
            P(3),
            P(4),
            P(5),
            P(6),
            M(7),
            M(8),
            M(9),
            P(7),
            P(8),
            P(9),
        ],
        "every batch measures all of its items before positioning any"
    );
}

#[test]
fn metadata_survives_eviction() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(1000, 20.0, 110.0);
    policy.overrides.insert(5, 40.0);
    let recycler = engine(&runtime, policy);

    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
    assert_eq!(recycler.window_indices(), (0..6).collect::<Vec<_>>());
    assert_eq!(recycler.meta_for_index(5), Some(Meta::new(5, 40.0, 100.0)));
    let handle = recycler.meta_id_for_index(5).expect("index 5 realized");

    recycler.with_policy_mut(|policy| policy.scroll = 5000.0);
    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
    assert!(!recycler.window_indices().contains(&5));
    assert!(recycler.stats().reused > 0, "evicted views are reused");
    assert!(recycler.has_meta(5));

    recycler.with_policy_mut(|policy| policy.scroll = 0.0);
    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
    assert!(recycler.window_indices().contains(&5));
    assert_eq!(recycler.meta_id_for_index(5), Some(handle));
    assert_eq!(recycler.meta_for_index(5).map(|meta| meta.size), Some(40.0));
    recycler.check_invariants().expect("window invariants");
}

#[test]
fn idle_batches_are_bounded_by_budget_and_increment() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(1000, 10.0, 100.0);
    policy.buffer = 1000.0;
    policy.cost = Some((runtime.clock(), Duration::from_millis(1)));
    let recycler = engine(&runtime, policy);

    let outcome = spawn(&runtime, recycler.recycle());
    runtime.paint();
    assert_eq!(recycler.window_len(), 10);
    assert_eq!(recycler.unit_cost(), Some(Duration::from_millis(1)));
    assert!(outcome.borrow().is_none(), "prefetch still pending");

    // Three milliseconds at one millisecond per item.
    runtime.idle(Duration::from_millis(3));
    assert_eq!(recycler.window_len(), 13);

    // A large budget is capped by the doubled increment.
    runtime.idle(Duration::from_millis(100));
    assert_eq!(recycler.window_len(), 19);

    // A tiny budget still buys one item.
    runtime.idle(Duration::from_micros(10));
    assert_eq!(recycler.window_len(), 20);

    for _ in 0..32 {
        if outcome.borrow().is_some() {
            break;
        }
        runtime.idle(Duration::from_millis(100));
    }
    assert_eq!(take(&outcome), Some(Ok(RecycleOutcome::Completed)));
    let extent = recycler.extent();
    assert!(extent.end().is_some_and(|end| end >= 1100.0));
    recycler.check_invariants().expect("window invariants");
}

#[test]
fn newer_recycle_supersedes_the_pending_one() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(1000, 10.0, 100.0);
    policy.buffer = 1000.0;
    policy.cost = Some((runtime.clock(), Duration::from_millis(1)));
    let recycler = engine(&runtime, policy);

    let first = spawn(&runtime, recycler.recycle());
    runtime.paint();
    assert_eq!(recycler.window_len(), 10);

    let second = spawn(&runtime, recycler.recycle());
    assert_eq!(recycler.generation(), 2);
    runtime.paint();
    assert_eq!(recycler.window_len(), 10);

    runtime.idle(Duration::from_millis(3));
    assert_eq!(take(&first), Some(Ok(RecycleOutcome::Superseded)));
    assert_eq!(
        recycler.window_len(),
        11,
        "only the current job extends the window"
    );

    for _ in 0..32 {
        if second.borrow().is_some() {
            break;
        }
        runtime.idle(Duration::from_millis(100));
    }
    assert_eq!(take(&second), Some(Ok(RecycleOutcome::Completed)));
    let stats = recycler.stats();
    assert_eq!(stats.jobs_completed, 1);
    assert_eq!(stats.jobs_superseded, 1);
    recycler.check_invariants().expect("window invariants");
}

#[test]
fn recycle_before_paint_discards_the_older_job() {
    let runtime = TestRuntime::new();
    let policy = ListPolicy::new(100, 10.0, 50.0);
    let events = Rc::clone(&policy.events);
    let recycler = engine(&runtime, policy);

    let first = spawn(&runtime, recycler.recycle());
    let second = spawn(&runtime, recycler.recycle());
    runtime.paint();

    assert_eq!(take(&first), Some(Ok(RecycleOutcome::Superseded)));
    assert_eq!(take(&second), Some(Ok(RecycleOutcome::Completed)));
    let measured = events
        .borrow()
        .iter()
        .filter(|event| matches!(event, Event::Measure(_)))
        .count();
    assert_eq!(measured, recycler.window_len());
}

#[test]
fn window_stays_contiguous_while_scrolling() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(1000, 10.0, 200.0);
    policy.buffer = 100.0;
    for index in 0..1000 {
        policy.overrides.insert(index, 10.0 + (index % 7) as f32);
    }
    let recycler = engine(&runtime, policy);

    for scroll in [0.0, 350.0, 5000.0, 4800.0, 120.0, 9000.0, 0.0, 2500.0, 2490.0] {
        recycler.with_policy_mut(|policy| policy.scroll = scroll);
        assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
        recycler
            .check_invariants()
            .unwrap_or_else(|err| panic!("scroll {scroll}: {err}"));

        let metas = recycler.window_metas();
        let first = metas.first().expect("window not empty");
        let last = metas.last().expect("window not empty");
        assert!(first.index == 0 || first.offset <= scroll + 0.01, "scroll {scroll}");
        assert!(
            last.index == 999 || last.end() >= scroll + 200.0,
            "scroll {scroll}"
        );

        let stats = recycler.stats();
        let pool = recycler.pool();
        let pool = pool.borrow();
        assert_eq!(stats.items_in_pool, pool.len());
        assert_eq!(
            stats.allocated as usize,
            stats.items_in_window + stats.items_in_pool,
            "every allocated view is either realized or pooled"
        );
    }
}

#[test]
fn variants_are_reused_only_for_their_own_kind() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(500, 10.0, 100.0);
    policy.header_every = Some(5);
    let recycler = engine(&runtime, policy);

    for scroll in [0.0, 400.0, 1200.0, 30.0, 2500.0] {
        recycler.with_policy_mut(|policy| policy.scroll = scroll);
        run_to_completion(&runtime, &recycler);
        recycler.with_window(|view, meta| {
            let expected = if meta.index % 5 == 0 {
                Variant::named("header")
            } else {
                Variant::DEFAULT
            };
            assert_eq!(view.variant, expected, "index {}", meta.index);
        });
    }
    assert!(recycler.stats().reused > 0);
}

#[test]
fn declined_allocation_ends_the_fill() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(100, 10.0, 100.0);
    policy.allocate_limit = Some(4);
    let recycler = engine(&runtime, policy);

    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
    assert_eq!(recycler.window_indices(), vec![0, 1, 2, 3]);
    assert_eq!(recycler.stats().allocated, 4);
}

#[test]
fn empty_sequence_completes_with_empty_window() {
    let runtime = TestRuntime::new();
    let recycler = engine(&runtime, ListPolicy::new(0, 10.0, 100.0));
    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
    assert_eq!(recycler.window_len(), 0);
    assert_eq!(recycler.estimated_extent(), 0.0);
}

#[test]
fn short_sequence_stops_at_last_index() {
    let runtime = TestRuntime::new();
    let recycler = engine(&runtime, ListPolicy::new(3, 10.0, 100.0));
    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
    assert_eq!(recycler.window_indices(), vec![0, 1, 2]);
    assert_eq!(recycler.estimated_extent(), 30.0);
}

#[test]
fn unmount_parks_everything_and_cancels_the_job() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(1000, 10.0, 100.0);
    policy.buffer = 500.0;
    let recycler = engine(&runtime, policy);

    let outcome = spawn(&runtime, recycler.recycle());
    runtime.paint();
    let realized = recycler.window_len();
    assert!(realized > 0);

    recycler.unmount();
    assert_eq!(recycler.state(), EngineState::Unmounted);
    assert_eq!(recycler.window_len(), 0);
    assert_eq!(recycler.stats().items_in_pool, realized);

    runtime.idle(Duration::from_millis(100));
    assert_eq!(take(&outcome), Some(Ok(RecycleOutcome::Superseded)));
    assert_eq!(recycler.window_len(), 0);

    let refused = spawn(&runtime, recycler.recycle());
    assert_eq!(take(&refused), Some(Ok(RecycleOutcome::Unmounted)));

    let allocated = recycler.stats().allocated;
    recycler.mount();
    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
    let stats = recycler.stats();
    assert!(stats.reused >= realized as u64);
    assert!(stats.allocated >= allocated);
    recycler.check_invariants().expect("window invariants");
}

#[test]
fn average_size_tracks_measurements() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(10, 30.0, 1000.0);
    policy.overrides.insert(0, 10.0);
    let recycler = engine(&runtime, policy);
    assert_eq!(recycler.average_item_size(), DEFAULT_ITEM_SIZE_ESTIMATE);

    run_to_completion(&runtime, &recycler);
    assert_eq!(recycler.average_item_size(), 28.0);
    assert_eq!(recycler.estimated_extent(), 280.0);
}

#[test]
fn shared_pool_rejects_conflicting_reservations() {
    let runtime = TestRuntime::new();
    let pool = Pool::shared();
    let row = Variant::named("row");

    let rows = Recycler::builder(ListPolicy::new(10, 10.0, 100.0), runtime.host())
        .pool(Rc::clone(&pool))
        .reserve_variant(row)
        .build()
        .expect("first reservation");

    let err = Recycler::builder(ListPolicy::new(10, 10.0, 100.0), runtime.host())
        .pool(Rc::clone(&pool))
        .reserve_variant(row)
        .build()
        .expect_err("variant already owned");
    assert!(matches!(err, RecyclerError::InvalidConfiguration(_)));

    drop(rows);
    assert_eq!(pool.borrow().owner_of(row), None);
    Recycler::builder(ListPolicy::new(10, 10.0, 100.0), runtime.host())
        .pool(pool)
        .reserve_variant(row)
        .build()
        .expect("released on drop");
}

#[test]
fn engines_sharing_a_variant_fail_the_second_job() {
    let runtime = TestRuntime::new();
    let pool = Pool::shared();
    let first = Recycler::builder(ListPolicy::new(10, 10.0, 100.0), runtime.host())
        .pool(Rc::clone(&pool))
        .build()
        .expect("valid");
    let second = Recycler::builder(ListPolicy::new(10, 10.0, 100.0), runtime.host())
        .pool(pool)
        .build()
        .expect("valid");
    first.mount();
    second.mount();

    assert_eq!(run_to_completion(&runtime, &first), RecycleOutcome::Completed);

    let outcome = spawn(&runtime, second.recycle());
    runtime.paint();
    assert_eq!(
        take(&outcome),
        Some(Err(RecyclerError::VariantConflict {
            variant: Variant::DEFAULT,
            owner: first.id(),
        }))
    );
    assert_eq!(second.state(), EngineState::Idle);
}

#[test]
fn invalid_configuration_is_rejected() {
    let runtime = TestRuntime::new();
    let err = Recycler::builder(ListPolicy::new(10, 10.0, 100.0), runtime.host())
        .initial_increment(0)
        .build()
        .expect_err("zero increment");
    assert!(matches!(err, RecyclerError::InvalidConfiguration(_)));

    let err = Recycler::builder(ListPolicy::new(10, 10.0, 100.0), runtime.host())
        .default_item_size(f32::NAN)
        .build()
        .expect_err("nan size");
    assert!(matches!(err, RecyclerError::InvalidConfiguration(_)));
}

struct Bare;

impl RecyclePolicy for Bare {
    type Item = ();

    fn size(&self) -> usize {
        5
    }

    fn should_recycle(&self, _item: &(), _meta: &Meta) -> bool {
        false
    }

    fn is_client_full(&self, _direction: Direction, extent: &WindowExtent) -> bool {
        extent.len >= 5
    }

    fn has_enough_content(&self, direction: Direction, extent: &WindowExtent) -> bool {
        self.is_client_full(direction, extent)
    }
}

#[test]
fn missing_policy_capability_surfaces_as_error() {
    let runtime = TestRuntime::new();
    let recycler = Recycler::new(Bare, runtime.host()).expect("valid");
    recycler.mount();

    let outcome = spawn(&runtime, recycler.recycle());
    runtime.paint();
    assert_eq!(
        take(&outcome),
        Some(Err(RecyclerError::Unimplemented {
            capability: "allocate"
        }))
    );
    assert_eq!(recycler.state(), EngineState::Idle);
    assert_eq!(recycler.window_len(), 0);
}

#[test]
fn pass_cap_stops_a_policy_that_is_never_full() {
    let runtime = TestRuntime::new();
    let policy = ListPolicy::new(100_000, 0.0, 100.0);
    let recycler = Recycler::builder(policy, runtime.host())
        .max_items_per_pass(64)
        .build()
        .expect("valid");
    recycler.mount();

    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
    assert_eq!(recycler.window_len(), 64);
}

#[test]
fn painted_once_the_visible_region_is_covered() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(1000, 10.0, 100.0);
    policy.buffer = 100.0;
    let recycler = engine(&runtime, policy);
    let initial = recycler.revision();

    let outcome = spawn(&runtime, recycler.recycle());
    assert!(!recycler.is_painted());
    runtime.paint();

    assert!(recycler.is_painted());
    assert!(outcome.borrow().is_none(), "prefetch still pending");
    let painted = recycler.revision();
    assert!(painted > initial);

    runtime.idle(Duration::from_millis(100));
    assert!(recycler.revision() > painted, "prefetch batches bump the revision");

    let _next = spawn(&runtime, recycler.recycle());
    assert!(!recycler.is_painted(), "the newer job has not painted yet");
    runtime.paint();
    assert!(recycler.is_painted());
    assert_eq!(take(&outcome), Some(Ok(RecycleOutcome::Superseded)));

    let before = recycler.revision();
    recycler.unmount();
    assert!(!recycler.is_painted());
    assert!(recycler.revision() > before);
}

#[test]
fn scrolling_back_after_a_jump_puts_index_zero_at_the_origin() {
    let runtime = TestRuntime::new();
    let mut policy = ListPolicy::new(1000, 20.0, 400.0);
    policy.buffer = 100.0;
    policy.follow_rebase = true;
    for index in 0..50 {
        policy.overrides.insert(index, 100.0);
    }
    let recycler = engine(&runtime, policy);
    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);

    // The estimate from the tall leading items places index 100 far too low.
    recycler.with_policy_mut(|policy| policy.scroll = 10_000.0);
    assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
    assert_eq!(recycler.window_indices().first(), Some(&100));

    for _ in 0..200 {
        if recycler.with_policy(|policy| policy.scroll) == 0.0 {
            break;
        }
        recycler.with_policy_mut(|policy| policy.scroll = (policy.scroll - 300.0).max(0.0));
        assert_eq!(run_to_completion(&runtime, &recycler), RecycleOutcome::Completed);
        recycler.check_invariants().expect("window invariants");
    }

    assert_eq!(recycler.with_policy(|policy| policy.scroll), 0.0);
    let metas = recycler.window_metas();
    assert_eq!(metas.first(), Some(&Meta::new(0, 100.0, 0.0)));
    assert!(metas.last().is_some_and(|last| last.end() >= 400.0));
    assert!(recycler.with_policy(|policy| !policy.rebased.is_empty()));
}
