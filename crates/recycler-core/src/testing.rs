//! Hand-driven host for tests: frames and idle slices only happen when a test
//! asks for them, on a clock that only moves when a test advances it.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use web_time::{Duration, Instant};

use crate::platform::{Clock, HostScheduler, RuntimeScheduler};
use crate::runtime::{Runtime, RuntimeHandle};

/// Scheduler that only counts requests.
#[derive(Default)]
pub struct TestScheduler {
    frames: AtomicUsize,
    idles: AtomicUsize,
}

impl TestScheduler {
    pub fn frame_requests(&self) -> usize {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn idle_requests(&self) -> usize {
        self.idles.load(Ordering::Relaxed)
    }
}

impl RuntimeScheduler for TestScheduler {
    fn schedule_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn schedule_idle(&self) {
        self.idles.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Time advanced since the clock was created.
    pub fn elapsed_total(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

/// [`Runtime`] over a [`TestScheduler`] and a [`ManualClock`].
pub struct TestRuntime {
    runtime: Runtime,
    scheduler: Arc<TestScheduler>,
    clock: Rc<ManualClock>,
    frame: Cell<u64>,
}

impl TestRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(TestScheduler::default());
        let clock = Rc::new(ManualClock::new());
        let runtime = Runtime::new(scheduler.clone(), clock.clone());
        Self {
            runtime,
            scheduler,
            clock,
            frame: Cell::new(0),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn host(&self) -> Rc<dyn HostScheduler> {
        Rc::new(self.handle())
    }

    pub fn scheduler(&self) -> &TestScheduler {
        &self.scheduler
    }

    pub fn clock(&self) -> Rc<ManualClock> {
        Rc::clone(&self.clock)
    }

    /// Fires pending frame callbacks, then polls tasks until they block.
    pub fn paint(&self) {
        let handle = self.handle();
        handle.drain_ui();
        let frame = self.frame.get() + 1;
        self.frame.set(frame);
        handle.drain_frame_callbacks(frame * 16_666_667);
        handle.drain_ui();
    }

    /// Grants one idle slice of `budget`, then polls tasks until they block.
    pub fn idle(&self, budget: Duration) {
        let handle = self.handle();
        handle.drain_ui();
        handle.drain_idle_callbacks(budget);
        handle.drain_ui();
    }

    pub fn has_pending_frame(&self) -> bool {
        self.handle().has_frame_callbacks()
    }

    pub fn has_pending_idle(&self) -> bool {
        self.handle().has_idle_callbacks()
    }
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self::new()
    }
}
