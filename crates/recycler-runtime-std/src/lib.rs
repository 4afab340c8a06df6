//! Host scheduling for native event loops.
//!
//! [`StdScheduler`] and [`StdClock`] implement the scheduling and timing
//! traits of `recycler-core` on top of atomics and the wall clock. Hosts construct a
//! [`StdRuntime`], hand [`StdRuntime::host`] to their engines, and call
//! [`StdRuntime::pump_frame`] / [`StdRuntime::run_idle`] from their event
//! loop.

use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use recycler_core::{
    Clock, FrameClock, HostScheduler, IdleClock, Runtime, RuntimeHandle, RuntimeScheduler,
    TaskHandle,
};
use web_time::{Duration, Instant};

/// Nominal frame interval of a 60 Hz display.
pub const FRAME_INTERVAL: Duration = Duration::from_nanos(16_666_667);

type FrameWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records frame and idle requests with atomics.
pub struct StdScheduler {
    frame_requested: AtomicBool,
    idle_requested: AtomicBool,
    frame_waker: RwLock<Option<FrameWaker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            frame_requested: AtomicBool::new(false),
            idle_requested: AtomicBool::new(false),
            frame_waker: RwLock::new(None),
        }
    }

    /// Returns whether a frame has been requested since the last call.
    pub fn take_frame_request(&self) -> bool {
        self.frame_requested.swap(false, Ordering::SeqCst)
    }

    /// Returns whether an idle slice has been requested since the last call.
    pub fn take_idle_request(&self) -> bool {
        self.idle_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a frame or idle slice is requested.
    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self
            .frame_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_frame_waker(&self) {
        *self
            .frame_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .frame_waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "frame_requested",
                &self.frame_requested.load(Ordering::SeqCst),
            )
            .field("idle_requested", &self.idle_requested.load(Ordering::SeqCst))
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_frame(&self) {
        self.frame_requested.store(true, Ordering::SeqCst);
        self.wake();
    }

    fn schedule_idle(&self) {
        self.idle_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdClock;

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Convenience container bundling the standard scheduler, clock and runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    clock: Rc<StdClock>,
    runtime: Runtime,
    started: Instant,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let clock = Rc::new(StdClock);
        let runtime = Runtime::new(scheduler.clone(), clock.clone());
        Self {
            scheduler,
            clock,
            runtime,
            started: Instant::now(),
        }
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    /// Suspension points and clock for engines hosted on this runtime.
    pub fn host(&self) -> Rc<dyn HostScheduler> {
        Rc::new(self.runtime.handle())
    }

    pub fn frame_clock(&self) -> FrameClock {
        self.runtime.frame_clock()
    }

    pub fn idle_clock(&self) -> IdleClock {
        self.runtime.idle_clock()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> Rc<StdClock> {
        Rc::clone(&self.clock)
    }

    /// Spawns a future (typically a recycle job) on the runtime.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) -> Option<TaskHandle> {
        self.runtime.handle().spawn_ui(future)
    }

    pub fn take_frame_request(&self) -> bool {
        self.scheduler.take_frame_request()
    }

    pub fn take_idle_request(&self) -> bool {
        self.scheduler.take_idle_request()
    }

    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_frame_waker(waker);
    }

    pub fn clear_frame_waker(&self) {
        self.scheduler.clear_frame_waker();
    }

    /// Drains pending frame callbacks using the provided frame timestamp in nanoseconds.
    pub fn drain_frame_callbacks(&self, frame_time_nanos: u64) {
        self.runtime_handle()
            .drain_frame_callbacks(frame_time_nanos);
    }

    /// Runs one frame: polls ready tasks, fires frame callbacks, then polls
    /// the tasks they woke.
    pub fn pump_frame(&self) {
        let handle = self.runtime_handle();
        handle.drain_ui();
        let frame_time = self.clock.elapsed(self.started).as_nanos();
        handle.drain_frame_callbacks(u64::try_from(frame_time).unwrap_or(u64::MAX));
        handle.drain_ui();
    }

    /// Grants pending idle callbacks a slice of `budget`.
    pub fn run_idle(&self, budget: Duration) {
        let handle = self.runtime_handle();
        handle.drain_idle_callbacks(budget);
        handle.drain_ui();
    }

    /// Alternates frames and idle slices while callbacks are queued on
    /// either, up to `max_steps` times. Returns the number of steps taken.
    ///
    /// Each idle slice receives what is left of [`FRAME_INTERVAL`] after the
    /// preceding frame work.
    pub fn run_until_stalled(&self, max_steps: usize) -> usize {
        let handle = self.runtime_handle();
        handle.drain_ui();
        let mut steps = 0;
        while steps < max_steps && (handle.has_frame_callbacks() || handle.has_idle_callbacks()) {
            let frame_start = self.clock.now();
            self.take_frame_request();
            self.pump_frame();
            self.take_idle_request();
            if handle.has_idle_callbacks() {
                let spent = self.clock.elapsed(frame_start);
                self.run_idle(FRAME_INTERVAL.saturating_sub(spent));
            }
            steps += 1;
        }
        if steps == max_steps {
            log::warn!("runtime still busy after {} steps", steps);
        }
        steps
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/std_runtime_tests.rs"]
mod tests;
