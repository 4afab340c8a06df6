use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use recycler_core::{
    HostScheduler, ManualClock, RecycleOutcome, RecyclePolicy, Recycler, Result,
    RuntimeHandle, TestRuntime, TestScheduler,
};
use web_time::Duration;

/// Settlement slot of a spawned recycle job.
#[derive(Clone, Default)]
pub struct JobHandle {
    outcome: Rc<RefCell<Option<Result<RecycleOutcome>>>>,
}

impl JobHandle {
    pub fn is_settled(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Takes the job's result once it has settled.
    pub fn take(&self) -> Option<Result<RecycleOutcome>> {
        self.outcome.borrow_mut().take()
    }
}

/// Headless harness for driving recycle jobs frame by frame.
///
/// `RecyclerTestRule` owns a [`TestRuntime`] on a [`ManualClock`]. Paints and
/// idle slices only happen when the test asks for them, so every suspension
/// point of a job can be observed.
pub struct RecyclerTestRule {
    runtime: TestRuntime,
}

impl RecyclerTestRule {
    pub fn new() -> Self {
        Self {
            runtime: TestRuntime::new(),
        }
    }

    /// Suspension points and clock to build engines with.
    pub fn host(&self) -> Rc<dyn HostScheduler> {
        self.runtime.host()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> &TestScheduler {
        self.runtime.scheduler()
    }

    pub fn clock(&self) -> Rc<ManualClock> {
        self.runtime.clock()
    }

    pub fn advance_time(&self, by: Duration) {
        self.runtime.clock().advance(by);
    }

    /// Spawns a future and polls it until it first blocks.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        let handle = self.runtime.handle();
        if handle.spawn_ui(future).is_none() {
            log::warn!("test runtime dropped before spawn");
        }
        handle.drain_ui();
    }

    /// Spawns a recycle job (or a composite job such as a grid's) and returns
    /// a handle to its result.
    pub fn spawn_job(
        &self,
        job: impl Future<Output = Result<RecycleOutcome>> + 'static,
    ) -> JobHandle {
        let handle = JobHandle::default();
        let slot = Rc::clone(&handle.outcome);
        self.spawn(async move {
            let result = job.await;
            *slot.borrow_mut() = Some(result);
        });
        handle
    }

    /// Fires one paint: frame callbacks run, then every task they woke is
    /// polled until it blocks again.
    pub fn advance_frame(&self) {
        self.runtime.paint();
    }

    /// Grants one idle slice of `budget` to every waiting idle callback.
    pub fn grant_idle(&self, budget: Duration) {
        self.runtime.idle(budget);
    }

    pub fn has_pending_frame(&self) -> bool {
        self.runtime.has_pending_frame()
    }

    pub fn has_pending_idle(&self) -> bool {
        self.runtime.has_pending_idle()
    }

    /// Alternates paints and idle slices of `idle_budget` until nothing waits
    /// on either. Returns the number of rounds.
    pub fn pump_until_idle(&self, idle_budget: Duration) -> usize {
        let mut rounds = 0;
        while self.has_pending_frame() || self.has_pending_idle() {
            rounds += 1;
            if rounds > 1_000 {
                panic!("pump_until_idle looped too many times!");
            }
            if self.has_pending_frame() {
                self.advance_frame();
            }
            if self.has_pending_idle() {
                self.grant_idle(idle_budget);
            }
        }
        rounds
    }

    /// Requests a recycle and drives it to settlement with generous idle
    /// slices.
    pub fn recycle_and_settle<P>(&self, recycler: &Recycler<P>) -> Result<RecycleOutcome>
    where
        P: RecyclePolicy + 'static,
        P::Item: 'static,
    {
        self.settle(recycler.recycle())
    }

    /// Drives an already requested job to settlement.
    pub fn settle(
        &self,
        job: impl Future<Output = Result<RecycleOutcome>> + 'static,
    ) -> Result<RecycleOutcome> {
        let job = self.spawn_job(job);
        self.pump_until_idle(Duration::from_millis(50));
        match job.take() {
            Some(result) => result,
            None => panic!("recycle job did not settle"),
        }
    }
}

impl Default for RecyclerTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `RecyclerTestRule`.
pub fn run_test_recycler<R>(f: impl FnOnce(&RecyclerTestRule) -> R) -> R {
    let rule = RecyclerTestRule::new();
    f(&rule)
}

#[cfg(test)]
#[path = "tests/testing_tests.rs"]
mod tests;
