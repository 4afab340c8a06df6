//! Platform abstraction traits for recycler runtime services.
//!
//! These traits allow the engine to delegate scheduling and clock
//! responsibilities to the host, so the same engine runs against a real
//! event loop or a deterministic test harness.

use std::future::Future;
use std::pin::Pin;

use web_time::{Duration, Instant};

/// Boxed, non-`Send` future used across the single-threaded runtime.
pub type LocalBoxFuture<T> = Pin<Box<dyn Future<Output = T> + 'static>>;

/// Schedules work for the recycler runtime.
///
/// Implementations are responsible for triggering frame processing and idle
/// slices on behalf of the runtime. They must be safe to use from multiple
/// threads.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host schedule a new frame.
    fn schedule_frame(&self);

    /// Request that the host grant an idle slice once it has spare time.
    ///
    /// Hosts without a separate idle queue may treat this as a frame request.
    fn schedule_idle(&self) {
        self.schedule_frame();
    }
}

/// Provides timing information for the runtime.
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Returns the time elapsed since `since`, saturating at zero.
    fn elapsed(&self, since: Instant) -> Duration {
        self.now().saturating_duration_since(since)
    }
}

/// Idle slice granted by the host.
///
/// The remaining budget is captured when the slice is granted and expressed in
/// the same units the engine uses for cost measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdleBudget {
    remaining: Duration,
}

impl IdleBudget {
    pub fn new(remaining: Duration) -> Self {
        Self { remaining }
    }

    /// Time left in this idle slice.
    #[inline]
    pub fn remaining(&self) -> Duration {
        self.remaining
    }
}

/// The two suspension points the engine awaits, plus the clock it measures
/// batch cost with.
///
/// Both futures only promise to resolve eventually; the engine makes no
/// assumption about when.
pub trait HostScheduler: Clock {
    /// Resolves just before the next render.
    fn next_paint(&self) -> LocalBoxFuture<()>;

    /// Resolves when the host grants an idle slice.
    fn idle_budget(&self) -> LocalBoxFuture<IdleBudget>;
}
