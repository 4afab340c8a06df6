//! Deterministic host and fake views for exercising recycling engines in
//! tests.

mod fake_view;
mod testing;

pub use fake_view::{FakeView, ViewEvent, ViewLog};
pub use recycler_core::{ManualClock, TestScheduler};
pub use testing::{run_test_recycler, JobHandle, RecyclerTestRule};
