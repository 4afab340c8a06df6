#![doc = r"View-recycling engine for virtualized lists, strips, grids and tables."]

pub extern crate self as recycler_core;

pub mod collections;
pub mod error;
pub mod frame_clock;
pub mod meta;
pub mod platform;
pub mod policy;
pub mod pool;
mod recycler;
pub mod runtime;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod window;

pub use error::{RecyclerError, Result};
pub use frame_clock::{CallbackRegistration, FrameClock, IdleClock, NextFrame, NextIdle};
pub use meta::{Meta, MetaId, MetaStore};
pub use platform::{Clock, HostScheduler, IdleBudget, LocalBoxFuture, RuntimeScheduler};
pub use policy::{Anchor, RecyclePolicy, WindowExtent};
pub use pool::{EngineId, Pool, SharedPool, Variant};
pub use recycler::{
    EngineState, RecycleJob, RecycleOutcome, Recycler, RecyclerBuilder, RecyclerConfig,
    RecyclerStats, DEFAULT_ITEM_SIZE_ESTIMATE, DEFAULT_MAX_ITEMS_PER_PASS,
};
pub use runtime::{Runtime, RuntimeHandle, TaskHandle};
pub use window::{Direction, ItemId, Slot, Window};

#[cfg(any(test, feature = "test-helpers"))]
pub use testing::{ManualClock, TestRuntime, TestScheduler};
