//! Layout adapters for the recycler engine: vertical lists, horizontal
//! strips, grids and tables.

pub mod grid;
pub mod linear;
pub mod prefetch;
pub mod table;
pub mod viewport;

pub use grid::{
    CellFactory, CellRect, Grid, GridConfig, GridStats, GridViewport, Track, TrackPolicy,
};
pub use linear::{Axis, LinearLayout, LinearLayoutConfig, ListView, ViewFactory};
pub use prefetch::PrefetchStrategy;
pub use table::{Table, TableConfig};
pub use viewport::{Viewport, ViewportHandler};

pub mod prelude {
    pub use crate::grid::{CellFactory, CellRect, Grid, GridConfig, GridViewport};
    pub use crate::linear::{Axis, LinearLayoutConfig, ListView, ViewFactory};
    pub use crate::prefetch::PrefetchStrategy;
    pub use crate::table::{Table, TableConfig};
    pub use recycler_core::{RecycleOutcome, Variant};
}
