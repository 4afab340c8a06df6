//! Tables: grids whose leading rows and columns stay put.

use std::fmt;
use std::rc::Rc;

use recycler_core::{HostScheduler, LocalBoxFuture, RecycleOutcome, Result};

use crate::grid::{CellFactory, CellRect, Grid, GridConfig, GridStats, GridViewport};

#[derive(Clone, Debug, PartialEq)]
pub struct TableConfig {
    /// Header rows pinned to the top edge.
    pub frozen_rows: usize,
    /// Leading columns pinned to the left edge.
    pub frozen_columns: usize,
    pub grid: GridConfig,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            frozen_rows: 1,
            frozen_columns: 0,
            grid: GridConfig::default(),
        }
    }
}

/// A grid with frozen header rows and columns.
///
/// Frozen cells are realized on every sync and are never handed to the
/// track engines, so scrolling never recycles them. Body cells are placed
/// below and to the right of the frozen bands.
pub struct Table<F: CellFactory> {
    grid: Grid<F>,
}

impl<F> Table<F>
where
    F: CellFactory + 'static,
    F::Cell: 'static,
{
    pub fn new(factory: F, config: TableConfig, host: Rc<dyn HostScheduler>) -> Result<Self> {
        let grid = Grid::with_frozen(
            factory,
            config.grid,
            config.frozen_rows,
            config.frozen_columns,
            host,
        )?;
        Ok(Self { grid })
    }

    pub fn mount(&self) {
        self.grid.mount();
    }

    pub fn unmount(&self) {
        self.grid.unmount();
    }

    pub fn set_viewport(&self, viewport: GridViewport) {
        self.grid.set_viewport(viewport);
    }

    pub fn recycle(&self) -> LocalBoxFuture<Result<RecycleOutcome>> {
        self.grid.recycle()
    }

    pub fn scroll_to(&self, x: f32, y: f32) -> LocalBoxFuture<Result<RecycleOutcome>> {
        self.grid.scroll_to(x, y)
    }

    pub fn is_frozen(&self, row: usize, column: usize) -> bool {
        let (rows, columns) = self.grid.frozen_counts();
        row < rows || column < columns
    }

    /// Width of the frozen columns and height of the frozen rows.
    pub fn frozen_extent(&self) -> (f32, f32) {
        self.grid.frozen_extents()
    }

    /// Realized frozen cells, in row-major order.
    pub fn frozen_cells(&self) -> Vec<(usize, usize)> {
        self.grid
            .live_cells()
            .into_iter()
            .filter(|(row, column)| self.is_frozen(*row, *column))
            .collect()
    }

    pub fn live_cells(&self) -> Vec<(usize, usize)> {
        self.grid.live_cells()
    }

    pub fn cell_rect(&self, row: usize, column: usize) -> Option<CellRect> {
        self.grid.cell_rect(row, column)
    }

    pub fn stats(&self) -> GridStats {
        self.grid.stats()
    }

    pub fn grid(&self) -> &Grid<F> {
        &self.grid
    }
}

impl<F: CellFactory> fmt::Debug for Table<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table").field("grid", &self.grid).finish()
    }
}

#[cfg(test)]
#[path = "tests/table_tests.rs"]
mod tests;
