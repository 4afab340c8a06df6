use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use anyhow::{ensure, Context, Result};
use recycler_core::RecycleOutcome;
use recycler_layout::prelude::*;
use recycler_runtime_std::StdRuntime;

const FEED_LEN: usize = 100_000;
const MAX_STEPS: usize = 1_000;

/// A feed row as a host toolkit would hold it.
struct Post {
    index: Option<usize>,
    y: f32,
    visible: bool,
}

#[derive(Default)]
struct Feed {
    created: usize,
    binds: usize,
}

impl ViewFactory for Feed {
    type View = Post;

    fn count(&self) -> usize {
        FEED_LEN
    }

    fn variant_for(&self, index: usize) -> Variant {
        if index % 25 == 0 {
            Variant::named("section")
        } else {
            Variant::DEFAULT
        }
    }

    fn create(&mut self, _variant: Variant) -> Option<Post> {
        self.created += 1;
        Some(Post {
            index: None,
            y: 0.0,
            visible: false,
        })
    }

    fn bind(&mut self, post: &mut Post, index: usize) -> f32 {
        self.binds += 1;
        post.index = Some(index);
        if index % 25 == 0 {
            32.0
        } else {
            56.0 + (index % 4) as f32 * 12.0
        }
    }

    fn place(&mut self, post: &mut Post, _axis: Axis, offset: f32, _size: f32) {
        post.y = offset;
        post.visible = true;
    }

    fn detach(&mut self, post: &mut Post) {
        post.visible = false;
    }
}

#[derive(Default)]
struct Spreadsheet {
    created: usize,
}

impl CellFactory for Spreadsheet {
    type Cell = (usize, usize);

    fn rows(&self) -> usize {
        10_000
    }

    fn columns(&self) -> usize {
        200
    }

    fn row_height(&mut self, row: usize) -> f32 {
        if row == 0 {
            36.0
        } else {
            24.0
        }
    }

    fn column_width(&mut self, column: usize) -> f32 {
        if column == 0 {
            120.0
        } else {
            80.0
        }
    }

    fn create_cell(&mut self, row: usize, column: usize) -> (usize, usize) {
        self.created += 1;
        (row, column)
    }

    fn bind_cell(&mut self, cell: &mut (usize, usize), row: usize, column: usize) {
        *cell = (row, column);
    }

    fn place_cell(&mut self, _cell: &mut (usize, usize), _rect: CellRect) {}
}

/// Spawns `job` and runs frames and idle slices until it settles.
fn settle(
    runtime: &StdRuntime,
    job: impl Future<Output = recycler_core::Result<RecycleOutcome>> + 'static,
) -> Result<RecycleOutcome> {
    let result = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&result);
    runtime
        .spawn(async move {
            *slot.borrow_mut() = Some(job.await);
        })
        .context("runtime is gone")?;
    runtime.run_until_stalled(MAX_STEPS);
    let outcome = result.borrow_mut().take().context("recycle job did not settle")?;
    Ok(outcome?)
}

fn scroll_feed(runtime: &StdRuntime) -> Result<()> {
    let list = ListView::vertical(
        Feed::default(),
        LinearLayoutConfig {
            spacing: 8.0,
            prefetch: PrefetchStrategy::new(6),
            ..LinearLayoutConfig::default()
        },
        runtime.host(),
    )?;
    list.mount();
    list.set_viewport(0.0, 800.0);
    settle(runtime, list.recycle())?;

    for _ in 0..200 {
        let outcome = settle(runtime, list.scroll_by(240.0))?;
        ensure!(outcome == RecycleOutcome::Completed, "scroll ended {outcome:?}");
    }
    let jump = list.viewport().offset * 40.0;
    settle(runtime, list.scroll_to(jump))?;
    settle(runtime, list.scroll_to(0.0))?;

    list.recycler()
        .check_invariants()
        .map_err(anyhow::Error::msg)?;
    let stats = list.recycler().stats();
    let (created, binds) = list.with_factory(|feed| (feed.created, feed.binds));
    log::info!(
        "feed: window {:?}, {} views created for {} binds, {} reused, {} evicted, unit cost {:?}",
        list.visible_range(),
        created,
        binds,
        stats.reused,
        stats.evicted,
        list.recycler().unit_cost()
    );
    list.unmount();
    Ok(())
}

fn scroll_table(runtime: &StdRuntime) -> Result<()> {
    let table = Table::new(
        Spreadsheet::default(),
        TableConfig {
            frozen_rows: 1,
            frozen_columns: 1,
            grid: GridConfig::default(),
        },
        runtime.host(),
    )?;
    table.mount();
    table.set_viewport(GridViewport::new(0.0, 0.0, 1024.0, 768.0));
    settle(runtime, table.recycle())?;

    for step in 1..=100 {
        let offset = step as f32 * 50.0;
        settle(runtime, table.scroll_to(offset * 0.5, offset))?;
    }

    table.grid().check_invariants().map_err(anyhow::Error::msg)?;
    let stats = table.stats();
    let created = table.grid().with_factory(|sheet| sheet.created);
    log::info!(
        "table: {} live cells ({} frozen), {} created, {} rebound",
        stats.live_cells,
        table.frozen_cells().len(),
        created,
        stats.cells_rebound
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let runtime = StdRuntime::new();
    scroll_feed(&runtime)?;
    scroll_table(&runtime)?;
    Ok(())
}
