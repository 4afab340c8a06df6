use super::*;
use crate::prefetch::PrefetchStrategy;
use recycler_testing::{FakeView, RecyclerTestRule, ViewLog};

struct Ledger {
    log: ViewLog,
}

impl CellFactory for Ledger {
    type Cell = FakeView;

    fn rows(&self) -> usize {
        1_000
    }

    fn columns(&self) -> usize {
        20
    }

    fn row_height(&mut self, _row: usize) -> f32 {
        20.0
    }

    fn column_width(&mut self, _column: usize) -> f32 {
        50.0
    }

    fn create_cell(&mut self, row: usize, column: usize) -> FakeView {
        let kind = if row == 0 || column == 0 { "header" } else { "cell" };
        FakeView::new(&self.log, kind)
    }

    fn bind_cell(&mut self, cell: &mut FakeView, row: usize, column: usize) {
        cell.bind(row * 20 + column);
    }

    fn place_cell(&mut self, cell: &mut FakeView, rect: CellRect) {
        cell.place(rect.x, rect.y);
    }

    fn hide_cell(&mut self, cell: &mut FakeView) {
        cell.hide();
    }
}

fn mounted(rule: &RecyclerTestRule, log: &ViewLog) -> Table<Ledger> {
    let config = TableConfig {
        frozen_rows: 1,
        frozen_columns: 1,
        grid: GridConfig {
            prefetch: PrefetchStrategy::disabled(),
            ..GridConfig::default()
        },
    };
    let table = Table::new(Ledger { log: log.clone() }, config, rule.host()).expect("table");
    table.mount();
    table.set_viewport(GridViewport::new(0.0, 0.0, 200.0, 100.0));
    table
}

#[test]
fn frozen_bands_are_carved_out_of_the_viewport() {
    let rule = RecyclerTestRule::new();
    let log = ViewLog::new();
    let table = mounted(&rule, &log);

    rule.settle(table.recycle()).expect("recycle");

    assert_eq!(table.frozen_extent(), (50.0, 20.0));
    assert_eq!(table.grid().rows().window_indices(), vec![0, 1, 2, 3]);
    assert_eq!(table.grid().columns().window_indices(), vec![0, 1, 2]);
    assert_eq!(table.live_cells().len(), 20);
    assert_eq!(table.frozen_cells().len(), 8);
    assert_eq!(table.cell_rect(0, 0).map(|rect| (rect.x, rect.y)), Some((0.0, 0.0)));
    assert_eq!(table.cell_rect(1, 1).map(|rect| (rect.x, rect.y)), Some((50.0, 20.0)));
}

#[test]
fn headers_survive_scrolling_and_follow_the_viewport() {
    let rule = RecyclerTestRule::new();
    let log = ViewLog::new();
    let table = mounted(&rule, &log);
    rule.settle(table.recycle()).expect("recycle");
    let header = table.grid().with_cell(0, 1, |cell| cell.serial());

    rule.settle(table.scroll_to(0.0, 100.0)).expect("scroll");

    assert_eq!(table.grid().with_cell(0, 1, |cell| cell.serial()), header);
    assert_eq!(table.cell_rect(0, 1).map(|rect| rect.y), Some(100.0));
    assert_eq!(table.cell_rect(6, 1).map(|rect| rect.y), Some(120.0));
    assert!(table.cell_rect(1, 1).is_none());
    assert!(table.live_cells().contains(&(6, 0)));
    table.grid().check_invariants().expect("invariants");
}

#[test]
fn frozen_membership() {
    let rule = RecyclerTestRule::new();
    let log = ViewLog::new();
    let table = mounted(&rule, &log);

    assert!(table.is_frozen(0, 5));
    assert!(table.is_frozen(3, 0));
    assert!(!table.is_frozen(2, 2));
}

#[test]
fn headers_are_placed_on_the_first_paint_with_prefetch_enabled() {
    let rule = RecyclerTestRule::new();
    let log = ViewLog::new();
    let config = TableConfig {
        frozen_rows: 1,
        frozen_columns: 1,
        grid: GridConfig::default(),
    };
    let table = Table::new(Ledger { log: log.clone() }, config, rule.host()).expect("table");
    table.mount();
    table.set_viewport(GridViewport::new(0.0, 0.0, 200.0, 100.0));

    let job = rule.spawn_job(table.recycle());
    rule.advance_frame();

    assert!(!job.is_settled());
    assert_eq!(table.live_cells().len(), 20);
    assert_eq!(table.frozen_cells().len(), 8);
    assert_eq!(table.cell_rect(0, 1).map(|rect| (rect.x, rect.y)), Some((50.0, 0.0)));

    rule.pump_until_idle(std::time::Duration::from_millis(50));
    assert_eq!(job.take(), Some(Ok(RecycleOutcome::Completed)));
    table.grid().check_invariants().expect("invariants");
}
