use super::*;

fn extent(first: Option<Meta>, last: Option<Meta>, len: usize) -> WindowExtent {
    WindowExtent {
        first,
        last,
        len,
        average_size: 10.0,
    }
}

#[test]
fn normal_viewport_is_kept() {
    let handler = ViewportHandler::new(500.0, 50.0, 0.0);
    assert_eq!(handler.effective_size(), 500.0);
    assert!(!handler.is_infinite());
    assert_eq!(handler.viewport(30.0), Viewport::new(30.0, 500.0));
}

#[test]
fn infinite_viewport_falls_back_to_twenty_items() {
    let handler = ViewportHandler::new(f32::INFINITY, 50.0, 8.0);
    assert!(handler.is_infinite());
    assert_eq!(handler.effective_size(), 1160.0);
}

#[test]
fn huge_viewport_is_treated_as_infinite() {
    let handler = ViewportHandler::new(200_000.0, 50.0, 0.0);
    assert!(handler.is_infinite());
    assert!(handler.effective_size() < 100_000.0);
}

#[test]
fn fallback_uses_default_estimate_for_tiny_averages() {
    let handler = ViewportHandler::new(f32::INFINITY, 0.0, 0.0);
    assert_eq!(handler.effective_size(), DEFAULT_ITEM_SIZE_ESTIMATE * 20.0);
}

#[test]
fn invalid_sizes_collapse_to_zero() {
    assert_eq!(ViewportHandler::new(-5.0, 10.0, 0.0).effective_size(), 0.0);
    assert_eq!(ViewportHandler::new(f32::NAN, 10.0, 0.0).effective_size(), 0.0);
}

#[test]
fn coverage_toward_each_edge() {
    let viewport = Viewport::new(100.0, 200.0);
    let window = extent(
        Some(Meta::new(5, 20.0, 90.0)),
        Some(Meta::new(15, 20.0, 290.0)),
        11,
    );
    assert!(viewport.covers(Direction::Start, &window, 100, 0.0));
    assert!(!viewport.covers(Direction::Start, &window, 100, 50.0));
    assert!(viewport.covers(Direction::End, &window, 100, 0.0));
    assert!(!viewport.covers(Direction::End, &window, 100, 20.0));
    assert!(viewport.covers(Direction::End, &window, 16, 1_000.0), "last index reached");
}

#[test]
fn empty_window_is_never_covering() {
    let viewport = Viewport::new(0.0, 100.0);
    assert!(!viewport.covers(Direction::End, &extent(None, None, 0), 10, 0.0));
    assert!(viewport.covers(Direction::End, &extent(None, None, 0), 0, 0.0));
}

#[test]
fn retention_includes_the_margin() {
    let viewport = Viewport::new(100.0, 100.0);
    assert!(viewport.retains(&Meta::new(0, 10.0, 95.0), 0.0));
    assert!(!viewport.retains(&Meta::new(0, 10.0, 80.0), 0.0));
    assert!(viewport.retains(&Meta::new(0, 10.0, 80.0), 15.0));
    assert!(!viewport.retains(&Meta::new(0, 10.0, 230.0), 15.0));
}

#[test]
fn anchor_estimates_from_scroll_offset() {
    let viewport = Viewport::new(1_005.0, 100.0);
    assert_eq!(viewport.anchor(10.0, 1_000), Anchor::with_offset(100, 1_000.0));
    assert_eq!(viewport.anchor(10.0, 50), Anchor::with_offset(49, 490.0));
    assert_eq!(viewport.anchor(0.0, 50), Anchor::with_offset(0, 0.0));
}
