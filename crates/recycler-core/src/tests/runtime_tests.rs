use super::*;
use crate::TestRuntime;

#[test]
fn frame_callbacks_fire_once_on_drain() {
    let runtime = TestRuntime::new();
    let handle = runtime.handle();
    let seen = Rc::new(Cell::new(0u64));
    let captured = Rc::clone(&seen);
    handle.register_frame_callback(move |nanos| captured.set(nanos));

    assert!(handle.needs_frame());
    handle.drain_frame_callbacks(42);
    assert_eq!(seen.get(), 42);
    assert!(!handle.has_frame_callbacks());
    assert!(!handle.needs_frame());

    handle.drain_frame_callbacks(99);
    assert_eq!(seen.get(), 42);
}

#[test]
fn cancelled_frame_callback_never_runs() {
    let runtime = TestRuntime::new();
    let handle = runtime.handle();
    let fired = Rc::new(Cell::new(false));
    let captured = Rc::clone(&fired);
    let id = handle
        .register_frame_callback(move |_| captured.set(true))
        .expect("runtime alive");
    handle.cancel_frame_callback(id);
    handle.drain_frame_callbacks(1);
    assert!(!fired.get());
}

#[test]
fn idle_callbacks_receive_the_granted_budget() {
    let runtime = TestRuntime::new();
    let handle = runtime.handle();
    let budget = Rc::new(Cell::new(Duration::ZERO));
    let captured = Rc::clone(&budget);
    handle.register_idle_callback(move |slice| captured.set(slice.remaining()));
    assert!(handle.has_idle_callbacks());

    handle.drain_idle_callbacks(Duration::from_millis(8));
    assert_eq!(budget.get(), Duration::from_millis(8));
    assert!(!handle.has_idle_callbacks());
}

#[test]
fn spawned_task_resumes_after_paint() {
    let runtime = TestRuntime::new();
    let handle = runtime.handle();
    let stage = Rc::new(Cell::new(0));
    let captured = Rc::clone(&stage);
    let host = runtime.host();
    handle.spawn_ui(async move {
        captured.set(1);
        host.next_paint().await;
        captured.set(2);
        host.idle_budget().await;
        captured.set(3);
    });

    handle.drain_ui();
    assert_eq!(stage.get(), 1);
    assert!(runtime.scheduler().frame_requests() > 0);

    runtime.paint();
    assert_eq!(stage.get(), 2);

    runtime.paint();
    assert_eq!(stage.get(), 2, "a paint does not grant idle time");

    runtime.idle(Duration::from_millis(4));
    assert_eq!(stage.get(), 3);
    assert!(!handle.has_pending_ui());
}

#[test]
fn cancelled_task_is_dropped() {
    let runtime = TestRuntime::new();
    let handle = runtime.handle();
    let finished = Rc::new(Cell::new(false));
    let captured = Rc::clone(&finished);
    let host = runtime.host();
    let task = handle
        .spawn_ui(async move {
            host.next_paint().await;
            captured.set(true);
        })
        .expect("runtime alive");
    handle.drain_ui();
    task.cancel();
    runtime.paint();
    assert!(!finished.get());
    assert!(!handle.has_frame_callbacks());
}

#[test]
fn handle_outlived_by_nothing_is_inert() {
    let handle = {
        let runtime = TestRuntime::new();
        runtime.handle()
    };
    assert!(handle.register_frame_callback(|_| {}).is_none());
    assert!(handle.spawn_ui(async {}).is_none());
    assert!(!handle.needs_frame());
    assert!(!handle.has_pending_ui());
}

#[test]
fn manual_clock_drives_handle_time() {
    let runtime = TestRuntime::new();
    let handle = runtime.handle();
    let start = handle.now();
    runtime.clock().advance(Duration::from_millis(5));
    assert_eq!(handle.elapsed(start), Duration::from_millis(5));
}
