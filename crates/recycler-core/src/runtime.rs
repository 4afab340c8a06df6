//! Single-threaded runtime that hosts recycle jobs.
//!
//! The runtime owns frame callbacks (drained by the host right before it
//! renders), idle callbacks (drained when the host grants an idle slice) and
//! spawned futures (polled by [`RuntimeHandle::drain_ui`]). Wakers only ask
//! the host scheduler for another frame; the host decides when to drain.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use web_time::{Duration, Instant};

use crate::frame_clock::{FrameClock, IdleClock};
use crate::platform::{Clock, HostScheduler, IdleBudget, LocalBoxFuture, RuntimeScheduler};

pub type FrameCallbackId = u64;
pub type IdleCallbackId = u64;

struct CallbackEntry<T> {
    id: u64,
    callback: Option<Box<dyn FnOnce(T) + 'static>>,
}

struct TaskEntry {
    id: u64,
    future: Pin<Box<dyn Future<Output = ()> + 'static>>,
}

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    clock: Rc<dyn Clock>,
    needs_frame: Cell<bool>,
    frame_callbacks: RefCell<VecDeque<CallbackEntry<u64>>>,
    idle_callbacks: RefCell<VecDeque<CallbackEntry<IdleBudget>>>,
    next_callback_id: Cell<u64>,
    tasks: RefCell<Vec<TaskEntry>>,
    next_task_id: Cell<u64>,
    task_waker: RefCell<Option<Waker>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>, clock: Rc<dyn Clock>) -> Self {
        Self {
            scheduler,
            clock,
            needs_frame: Cell::new(false),
            frame_callbacks: RefCell::new(VecDeque::new()),
            idle_callbacks: RefCell::new(VecDeque::new()),
            next_callback_id: Cell::new(1),
            tasks: RefCell::new(Vec::new()),
            next_task_id: Cell::new(1),
            task_waker: RefCell::new(None),
        }
    }

    fn init_task_waker(this: &Rc<Self>) {
        let waker = RuntimeTaskWaker::new(this.scheduler.clone()).into_waker();
        *this.task_waker.borrow_mut() = Some(waker);
    }

    fn schedule(&self) {
        self.needs_frame.set(true);
        self.scheduler.schedule_frame();
    }

    fn next_callback_id(&self) -> u64 {
        let id = self.next_callback_id.get();
        self.next_callback_id.set(id + 1);
        id
    }

    fn has_frame_callbacks(&self) -> bool {
        !self.frame_callbacks.borrow().is_empty()
    }

    fn has_idle_callbacks(&self) -> bool {
        !self.idle_callbacks.borrow().is_empty()
    }

    fn spawn_ui_task(&self, future: Pin<Box<dyn Future<Output = ()> + 'static>>) -> u64 {
        let id = self.next_task_id.get();
        self.next_task_id.set(id + 1);
        self.tasks.borrow_mut().push(TaskEntry { id, future });
        self.schedule();
        id
    }

    fn cancel_task(&self, id: u64) {
        self.tasks.borrow_mut().retain(|entry| entry.id != id);
    }

    fn poll_async_tasks(&self) -> bool {
        let waker = match self.task_waker.borrow().as_ref() {
            Some(waker) => waker.clone(),
            None => return false,
        };
        let mut cx = Context::from_waker(&waker);
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        let mut pending = Vec::with_capacity(tasks.len());
        let mut made_progress = false;
        for mut entry in tasks {
            match entry.future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => made_progress = true,
                Poll::Pending => pending.push(entry),
            }
        }
        if !pending.is_empty() {
            // Tasks spawned while polling were pushed behind our back; keep
            // the older ones first.
            let mut tasks = self.tasks.borrow_mut();
            let spawned = std::mem::take(&mut *tasks);
            tasks.extend(pending);
            made_progress |= !spawned.is_empty();
            tasks.extend(spawned);
        } else if !self.tasks.borrow().is_empty() {
            made_progress = true;
        }
        made_progress
    }

    /// Polls spawned futures until a round makes no progress.
    fn drain_ui(&self) {
        while self.poll_async_tasks() {}
    }

    fn has_pending_ui(&self) -> bool {
        self.tasks
            .try_borrow()
            .map(|tasks| !tasks.is_empty())
            .unwrap_or(true)
    }

    fn register_frame_callback(&self, callback: Box<dyn FnOnce(u64) + 'static>) -> FrameCallbackId {
        let id = self.next_callback_id();
        self.frame_callbacks.borrow_mut().push_back(CallbackEntry {
            id,
            callback: Some(callback),
        });
        self.schedule();
        id
    }

    fn cancel_frame_callback(&self, id: FrameCallbackId) {
        let mut callbacks = self.frame_callbacks.borrow_mut();
        if let Some(index) = callbacks.iter().position(|entry| entry.id == id) {
            callbacks.remove(index);
        }
        let callbacks_empty = callbacks.is_empty();
        drop(callbacks);
        if callbacks_empty && !self.has_pending_ui() {
            self.needs_frame.set(false);
        }
    }

    fn register_idle_callback(
        &self,
        callback: Box<dyn FnOnce(IdleBudget) + 'static>,
    ) -> IdleCallbackId {
        let id = self.next_callback_id();
        self.idle_callbacks.borrow_mut().push_back(CallbackEntry {
            id,
            callback: Some(callback),
        });
        self.scheduler.schedule_idle();
        id
    }

    fn cancel_idle_callback(&self, id: IdleCallbackId) {
        let mut callbacks = self.idle_callbacks.borrow_mut();
        if let Some(index) = callbacks.iter().position(|entry| entry.id == id) {
            callbacks.remove(index);
        }
    }

    fn drain_frame_callbacks(&self, frame_time_nanos: u64) {
        let pending = take_callbacks(&self.frame_callbacks);
        for callback in pending {
            callback(frame_time_nanos);
        }
        if !self.has_frame_callbacks() && !self.has_pending_ui() {
            self.needs_frame.set(false);
        }
    }

    fn drain_idle_callbacks(&self, budget: Duration) {
        let pending = take_callbacks(&self.idle_callbacks);
        for callback in pending {
            callback(IdleBudget::new(budget));
        }
    }
}

fn take_callbacks<T>(
    queue: &RefCell<VecDeque<CallbackEntry<T>>>,
) -> Vec<Box<dyn FnOnce(T) + 'static>> {
    let mut callbacks = queue.borrow_mut();
    let mut pending = Vec::with_capacity(callbacks.len());
    while let Some(mut entry) = callbacks.pop_front() {
        if let Some(callback) = entry.callback.take() {
            pending.push(callback);
        }
    }
    pending
}

#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>, clock: Rc<dyn Clock>) -> Self {
        let inner = Rc::new(RuntimeInner::new(scheduler, clock));
        RuntimeInner::init_task_waker(&inner);
        Self { inner }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn needs_frame(&self) -> bool {
        self.inner.needs_frame.get()
    }

    pub fn frame_clock(&self) -> FrameClock {
        FrameClock::new(self.handle())
    }

    pub fn idle_clock(&self) -> IdleClock {
        IdleClock::new(self.handle())
    }
}

/// Weak handle to a [`Runtime`]; every operation is a no-op once the runtime
/// is dropped.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Weak<RuntimeInner>,
}

pub struct TaskHandle {
    id: u64,
    runtime: RuntimeHandle,
}

impl RuntimeHandle {
    pub fn schedule(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.schedule();
        }
    }

    pub fn spawn_ui<F>(&self, fut: F) -> Option<TaskHandle>
    where
        F: Future<Output = ()> + 'static,
    {
        self.inner.upgrade().map(|inner| {
            let id = inner.spawn_ui_task(Box::pin(fut));
            TaskHandle {
                id,
                runtime: self.clone(),
            }
        })
    }

    pub fn cancel_task(&self, id: u64) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_task(id);
        }
    }

    pub fn drain_ui(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.drain_ui();
        }
    }

    pub fn has_pending_ui(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.has_pending_ui())
            .unwrap_or(false)
    }

    pub fn register_frame_callback(
        &self,
        callback: impl FnOnce(u64) + 'static,
    ) -> Option<FrameCallbackId> {
        self.inner
            .upgrade()
            .map(|inner| inner.register_frame_callback(Box::new(callback)))
    }

    pub fn cancel_frame_callback(&self, id: FrameCallbackId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_frame_callback(id);
        }
    }

    pub fn drain_frame_callbacks(&self, frame_time_nanos: u64) {
        if let Some(inner) = self.inner.upgrade() {
            inner.drain_frame_callbacks(frame_time_nanos);
        }
    }

    pub fn has_frame_callbacks(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.has_frame_callbacks())
            .unwrap_or(false)
    }

    pub fn register_idle_callback(
        &self,
        callback: impl FnOnce(IdleBudget) + 'static,
    ) -> Option<IdleCallbackId> {
        self.inner
            .upgrade()
            .map(|inner| inner.register_idle_callback(Box::new(callback)))
    }

    pub fn cancel_idle_callback(&self, id: IdleCallbackId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_idle_callback(id);
        }
    }

    /// Grants every pending idle callback a slice of `budget`.
    pub fn drain_idle_callbacks(&self, budget: Duration) {
        if let Some(inner) = self.inner.upgrade() {
            inner.drain_idle_callbacks(budget);
        }
    }

    pub fn has_idle_callbacks(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.has_idle_callbacks())
            .unwrap_or(false)
    }

    pub fn frame_clock(&self) -> FrameClock {
        FrameClock::new(self.clone())
    }

    pub fn idle_clock(&self) -> IdleClock {
        IdleClock::new(self.clone())
    }

    pub fn needs_frame(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.needs_frame.get())
            .unwrap_or(false)
    }
}

impl Clock for RuntimeHandle {
    fn now(&self) -> Instant {
        self.inner
            .upgrade()
            .map(|inner| inner.clock.now())
            .unwrap_or_else(Instant::now)
    }
}

impl HostScheduler for RuntimeHandle {
    fn next_paint(&self) -> LocalBoxFuture<()> {
        let next = self.frame_clock().next_frame();
        Box::pin(async move {
            next.await;
        })
    }

    fn idle_budget(&self) -> LocalBoxFuture<IdleBudget> {
        Box::pin(self.idle_clock().next_idle())
    }
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(self) {
        self.runtime.cancel_task(self.id);
    }
}

struct RuntimeTaskWaker {
    scheduler: Arc<dyn RuntimeScheduler>,
}

impl RuntimeTaskWaker {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self { scheduler }
    }

    fn into_waker(self) -> Waker {
        futures_task::waker(Arc::new(self))
    }
}

impl futures_task::ArcWake for RuntimeTaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.scheduler.schedule_frame();
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
