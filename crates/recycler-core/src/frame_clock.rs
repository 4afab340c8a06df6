//! Futures for the two suspension points: the next paint and the next idle
//! slice.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::platform::IdleBudget;
use crate::runtime::{FrameCallbackId, IdleCallbackId, RuntimeHandle};

#[derive(Clone)]
pub struct FrameClock {
    runtime: RuntimeHandle,
}

impl FrameClock {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self { runtime }
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.clone()
    }

    pub fn with_frame_nanos(
        &self,
        callback: impl FnOnce(u64) + 'static,
    ) -> CallbackRegistration {
        match self.runtime.register_frame_callback(callback) {
            Some(id) => CallbackRegistration::frame(self.runtime.clone(), id),
            None => CallbackRegistration::inactive(self.runtime.clone()),
        }
    }

    /// Resolves with the frame timestamp (nanoseconds) of the next paint.
    pub fn next_frame(&self) -> NextFrame {
        NextFrame {
            clock: self.clone(),
            state: Rc::new(RefCell::new(Pending::new())),
        }
    }
}

#[derive(Clone)]
pub struct IdleClock {
    runtime: RuntimeHandle,
}

impl IdleClock {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self { runtime }
    }

    pub fn with_idle_budget(
        &self,
        callback: impl FnOnce(IdleBudget) + 'static,
    ) -> CallbackRegistration {
        match self.runtime.register_idle_callback(callback) {
            Some(id) => CallbackRegistration::idle(self.runtime.clone(), id),
            None => CallbackRegistration::inactive(self.runtime.clone()),
        }
    }

    /// Resolves with the budget of the next idle slice the host grants.
    pub fn next_idle(&self) -> NextIdle {
        NextIdle {
            clock: self.clone(),
            state: Rc::new(RefCell::new(Pending::new())),
        }
    }
}

enum RegisteredCallback {
    Frame(FrameCallbackId),
    Idle(IdleCallbackId),
}

/// Keeps a queued callback alive; dropping it without firing cancels the
/// callback.
pub struct CallbackRegistration {
    runtime: RuntimeHandle,
    callback: Option<RegisteredCallback>,
}

impl CallbackRegistration {
    fn frame(runtime: RuntimeHandle, id: FrameCallbackId) -> Self {
        Self {
            runtime,
            callback: Some(RegisteredCallback::Frame(id)),
        }
    }

    fn idle(runtime: RuntimeHandle, id: IdleCallbackId) -> Self {
        Self {
            runtime,
            callback: Some(RegisteredCallback::Idle(id)),
        }
    }

    fn inactive(runtime: RuntimeHandle) -> Self {
        Self {
            runtime,
            callback: None,
        }
    }

    /// Marks the callback as fired so dropping the registration is a no-op.
    fn disarm(&mut self) {
        self.callback = None;
    }

    pub fn cancel(mut self) {
        self.cancel_inner();
    }

    fn cancel_inner(&mut self) {
        match self.callback.take() {
            Some(RegisteredCallback::Frame(id)) => self.runtime.cancel_frame_callback(id),
            Some(RegisteredCallback::Idle(id)) => self.runtime.cancel_idle_callback(id),
            None => {}
        }
    }
}

impl Drop for CallbackRegistration {
    fn drop(&mut self) {
        self.cancel_inner();
    }
}

struct Pending<T> {
    registration: Option<CallbackRegistration>,
    value: Option<T>,
    waker: Option<Waker>,
}

impl<T> Pending<T> {
    fn new() -> Self {
        Self {
            registration: None,
            value: None,
            waker: None,
        }
    }

    fn resolve(&mut self, value: T) {
        self.value = Some(value);
        if let Some(mut registration) = self.registration.take() {
            registration.disarm();
        }
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// Shared polling logic: register once, then wait for the callback to store
/// a value.
fn poll_pending<T: Copy + 'static>(
    state: &Rc<RefCell<Pending<T>>>,
    cx: &mut Context<'_>,
    register: impl FnOnce(Box<dyn FnOnce(T)>) -> CallbackRegistration,
) -> Poll<T> {
    if let Some(value) = state.borrow().value {
        return Poll::Ready(value);
    }

    let needs_registration = {
        let mut pending = state.borrow_mut();
        pending.waker = Some(cx.waker().clone());
        pending.registration.is_none()
    };

    if needs_registration {
        let weak = Rc::downgrade(state);
        let registration = register(Box::new(move |value| {
            if let Some(state) = weak.upgrade() {
                state.borrow_mut().resolve(value);
            }
        }));
        let mut pending = state.borrow_mut();
        if pending.value.is_none() {
            pending.registration = Some(registration);
        } else {
            drop(pending);
            let mut registration = registration;
            registration.disarm();
        }
    }

    match state.borrow().value {
        Some(value) => Poll::Ready(value),
        None => Poll::Pending,
    }
}

pub struct NextFrame {
    clock: FrameClock,
    state: Rc<RefCell<Pending<u64>>>,
}

impl Future for NextFrame {
    type Output = u64;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let clock = self.clock.clone();
        poll_pending(&self.state, cx, move |callback| {
            clock.with_frame_nanos(callback)
        })
    }
}

impl Drop for NextFrame {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.registration.take();
        }
    }
}

pub struct NextIdle {
    clock: IdleClock,
    state: Rc<RefCell<Pending<IdleBudget>>>,
}

impl Future for NextIdle {
    type Output = IdleBudget;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let clock = self.clock.clone();
        poll_pending(&self.state, cx, move |callback| {
            clock.with_idle_budget(callback)
        })
    }
}

impl Drop for NextIdle {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.registration.take();
        }
    }
}
