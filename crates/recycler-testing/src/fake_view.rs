//! Stand-in views that record what an adapter did to them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewEvent {
    Created { serial: usize, kind: &'static str },
    Bound { serial: usize, index: usize },
    Placed { serial: usize, x: f32, y: f32 },
    Hidden { serial: usize },
}

/// Shared, append-only record of view events.
#[derive(Clone, Default)]
pub struct ViewLog {
    events: Rc<RefCell<Vec<ViewEvent>>>,
    next_serial: Rc<Cell<usize>>,
}

impl fmt::Debug for ViewLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewLog")
            .field("events", &self.events.borrow().len())
            .field("created", &self.next_serial.get())
            .finish()
    }
}

impl ViewLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: ViewEvent) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Number of views created through this log.
    pub fn created(&self) -> usize {
        self.next_serial.get()
    }

    /// Indices bound since the last `clear`, in order.
    pub fn bound_indices(&self) -> Vec<usize> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Bound { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&ViewEvent) -> bool) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| predicate(event))
            .count()
    }

    fn next_serial(&self) -> usize {
        let serial = self.next_serial.get() + 1;
        self.next_serial.set(serial);
        serial
    }
}

/// A view that remembers its binding and placement.
#[derive(Debug)]
pub struct FakeView {
    serial: usize,
    kind: &'static str,
    bound: Option<usize>,
    position: Option<(f32, f32)>,
    visible: bool,
    log: ViewLog,
}

impl FakeView {
    pub fn new(log: &ViewLog, kind: &'static str) -> Self {
        let serial = log.next_serial();
        log.record(ViewEvent::Created { serial, kind });
        Self {
            serial,
            kind,
            bound: None,
            position: None,
            visible: false,
            log: log.clone(),
        }
    }

    pub fn serial(&self) -> usize {
        self.serial
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn bound_index(&self) -> Option<usize> {
        self.bound
    }

    pub fn position(&self) -> Option<(f32, f32)> {
        self.position
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn bind(&mut self, index: usize) {
        self.bound = Some(index);
        self.log.record(ViewEvent::Bound {
            serial: self.serial,
            index,
        });
    }

    pub fn place(&mut self, x: f32, y: f32) {
        self.position = Some((x, y));
        self.visible = true;
        self.log.record(ViewEvent::Placed {
            serial: self.serial,
            x,
            y,
        });
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.log.record(ViewEvent::Hidden {
            serial: self.serial,
        });
    }
}
