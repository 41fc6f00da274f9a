//! EventQueue: FIFO of resolved events plus the hand-off queue for events
//! delivered from a fast context.
//!
//! Fast deliveries never touch the main queue directly. They wait in the
//! deferred queue until either the scheduled flush fires or a later safe
//! delivery absorbs them, whichever happens first. Absorbing always appends
//! the whole deferred batch, so arrival order is preserved across contexts.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::controller::handler_registry::ResolvedHandler;
use crate::model::event::RawEvent;

/// One captured callback, ready for replay.
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub handler: ResolvedHandler,
    pub raw: RawEvent,
}

#[derive(Debug, Default)]
pub struct EventQueue {
    pending: RefCell<VecDeque<QueuedEvent>>,
    deferred: RefCell<VecDeque<QueuedEvent>>,
    flush_armed: Cell<bool>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: QueuedEvent) {
        self.pending.borrow_mut().push_back(event);
    }

    /// Queue a fast-context delivery. Returns `true` when the caller must
    /// schedule a flush; later pushes coalesce onto the one already armed.
    pub fn push_deferred(&self, event: QueuedEvent) -> bool {
        self.deferred.borrow_mut().push_back(event);
        !self.flush_armed.replace(true)
    }

    /// The scheduled flush fired; the next fast delivery must arm a new one.
    pub fn disarm(&self) {
        self.flush_armed.set(false);
    }

    pub fn is_flush_armed(&self) -> bool {
        self.flush_armed.get()
    }

    /// Move the whole deferred batch behind the pending events.
    pub fn absorb_deferred(&self) -> usize {
        let mut deferred = self.deferred.borrow_mut();
        let moved = deferred.len();
        self.pending.borrow_mut().extend(deferred.drain(..));
        moved
    }

    pub fn pop(&self) -> Option<QueuedEvent> {
        self.pending.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.borrow().len()
    }

    /// Drop everything, pending and deferred. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let dropped = self.len() + self.deferred_len();
        self.pending.borrow_mut().clear();
        self.deferred.borrow_mut().clear();
        dropped
    }
}
