//! Minimal tick owner for embeddings that have no state manager of their own.

use std::cell::Cell;
use std::rc::Rc;

use crate::controller::traits::TickSource;

/// Shared, non-decreasing version counter. Clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct TickCounter(Rc<Cell<u64>>);

impl TickCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observable state change.
    pub fn bump(&self) -> u64 {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }
}

impl TickSource for TickCounter {
    fn tick(&self) -> u64 {
        self.0.get()
    }
}
