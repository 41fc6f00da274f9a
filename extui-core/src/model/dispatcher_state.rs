//! DispatcherState: reentrancy depth, processing flag and halt marker for the
//! dispatch cycle.
//!
//! Every mutation goes through a guard so the previous value is restored on
//! every exit path, including handler failures and fatal unwinds.

use std::cell::Cell;

/// Dispatch nesting beyond this is treated as a runaway feedback loop.
pub const MAX_REENTRANCY_DEPTH: u32 = 50;

#[derive(Debug, Default)]
pub struct DispatcherState {
    depth: Cell<u32>,
    processing: Cell<bool>,
    halted_at: Cell<Option<u32>>,
}

impl DispatcherState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// True while a drain loop is running.
    pub fn is_processing(&self) -> bool {
        self.processing.get()
    }

    pub fn is_halted(&self) -> bool {
        self.halted_at.get().is_some()
    }

    /// Depth that tripped the loop detector, once halted.
    pub fn halted_at(&self) -> Option<u32> {
        self.halted_at.get()
    }

    /// First halt wins; nested unwinds keep reporting the original depth.
    pub fn halt(&self, depth: u32) {
        if self.halted_at.get().is_none() {
            self.halted_at.set(Some(depth));
        }
    }

    /// Increment the depth for the lifetime of the returned guard.
    ///
    /// Returns `Err(depth)` when the new depth exceeds
    /// [`MAX_REENTRANCY_DEPTH`]; the increment is already undone then.
    pub fn enter(&self) -> Result<DepthGuard<'_>, u32> {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);

        let guard = DepthGuard { state: self };
        if depth > MAX_REENTRANCY_DEPTH {
            drop(guard);
            return Err(depth);
        }
        Ok(guard)
    }

    /// Mark a drain in progress; the previous flag comes back on drop.
    pub fn begin_processing(&self) -> ProcessingGuard<'_> {
        let previous = self.processing.replace(true);
        ProcessingGuard {
            state: self,
            previous,
        }
    }
}

#[must_use]
pub struct DepthGuard<'a> {
    state: &'a DispatcherState,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        let depth = self.state.depth.get();
        self.state.depth.set(depth.saturating_sub(1));
    }
}

#[must_use]
pub struct ProcessingGuard<'a> {
    state: &'a DispatcherState,
    previous: bool,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.state.processing.set(self.previous);
    }
}
