//! Debug-mode diagnostics with per-key rate limiting.
//!
//! Nothing is emitted unless the global `debug` flag is set. Resolution
//! misses can repeat for every keystroke, so those go through
//! [`Diagnostics::rate_limited`], which emits a given key at most once per
//! interval.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use compact_str::CompactString;
use tracing::warn;

#[derive(Debug)]
pub struct Diagnostics {
    enabled: bool,
    interval: Duration,
    last_emitted: RefCell<AHashMap<CompactString, Instant>>,
}

impl Diagnostics {
    pub fn new(enabled: bool, interval: Duration) -> Self {
        Self {
            enabled,
            interval,
            last_emitted: RefCell::new(AHashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, Duration::ZERO)
    }

    pub fn warn(&self, message: &str) {
        if self.enabled {
            warn!(marker = "DIAGNOSTIC", "{message}");
        }
    }

    /// Emit `message()` unless `key` was emitted within the interval.
    /// The message is only built when it is actually emitted.
    pub fn rate_limited<F>(&self, key: &str, message: F) -> bool
    where
        F: FnOnce() -> String,
    {
        if !self.enabled {
            return false;
        }

        let now = Instant::now();
        let mut last_emitted = self.last_emitted.borrow_mut();

        if let Some(last) = last_emitted.get(key)
            && now.duration_since(*last) < self.interval
        {
            return false;
        }

        last_emitted.insert(CompactString::new(key), now);
        drop(last_emitted);

        warn!(marker = "DIAGNOSTIC_RATE_LIMITED", key, "{}", message());
        true
    }
}
