//! Counter-based statistics sink.
//!
//! The router only ever calls [`StatsSink::track`]; the collector keeps the
//! counts behind a mutex so a snapshot can be taken from another thread.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use parking_lot::Mutex;
use serde::Serialize;

use crate::controller::traits::StatsSink;

#[derive(Debug, Clone, Default)]
pub struct StatsCollector {
    counters: Arc<Mutex<AHashMap<CompactString, u64>>>,
}

/// Point-in-time copy of all counters, ordered by name.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub taken_at: DateTime<Utc>,
    pub counters: BTreeMap<CompactString, u64>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: &str) -> u64 {
        self.counters.lock().get(counter).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self
            .counters
            .lock()
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();

        StatsSnapshot {
            taken_at: Utc::now(),
            counters,
        }
    }

    pub fn reset(&self) {
        self.counters.lock().clear();
    }
}

impl StatsSink for StatsCollector {
    fn track(&self, counter: &str) {
        let mut counters = self.counters.lock();
        match counters.get_mut(counter) {
            Some(count) => *count += 1,
            None => {
                counters.insert(CompactString::new(counter), 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_and_snapshot() {
        let stats = StatsCollector::new();
        stats.track("msg.skipped");
        stats.track("msg.skipped");
        stats.track("cmdline.skipped");

        assert_eq!(stats.get("msg.skipped"), 2);
        assert_eq!(stats.get("popupmenu.skipped"), 0);

        let snapshot = stats.snapshot();
        let names: Vec<_> = snapshot.counters.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["cmdline.skipped", "msg.skipped"]);
    }

    #[test]
    fn test_clones_share_counters() {
        let stats = StatsCollector::new();
        let clone = stats.clone();
        clone.track("msg.skipped");
        assert_eq!(stats.get("msg.skipped"), 1);

        stats.reset();
        assert_eq!(clone.get("msg.skipped"), 0);
    }
}
