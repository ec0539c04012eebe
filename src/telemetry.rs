//! Parse Telemetry
//!
//! Passive accumulator observing the engine: node/attribute/text counts,
//! maximum depth reached, per-tag and per-attribute frequency, and elapsed
//! parse duration. A fresh collector is built for every parse invocation
//! (never a process-wide singleton) and frozen into an immutable snapshot
//! when the call returns, on success and on failure alike.

use std::cell::Cell;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Mutable counters updated by the engine during a single parse.
#[derive(Debug, Default)]
pub struct StatsCollector {
    total_nodes: usize,
    max_depth: usize,
    total_attributes: usize,
    total_text_length: usize,
    tag_counts: HashMap<String, usize>,
    attribute_counts: HashMap<String, usize>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node created at the given depth
    pub fn record_node(&mut self, depth: usize) {
        self.total_nodes += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record an accepted tag name
    pub fn record_tag(&mut self, name: &str) {
        *self.tag_counts.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Record an accepted attribute
    pub fn record_attribute(&mut self, name: &str) {
        self.total_attributes += 1;
        *self.attribute_counts.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Record assigned character data
    pub fn record_text(&mut self, len: usize) {
        self.total_text_length += len;
    }

    /// Freeze the counters into an immutable snapshot.
    pub fn snapshot(&self, parse_time: Duration) -> StatsSnapshot {
        StatsSnapshot {
            total_nodes: self.total_nodes,
            max_depth: self.max_depth,
            total_attributes: self.total_attributes,
            total_text_length: self.total_text_length,
            tag_counts: self.tag_counts.clone(),
            attribute_counts: self.attribute_counts.clone(),
            parse_time,
        }
    }
}

/// Immutable post-parse statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Number of element nodes constructed
    pub total_nodes: usize,
    /// Deepest node depth reached (root is 0)
    pub max_depth: usize,
    /// Number of accepted attributes
    pub total_attributes: usize,
    /// Total stored character-data length
    pub total_text_length: usize,
    /// Occurrences per tag name
    pub tag_counts: HashMap<String, usize>,
    /// Occurrences per attribute name
    pub attribute_counts: HashMap<String, usize>,
    /// Wall-clock duration of the parse call
    pub parse_time: Duration,
}

impl StatsSnapshot {
    /// Tags by descending frequency, for diagnostics output.
    pub fn top_tags(&self, n: usize) -> Vec<(&str, usize)> {
        let mut tags: Vec<_> = self
            .tag_counts
            .iter()
            .map(|(name, &count)| (name.as_str(), count))
            .collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        tags.truncate(n);
        tags
    }
}

/// Scope guard stamping elapsed wall-clock time into a slot on drop.
///
/// Started when the top-level parse call begins; the Drop impl runs on
/// every exit path, including error unwinds, so the recorded duration is
/// never lost to an early return.
pub(crate) struct TimerGuard<'a> {
    start: Instant,
    slot: &'a Cell<Duration>,
}

impl<'a> TimerGuard<'a> {
    pub(crate) fn new(slot: &'a Cell<Duration>) -> Self {
        TimerGuard {
            start: Instant::now(),
            slot,
        }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.slot.set(self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let mut stats = StatsCollector::new();
        stats.record_node(0);
        stats.record_node(1);
        stats.record_node(1);
        stats.record_tag("root");
        stats.record_tag("item");
        stats.record_tag("item");
        stats.record_attribute("id");
        stats.record_text(5);

        let snap = stats.snapshot(Duration::from_millis(3));
        assert_eq!(snap.total_nodes, 3);
        assert_eq!(snap.max_depth, 1);
        assert_eq!(snap.total_attributes, 1);
        assert_eq!(snap.total_text_length, 5);
        assert_eq!(snap.tag_counts.get("item"), Some(&2));
        assert_eq!(snap.attribute_counts.get("id"), Some(&1));
        assert_eq!(snap.parse_time, Duration::from_millis(3));
    }

    #[test]
    fn test_top_tags_ordering() {
        let mut stats = StatsCollector::new();
        for _ in 0..3 {
            stats.record_tag("b");
        }
        stats.record_tag("a");
        let snap = stats.snapshot(Duration::ZERO);
        assert_eq!(snap.top_tags(2), vec![("b", 3), ("a", 1)]);
    }

    #[test]
    fn test_timer_guard_stamps_on_drop() {
        let slot = Cell::new(Duration::ZERO);
        {
            let _guard = TimerGuard::new(&slot);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(slot.get() >= Duration::from_millis(1));
    }

    #[test]
    fn test_timer_guard_stamps_on_early_exit() {
        let sentinel = Duration::from_secs(u64::MAX);
        let slot = Cell::new(sentinel);
        let result: Result<(), ()> = (|| {
            let _guard = TimerGuard::new(&slot);
            Err(())
        })();
        assert!(result.is_err());
        assert!(slot.get() < sentinel);
    }
}
