//! Busy tracker and pending queue
//!
//! Per recipient there are two states: ABSENT (default, deliver now) and
//! BUSY (queue). The queue holds at most one body per (recipient,
//! category); a later write overwrites an earlier one. The busy→idle
//! transition drains the recipient's whole queue in one step.

use herald_core::types::Category;
use std::collections::{HashMap, HashSet};

/// Synchronous state container; the relay wraps it in an async mutex.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    busy: HashSet<String>,
    pending: HashMap<String, HashMap<Category, String>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self, handle: &str) -> bool {
        self.busy.contains(handle)
    }

    /// Mark a recipient busy. Idempotent.
    pub fn mark_busy(&mut self, handle: &str) {
        self.busy.insert(handle.to_string());
    }

    /// Queue a body for a busy recipient; last write per category wins
    pub fn queue(&mut self, handle: &str, category: Category, body: String) {
        self.pending
            .entry(handle.to_string())
            .or_default()
            .insert(category, body);
    }

    /// Clear the busy flag and atomically take everything queued for the
    /// recipient. Returns an empty vec if nothing was pending.
    pub fn clear_busy(&mut self, handle: &str) -> Vec<(Category, String)> {
        self.busy.remove(handle);
        self.pending
            .remove(handle)
            .map(|m| m.into_iter().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn pending_count(&self, handle: &str) -> usize {
        self.pending.get(handle).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_absent() {
        let tracker = PresenceTracker::new();
        assert!(!tracker.is_busy("alice"));
    }

    #[test]
    fn test_last_write_wins_per_category() {
        let mut tracker = PresenceTracker::new();
        tracker.mark_busy("alice");
        tracker.queue("alice", Category::Sale, "first".to_string());
        tracker.queue("alice", Category::Sale, "second".to_string());
        tracker.queue("alice", Category::Weather, "storm".to_string());

        assert_eq!(tracker.pending_count("alice"), 2);

        let mut flushed = tracker.clear_busy("alice");
        flushed.sort();
        assert_eq!(
            flushed,
            vec![
                (Category::Sale, "second".to_string()),
                (Category::Weather, "storm".to_string()),
            ]
        );
    }

    #[test]
    fn test_clear_busy_drains_once() {
        let mut tracker = PresenceTracker::new();
        tracker.mark_busy("alice");
        tracker.queue("alice", Category::Commit, "c3".to_string());

        assert_eq!(tracker.clear_busy("alice").len(), 1);
        assert!(!tracker.is_busy("alice"));
        assert!(tracker.clear_busy("alice").is_empty());
    }

    #[test]
    fn test_queues_are_per_recipient() {
        let mut tracker = PresenceTracker::new();
        tracker.mark_busy("alice");
        tracker.mark_busy("bob");
        tracker.queue("alice", Category::Sale, "a".to_string());
        tracker.queue("bob", Category::Sale, "b".to_string());

        assert_eq!(tracker.clear_busy("alice"), vec![(Category::Sale, "a".to_string())]);
        assert!(tracker.is_busy("bob"));
        assert_eq!(tracker.pending_count("bob"), 1);
    }
}
