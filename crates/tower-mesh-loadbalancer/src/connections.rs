//! In-flight connection accounting.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts in-flight calls per instance id.
///
/// Clones share the same counters. Counts are advisory: they feed
/// least-connections selection and nothing else.
#[derive(Clone, Debug, Default)]
pub struct ConnectionTracker {
    counts: Arc<DashMap<String, AtomicUsize>>,
}

impl ConnectionTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count for `id` and returns a guard that decrements it
    /// when dropped, whether the call succeeded, failed or was cancelled.
    pub fn acquire(&self, id: &str) -> ConnectionGuard {
        self.increment(id);
        ConnectionGuard {
            tracker: self.clone(),
            id: id.to_string(),
        }
    }

    /// Increments the count for `id`.
    pub fn increment(&self, id: &str) {
        if let Some(count) = self.counts.get(id) {
            count.fetch_add(1, Ordering::AcqRel);
            return;
        }
        self.counts
            .entry(id.to_string())
            .or_default()
            .fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the count for `id`, never below zero.
    pub fn decrement(&self, id: &str) {
        if let Some(count) = self.counts.get(id) {
            let _ = count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
    }

    /// Current count for `id`; zero if never seen.
    pub fn count(&self, id: &str) -> usize {
        self.counts
            .get(id)
            .map_or(0, |count| count.load(Ordering::Acquire))
    }

    /// Sets the count for `id`. Intended for seeding and tests.
    pub fn set(&self, id: &str, value: usize) {
        self.counts
            .entry(id.to_string())
            .or_default()
            .store(value, Ordering::Release);
    }

    /// Drops the counter for `id`.
    pub fn remove(&self, id: &str) {
        self.counts.remove(id);
    }

    /// Sum of all in-flight calls.
    pub fn total(&self) -> usize {
        self.counts
            .iter()
            .map(|entry| entry.value().load(Ordering::Acquire))
            .sum()
    }
}

/// Decrements an instance's connection count on drop.
#[must_use = "the connection is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ConnectionGuard {
    tracker: ConnectionTracker,
    id: String,
}

impl ConnectionGuard {
    /// Instance id this guard accounts for.
    pub fn instance_id(&self) -> &str {
        &self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.decrement(&self.id);
    }
}
