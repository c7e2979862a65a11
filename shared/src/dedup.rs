//! Bounded record of applied command timestamps.

use std::collections::{HashSet, VecDeque};

/// Fixed-capacity window of recently applied timestamps.
///
/// Used on both roles to make command and state application at-most-once
/// under duplicate or replayed delivery. The oldest entry is evicted when
/// the window is full.
#[derive(Debug, Clone)]
pub struct TimestampWindow {
    capacity: usize,
    order: VecDeque<u64>,
    seen: HashSet<u64>,
    latest: Option<f64>,
}

fn key(timestamp: f64) -> u64 {
    // -0.0 and 0.0 must collide
    if timestamp == 0.0 {
        0
    } else {
        timestamp.to_bits()
    }
}

impl TimestampWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "timestamp window needs a non-zero capacity");
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            latest: None,
        }
    }

    /// Records `timestamp`. Returns false if it was already in the window.
    pub fn try_insert(&mut self, timestamp: f64) -> bool {
        let key = key(timestamp);
        if !self.seen.insert(key) {
            return false;
        }

        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }

        self.latest = Some(match self.latest {
            Some(latest) => latest.max(timestamp),
            None => timestamp,
        });
        true
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        self.seen.contains(&key(timestamp))
    }

    /// True if a newer timestamp has already been applied.
    pub fn is_stale(&self, timestamp: f64) -> bool {
        self.latest.is_some_and(|latest| timestamp < latest)
    }

    /// Newest timestamp ever inserted, including evicted ones.
    pub fn latest(&self) -> Option<f64> {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_is_rejected() {
        let mut window = TimestampWindow::new(4);
        assert!(window.try_insert(1.5));
        assert!(!window.try_insert(1.5));
        assert!(window.contains(1.5));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_oldest_is_evicted_on_overflow() {
        let mut window = TimestampWindow::new(3);
        for ts in [1.0, 2.0, 3.0, 4.0] {
            assert!(window.try_insert(ts));
        }

        assert_eq!(window.len(), 3);
        assert!(!window.contains(1.0));
        assert!(window.contains(4.0));
        // evicted entries are accepted again
        assert!(window.try_insert(1.0));
    }

    #[test]
    fn test_staleness_tracks_newest_ever() {
        let mut window = TimestampWindow::new(2);
        assert!(!window.is_stale(10.0));
        window.try_insert(5.0);
        window.try_insert(3.0);
        assert!(window.is_stale(4.0));
        assert!(!window.is_stale(5.0));
        assert_eq!(window.latest(), Some(5.0));
    }

    #[test]
    fn test_signed_zero_collides() {
        let mut window = TimestampWindow::new(2);
        assert!(window.try_insert(0.0));
        assert!(!window.try_insert(-0.0));
    }
}
