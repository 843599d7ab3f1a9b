//! Delivery Tracking
//!
//! Remembers which order identifiers have already been handed to the host
//! for execution, so a store that returns the same order again (stale read,
//! failed acknowledgment) does not cause a second dispatch within the same
//! process lifetime.
//!
//! # Design
//!
//! The tracker is the only mutable state shared between poll cycles. The
//! check and the mark happen under one lock in [`DeliveryTracker::claim`],
//! so two cycles can never both win the same identifier. Entries are never
//! evicted; after a restart the store's `delivered` flag is the source of
//! truth.

use std::collections::HashSet;

use parking_lot::Mutex;

/// Set of order identifiers already dispatched.
///
/// Implementations must make [`claim`](Self::claim) atomic with respect to
/// every other call on the same tracker.
pub trait DeliveryTracker: Send + Sync {
    /// Whether the identifier was already dispatched.
    fn seen(&self, order_id: &str) -> bool;

    /// Record the identifier as dispatched.
    fn mark_seen(&self, order_id: &str);

    /// Check and mark in one step.
    ///
    /// Returns `true` if this call recorded the identifier, `false` if it
    /// was already present.
    fn claim(&self, order_id: &str) -> bool;

    /// Number of identifiers recorded.
    fn len(&self) -> usize;

    /// Whether no identifier has been recorded.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime tracker backed by a hash set.
#[derive(Debug, Default)]
pub struct InMemoryDeliveryTracker {
    ids: Mutex<HashSet<String>>,
}

impl InMemoryDeliveryTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeliveryTracker for InMemoryDeliveryTracker {
    fn seen(&self, order_id: &str) -> bool {
        self.ids.lock().contains(order_id)
    }

    fn mark_seen(&self, order_id: &str) {
        self.ids.lock().insert(order_id.to_string());
    }

    fn claim(&self, order_id: &str) -> bool {
        self.ids.lock().insert(order_id.to_string())
    }

    fn len(&self) -> usize {
        self.ids.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn unseen_until_marked() {
        let tracker = InMemoryDeliveryTracker::new();
        assert!(!tracker.seen("o1"));
        tracker.mark_seen("o1");
        assert!(tracker.seen("o1"));
        assert!(!tracker.seen("o2"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn mark_seen_is_idempotent() {
        let tracker = InMemoryDeliveryTracker::new();
        tracker.mark_seen("o1");
        tracker.mark_seen("o1");
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn claim_wins_only_once() {
        let tracker = InMemoryDeliveryTracker::new();
        assert!(tracker.is_empty());
        assert!(tracker.claim("o1"));
        assert!(!tracker.claim("o1"));
        assert!(tracker.seen("o1"));
    }

    #[test]
    fn claim_after_mark_seen_loses() {
        let tracker = InMemoryDeliveryTracker::new();
        tracker.mark_seen("o1");
        assert!(!tracker.claim("o1"));
    }

    #[test]
    fn concurrent_claims_have_single_winner() {
        let tracker = Arc::new(InMemoryDeliveryTracker::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || (0..100).filter(|i| tracker.claim(&format!("o{i}"))).count())
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 100);
        assert_eq!(tracker.len(), 100);
    }
}
