//! Loop Statistics
//!
//! Counters shared between the poll loop, its acknowledgment tasks, and the
//! health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Live counters for the fulfillment loop.
#[derive(Debug, Default)]
pub struct LoopStats {
    cycles: AtomicU64,
    fetch_failures: AtomicU64,
    consecutive_fetch_failures: AtomicU64,
    dispatched: AtomicU64,
    command_failures: AtomicU64,
    dispatch_faults: AtomicU64,
    acknowledged: AtomicU64,
    ack_failures: AtomicU64,
    last_success: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
}

/// Point-in-time copy of [`LoopStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopStatsSnapshot {
    /// Poll cycles started.
    pub cycles: u64,
    /// Cycles skipped because the store could not be read.
    pub fetch_failures: u64,
    /// Fetch failures since the last successful cycle.
    pub consecutive_fetch_failures: u64,
    /// Orders handed to the host.
    pub dispatched: u64,
    /// Orders whose command the host reported as failed.
    pub command_failures: u64,
    /// Orders that never got a host answer.
    pub dispatch_faults: u64,
    /// Orders marked delivered in the store.
    pub acknowledged: u64,
    /// Acknowledgments the store rejected.
    pub ack_failures: u64,
    /// End of the last successful fetch.
    pub last_success: Option<DateTime<Utc>>,
    /// Most recent fetch error.
    pub last_error: Option<String>,
}

impl LoopStats {
    /// Create zeroed statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_success(&self) {
        self.consecutive_fetch_failures.store(0, Ordering::Relaxed);
        *self.last_success.write() = Some(Utc::now());
    }

    pub(crate) fn record_fetch_failure(&self, error: String) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_fetch_failures
            .fetch_add(1, Ordering::Relaxed);
        *self.last_error.write() = Some(error);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_command_failure(&self) {
        self.command_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch_fault(&self) {
        self.dispatch_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_acknowledged(&self) {
        self.acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ack_failure(&self) {
        self.ack_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Poll cycles started.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Fetch failures since the last successful cycle.
    #[must_use]
    pub fn consecutive_fetch_failures(&self) -> u64 {
        self.consecutive_fetch_failures.load(Ordering::Relaxed)
    }

    /// End of the last successful fetch, if any.
    #[must_use]
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read()
    }

    /// Copy every counter.
    #[must_use]
    pub fn snapshot(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            consecutive_fetch_failures: self.consecutive_fetch_failures.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
            dispatch_faults: self.dispatch_faults.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
            last_success: *self.last_success.read(),
            last_error: self.last_error.read().clone(),
        }
    }
}
