//! Operational counters
//!
//! - Counters only, monotonic, reset on process start
//! - Relaxed atomics; exactness under concurrency is not required

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide engine counters.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    records_created: AtomicU64,
    versions_committed: AtomicU64,
    reads: AtomicU64,
    time_travel_reads: AtomicU64,
    history_reads: AtomicU64,
    client_errors: AtomicU64,
    internal_errors: AtomicU64,
    cancelled: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_created: u64,
    pub versions_committed: u64,
    pub reads: u64,
    pub time_travel_reads: u64,
    pub history_reads: u64,
    pub client_errors: u64,
    pub internal_errors: u64,
    pub cancelled: u64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new record was created (its version 1 committed).
    pub fn increment_records_created(&self) {
        self.records_created.fetch_add(1, Ordering::Relaxed);
        self.versions_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// An update committed a new version.
    pub fn increment_versions_committed(&self) {
        self.versions_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Latest or exact-version read.
    pub fn increment_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_time_travel_reads(&self) {
        self.time_travel_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_history_reads(&self) {
        self.history_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Invalid input or not-found outcome.
    pub fn increment_client_errors(&self) {
        self.client_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_created: self.records_created.load(Ordering::Relaxed),
            versions_committed: self.versions_committed.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            time_travel_reads: self.time_travel_reads.load(Ordering::Relaxed),
            history_reads: self.history_reads.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}
