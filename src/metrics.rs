use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing upload and indexing activity.
#[derive(Default)]
pub struct IndexingMetrics {
    documents_indexed: AtomicU64,
    documents_skipped: AtomicU64,
    documents_failed: AtomicU64,
    status_polls: AtomicU64,
    documents_deleted: AtomicU64,
}

impl IndexingMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document that reached `active`.
    pub fn record_indexed(&self) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload skipped because the filename already existed.
    pub fn record_skipped(&self) {
        self.documents_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload that failed, timed out, or was rejected.
    pub fn record_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record status polls issued for one upload.
    pub fn record_polls(&self, polls: u32) {
        self.status_polls
            .fetch_add(u64::from(polls), Ordering::Relaxed);
    }

    /// Record documents removed from the store.
    pub fn record_deleted(&self, count: usize) {
        self.documents_deleted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            documents_skipped: self.documents_skipped.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            status_polls: self.status_polls.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of indexing counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents that finished indexing since startup.
    pub documents_indexed: u64,
    /// Uploads skipped as duplicates.
    pub documents_skipped: u64,
    /// Uploads that failed validation, indexing, or timed out.
    pub documents_failed: u64,
    /// Status polls issued across all uploads.
    pub status_polls: u64,
    /// Documents deleted through clear or remove.
    pub documents_deleted: u64,
}
