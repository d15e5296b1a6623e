use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::filter::worker::ExitReason;

/// Counters shared by every worker of a filter call
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // Scan metrics
    records_scanned: Arc<AtomicU64>,
    malformed_skipped: Arc<AtomicU64>,
    matches_published: Arc<AtomicU64>,

    // Worker exit metrics
    workers_exhausted: Arc<AtomicU64>,
    workers_at_quota: Arc<AtomicU64>,
    workers_cancelled: Arc<AtomicU64>,
    workers_aborted: Arc<AtomicU64>,

    // Source metrics
    buffered_bytes: Arc<AtomicU64>,
    mapped_bytes: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            records_scanned: Arc::new(AtomicU64::new(0)),
            malformed_skipped: Arc::new(AtomicU64::new(0)),
            matches_published: Arc::new(AtomicU64::new(0)),
            workers_exhausted: Arc::new(AtomicU64::new(0)),
            workers_at_quota: Arc::new(AtomicU64::new(0)),
            workers_cancelled: Arc::new(AtomicU64::new(0)),
            workers_aborted: Arc::new(AtomicU64::new(0)),
            buffered_bytes: Arc::new(AtomicU64::new(0)),
            mapped_bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_scanned(&self) {
        self.records_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.matches_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records how a worker stopped
    pub fn record_exit(&self, reason: ExitReason) {
        let counter = match reason {
            ExitReason::Exhausted => &self.workers_exhausted,
            ExitReason::QuotaReached => &self.workers_at_quota,
            ExitReason::Cancelled => &self.workers_cancelled,
            ExitReason::Aborted => &self.workers_aborted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records how the source bytes were loaded
    pub fn record_source(&self, bytes: u64, mapped: bool) {
        let total = if mapped {
            self.mapped_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes
        } else {
            self.buffered_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes
        };
        debug!(
            "Source loaded: {} bytes ({}), total: {} bytes",
            bytes,
            if mapped { "mapped" } else { "buffered" },
            total
        );
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            records_scanned: self.records_scanned.load(Ordering::Relaxed),
            malformed_skipped: self.malformed_skipped.load(Ordering::Relaxed),
            matches_published: self.matches_published.load(Ordering::Relaxed),
            workers_exhausted: self.workers_exhausted.load(Ordering::Relaxed),
            workers_at_quota: self.workers_at_quota.load(Ordering::Relaxed),
            workers_cancelled: self.workers_cancelled.load(Ordering::Relaxed),
            workers_aborted: self.workers_aborted.load(Ordering::Relaxed),
            buffered_bytes: self.buffered_bytes.load(Ordering::Relaxed),
            mapped_bytes: self.mapped_bytes.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Records scanned: {}\n\
             Malformed rows skipped: {}\n\
             Matches published: {}\n\
             Worker exits (exhausted/quota/cancelled/aborted): {}/{}/{}/{}\n\
             Source bytes (buffered/mapped): {}/{}",
            stats.records_scanned,
            stats.malformed_skipped,
            stats.matches_published,
            stats.workers_exhausted,
            stats.workers_at_quota,
            stats.workers_cancelled,
            stats.workers_aborted,
            stats.buffered_bytes,
            stats.mapped_bytes
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub records_scanned: u64,
    pub malformed_skipped: u64,
    pub matches_published: u64,
    pub workers_exhausted: u64,
    pub workers_at_quota: u64,
    pub workers_cancelled: u64,
    pub workers_aborted: u64,
    pub buffered_bytes: u64,
    pub mapped_bytes: u64,
}

impl ScanStats {
    pub fn worker_exits(&self) -> u64 {
        self.workers_exhausted + self.workers_at_quota + self.workers_cancelled + self.workers_aborted
    }
}
