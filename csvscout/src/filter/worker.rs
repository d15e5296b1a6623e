use crossbeam_channel::{select, Sender};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cancel::Cancellation;
use super::planner::ChunkDescriptor;
use super::predicate::IdPredicate;
use super::scanner::RecordScanner;
use crate::metrics::ScanMetrics;
use crate::record::Record;

/// Why a worker stopped scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Reached the end of its chunk
    Exhausted,
    /// Published `quota` matches
    QuotaReached,
    /// Told to stop, or nobody is receiving matches any more
    Cancelled,
    /// Panicked mid-scan
    Aborted,
}

/// Completion signal sent once per worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub worker_id: usize,
    pub matched: usize,
    pub reason: ExitReason,
}

/// Scans one chunk and publishes the records accepted by its predicate
pub struct FilterWorker {
    id: usize,
    chunk: ChunkDescriptor,
    predicate: Arc<dyn IdPredicate>,
    quota: NonZeroUsize,
    metrics: ScanMetrics,
}

impl FilterWorker {
    pub fn new(
        id: usize,
        chunk: ChunkDescriptor,
        predicate: Arc<dyn IdPredicate>,
        quota: NonZeroUsize,
        metrics: ScanMetrics,
    ) -> Self {
        Self {
            id,
            chunk,
            predicate,
            quota,
            metrics,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn chunk(&self) -> ChunkDescriptor {
        self.chunk
    }

    /// Scans `source[chunk]` until the chunk ends, the quota is met or
    /// cancellation is observed. Blocks while `matches` is full, but a
    /// cancellation always unblocks it.
    pub fn run(
        &self,
        source: &[u8],
        matches: &Sender<Record>,
        cancel: &Cancellation,
    ) -> WorkerExit {
        let mut matched = 0;
        let scanner =
            RecordScanner::new(&source[self.chunk.range()]).with_metrics(self.metrics.clone());

        for record in scanner {
            if cancel.is_cancelled() {
                return self.exit(matched, ExitReason::Cancelled);
            }
            if !self.predicate.matches(record.id) {
                continue;
            }

            let published = select! {
                send(matches, record) -> res => res.is_ok(),
                recv(cancel.receiver()) -> _ => false,
            };
            if !published {
                return self.exit(matched, ExitReason::Cancelled);
            }

            self.metrics.record_published();
            matched += 1;
            if matched >= self.quota.get() {
                return self.exit(matched, ExitReason::QuotaReached);
            }
        }

        self.exit(matched, ExitReason::Exhausted)
    }

    /// Runs the worker, then signals completion on `completions`. The signal
    /// is sent from a drop guard, so it fires exactly once even if the scan
    /// panics.
    pub fn run_and_signal(
        self,
        source: &[u8],
        matches: Sender<Record>,
        completions: Sender<WorkerExit>,
        cancel: Cancellation,
    ) {
        let mut signal = CompletionSignal::new(self.id, completions, self.metrics.clone());
        let exit = self.run(source, &matches, &cancel);
        // Every publish happens-before the completion signal
        drop(matches);
        signal.complete(exit);
    }

    fn exit(&self, matched: usize, reason: ExitReason) -> WorkerExit {
        debug!(
            "Worker {} stopped ({:?}) after {} matches in {:?}",
            self.id,
            reason,
            matched,
            self.chunk.range()
        );
        WorkerExit {
            worker_id: self.id,
            matched,
            reason,
        }
    }
}

struct CompletionSignal {
    tx: Sender<WorkerExit>,
    exit: WorkerExit,
    metrics: ScanMetrics,
}

impl CompletionSignal {
    fn new(worker_id: usize, tx: Sender<WorkerExit>, metrics: ScanMetrics) -> Self {
        Self {
            tx,
            exit: WorkerExit {
                worker_id,
                matched: 0,
                reason: ExitReason::Aborted,
            },
            metrics,
        }
    }

    fn complete(&mut self, exit: WorkerExit) {
        self.exit = exit;
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        if self.exit.reason == ExitReason::Aborted {
            warn!("Worker {} aborted before finishing its chunk", self.exit.worker_id);
        }
        self.metrics.record_exit(self.exit.reason);
        // The collector may already be gone
        let _ = self.tx.send(self.exit);
    }
}
