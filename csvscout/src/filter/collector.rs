use crossbeam_channel::{select, Receiver};
use tracing::{debug, trace};

use super::worker::WorkerExit;
use crate::record::Record;

// Avoids a huge up-front allocation for very large targets
const MAX_PREALLOCATED: usize = 4096;

/// Why collection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// `desired_matches` records arrived
    TargetReached,
    /// Every worker stopped first; fewer records may have arrived
    WorkersFinished,
}

/// Records in arrival order plus what the orchestrator needs for shutdown
#[derive(Debug)]
pub struct Collected {
    pub records: Vec<Record>,
    pub finish: Finish,
    /// Workers that had not signalled completion when collection ended
    pub pending_workers: usize,
}

/// Aggregates worker output on the calling thread.
///
/// Each step blocks on a `select!` over the match and completion channels.
/// Collection ends when the target is reached or when the last worker has
/// signalled; in the latter case every match still queued is drained first.
/// Workers publish before they signal, so nothing produced is missed.
pub struct ResultCollector {
    matches: Receiver<Record>,
    completions: Receiver<WorkerExit>,
    num_workers: usize,
    desired_matches: usize,
}

impl ResultCollector {
    pub fn new(
        matches: Receiver<Record>,
        completions: Receiver<WorkerExit>,
        num_workers: usize,
        desired_matches: usize,
    ) -> Self {
        Self {
            matches,
            completions,
            num_workers,
            desired_matches,
        }
    }

    pub fn collect(&self) -> Collected {
        let mut records = Vec::with_capacity(self.desired_matches.min(MAX_PREALLOCATED));
        let mut pending = self.num_workers;
        let mut matches_open = true;

        while records.len() < self.desired_matches && pending > 0 && matches_open {
            select! {
                recv(self.matches) -> msg => match msg {
                    Ok(record) => {
                        trace!("Collected record {}", record.id);
                        records.push(record);
                    }
                    // Every worker has dropped its sender
                    Err(_) => matches_open = false,
                },
                recv(self.completions) -> msg => match msg {
                    Ok(exit) => {
                        pending -= 1;
                        debug!(
                            "Worker {} finished ({:?}), {} still running",
                            exit.worker_id, exit.reason, pending
                        );
                    }
                    Err(_) => pending = 0,
                },
            }
        }

        if records.len() < self.desired_matches {
            records.extend(
                self.matches
                    .try_iter()
                    .take(self.desired_matches - records.len()),
            );
        }

        let finish = if records.len() == self.desired_matches {
            Finish::TargetReached
        } else {
            Finish::WorkersFinished
        };
        Collected {
            records,
            finish,
            pending_workers: pending,
        }
    }

    /// Blocks until `pending` more workers have signalled completion. Call
    /// after cancelling so the wait is bounded.
    pub fn await_workers(&self, pending: usize) {
        for _ in 0..pending {
            match self.completions.recv() {
                Ok(exit) => trace!("Worker {} acknowledged ({:?})", exit.worker_id, exit.reason),
                Err(_) => break,
            }
        }
    }
}
