use crossbeam_channel::bounded;
use rayon::ThreadPoolBuilder;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::cancel::cancellation;
use super::collector::{Finish, ResultCollector};
use super::planner::{plan_chunks, Target};
use super::predicate::FilterRegistry;
use super::source::SourceBytes;
use super::worker::FilterWorker;
use crate::config::FilterConfig;
use crate::errors::FilterResult;
use crate::metrics::{ScanMetrics, ScanStats};
use crate::record::Record;

// Default match channel size; crossbeam allocates every slot up front
const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Result of one filter call
#[derive(Debug, Clone)]
pub struct FilterOutput {
    /// Matches in arrival order, or sorted by id when configured
    pub records: Vec<Record>,
    pub finish: Finish,
    pub workers: usize,
    pub elapsed: Duration,
    pub stats: ScanStats,
}

/// Runs concurrent partitioned filters over a data file
#[derive(Debug, Clone)]
pub struct FilterEngine {
    config: FilterConfig,
    registry: FilterRegistry,
}

impl FilterEngine {
    /// Creates an engine with the built-in `odd` and `even` kinds
    pub fn new(config: FilterConfig) -> Self {
        Self::with_registry(config, FilterRegistry::new())
    }

    pub fn with_registry(config: FilterConfig, registry: FilterRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn registry_mut(&mut self) -> &mut FilterRegistry {
        &mut self.registry
    }

    /// Filters the configured data file
    pub fn filter_by_type(
        &self,
        filter_kind: &str,
        desired_matches: i64,
        per_worker_quota: i64,
    ) -> FilterResult<Vec<Record>> {
        self.filter_file(
            &self.config.data_file,
            filter_kind,
            desired_matches,
            per_worker_quota,
        )
        .map(|output| output.records)
    }

    /// Filters `path` with `ceil(desired_matches / per_worker_quota)` workers.
    ///
    /// Returns at most `desired_matches` records. Fewer is a valid outcome
    /// when the file runs out of qualifying rows. Parameter and I/O errors
    /// are reported before any worker starts. Outstanding workers are
    /// cancelled and joined before this returns.
    pub fn filter_file(
        &self,
        path: &Path,
        filter_kind: &str,
        desired_matches: i64,
        per_worker_quota: i64,
    ) -> FilterResult<FilterOutput> {
        info!(
            "Filtering {} by {:?}: items={}, items_per_worker={}",
            path.display(),
            filter_kind,
            desired_matches,
            per_worker_quota
        );
        let started = Instant::now();

        let target = Target::new(desired_matches, per_worker_quota)?;
        let metrics = ScanMetrics::new();
        let source = Arc::new(SourceBytes::open(
            path,
            self.config.mmap_threshold,
            &metrics,
        )?);

        let chunks = plan_chunks(&source, &target);
        let num_workers = chunks.len();
        let desired = target.desired_matches.get();
        let predicate = self.registry.resolve(filter_kind);

        let capacity = self
            .config
            .channel_capacity
            .unwrap_or_else(|| desired.min(DEFAULT_CHANNEL_CAPACITY));
        let (match_tx, match_rx) = bounded(capacity);
        let (done_tx, done_rx) = bounded(num_workers);
        let (mut cancel_handle, cancel) = cancellation();

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers.min(self.config.thread_count.get()))
            .thread_name(|i| format!("csvscout-worker-{}", i))
            .panic_handler(|_| warn!("Filter worker panicked"))
            .build()?;
        debug!(
            "Spawning {} workers on {} threads (channel capacity {})",
            num_workers,
            pool.current_num_threads(),
            capacity
        );

        for (id, chunk) in chunks.into_iter().enumerate() {
            let worker = FilterWorker::new(
                id,
                chunk,
                Arc::clone(&predicate),
                target.per_worker_quota,
                metrics.clone(),
            );
            let source = Arc::clone(&source);
            let matches = match_tx.clone();
            let completions = done_tx.clone();
            let cancel = cancel.clone();
            pool.spawn(move || worker.run_and_signal(&source, matches, completions, cancel));
        }
        drop(match_tx);
        drop(done_tx);

        let collector = ResultCollector::new(match_rx, done_rx, num_workers, desired);
        let collected = collector.collect();

        cancel_handle.cancel();
        if collected.pending_workers > 0 {
            debug!(
                "Cancelling {} outstanding workers",
                collected.pending_workers
            );
            collector.await_workers(collected.pending_workers);
        }

        let mut records = collected.records;
        if self.config.sort_results {
            records.sort_by_key(|record| record.id);
        }

        let elapsed = started.elapsed();
        let stats = metrics.get_stats();
        metrics.log_stats();
        if stats.malformed_skipped > 0 {
            warn!(
                "Skipped {} malformed rows in {}",
                stats.malformed_skipped,
                path.display()
            );
        }
        info!(
            "Filter complete. {} of {} requested records ({:?}) in {}",
            records.len(),
            desired,
            collected.finish,
            humantime::format_duration(elapsed)
        );

        Ok(FilterOutput {
            records,
            finish: collected.finish,
            workers: num_workers,
            elapsed,
            stats,
        })
    }
}

/// Filters `config.data_file` with the built-in kinds
pub fn filter_by_type(
    config: &FilterConfig,
    filter_kind: &str,
    desired_matches: i64,
    per_worker_quota: i64,
) -> FilterResult<Vec<Record>> {
    FilterEngine::new(config.clone()).filter_by_type(filter_kind, desired_matches, per_worker_quota)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FilterError;
    use std::collections::HashSet;
    use std::num::NonZeroUsize;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    fn write_rows(dir: &TempDir, n: i64) -> PathBuf {
        let path = dir.path().join("pokemon.csv");
        let content: String = (1..=n).map(|i| format!("{},pokemon{}\n", i, i)).collect();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn engine(path: PathBuf) -> FilterEngine {
        FilterEngine::new(FilterConfig {
            data_file: path,
            thread_count: NonZeroUsize::new(4).unwrap(),
            ..Default::default()
        })
    }

    #[test]
    fn test_odd_scenario() {
        let dir = tempdir().unwrap();
        let engine = engine(write_rows(&dir, 100));

        let records = engine.filter_by_type("odd", 5, 3).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.id % 2 == 1));
        let ids: HashSet<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 5);
        for record in &records {
            assert_eq!(record.name, format!("pokemon{}", record.id));
        }
    }

    #[test]
    fn test_even_parity() {
        let dir = tempdir().unwrap();
        let engine = engine(write_rows(&dir, 60));
        let records = engine.filter_by_type("even", 12, 2).unwrap();
        assert_eq!(records.len(), 12);
        assert!(records.iter().all(|r| r.id % 2 == 0));
    }

    #[test]
    fn test_exhaustion_returns_everything() {
        let dir = tempdir().unwrap();
        let engine = engine(write_rows(&dir, 9));
        let output = engine
            .filter_file(&dir.path().join("pokemon.csv"), "even", 50, 7)
            .unwrap();

        let mut ids: Vec<i64> = output.records.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 4, 6, 8]);
        assert_eq!(output.finish, Finish::WorkersFinished);
        assert_eq!(output.workers, 8);
        assert_eq!(output.stats.worker_exits(), 8);
    }

    #[test]
    fn test_unknown_kind_returns_empty() {
        let dir = tempdir().unwrap();
        let engine = engine(write_rows(&dir, 20));
        let records = engine.filter_by_type("prime", 5, 1).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        let dir = tempdir().unwrap();
        let engine = engine(write_rows(&dir, 10));
        for (items, per_worker) in [(0, 1), (-1, 1), (1, 0), (1, -5)] {
            let err = engine.filter_by_type("odd", items, per_worker).unwrap_err();
            assert!(matches!(err, FilterError::InvalidParameter(_)));
        }
    }

    #[test]
    fn test_invalid_parameters_checked_before_io() {
        let engine = engine(PathBuf::from("/definitely/not/here.csv"));
        let err = engine.filter_by_type("odd", 0, 1).unwrap_err();
        assert!(matches!(err, FilterError::InvalidParameter(_)));
    }

    #[test]
    fn test_missing_file_is_io_failure() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path().join("missing.csv"));
        let err = engine.filter_by_type("odd", 3, 1).unwrap_err();
        assert!(err.is_io_failure());
    }

    #[test]
    fn test_sorted_results() {
        let dir = tempdir().unwrap();
        let path = write_rows(&dir, 200);
        let engine = FilterEngine::new(FilterConfig {
            data_file: path,
            thread_count: NonZeroUsize::new(4).unwrap(),
            sort_results: true,
            ..Default::default()
        });

        let records = engine.filter_by_type("odd", 20, 2).unwrap();
        assert_eq!(records.len(), 20);
        assert!(records.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_custom_kind() {
        let dir = tempdir().unwrap();
        let mut engine = engine(write_rows(&dir, 100));
        engine
            .registry_mut()
            .register("fizzbuzz", |id: i64| id % 15 == 0);

        let mut ids: Vec<i64> = engine
            .filter_by_type("fizzbuzz", 10, 1)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![15, 30, 45, 60, 75, 90]);
    }

    #[test]
    fn test_small_channel_and_single_thread() {
        let dir = tempdir().unwrap();
        let engine = FilterEngine::new(FilterConfig {
            data_file: write_rows(&dir, 500),
            thread_count: NonZeroUsize::new(1).unwrap(),
            channel_capacity: Some(0),
            ..Default::default()
        });

        let records = engine.filter_by_type("odd", 30, 4).unwrap();
        assert_eq!(records.len(), 30);
        assert!(records.iter().all(|r| r.id % 2 == 1));
    }

    #[test]
    fn test_memory_mapped_source() {
        let dir = tempdir().unwrap();
        let engine = FilterEngine::new(FilterConfig {
            data_file: write_rows(&dir, 300),
            mmap_threshold: 1,
            ..Default::default()
        });

        let output = engine
            .filter_file(&dir.path().join("pokemon.csv"), "even", 10, 5)
            .unwrap();
        assert_eq!(output.records.len(), 10);
        assert!(output.stats.mapped_bytes > 0);
        assert_eq!(output.stats.buffered_bytes, 0);
    }

    #[test]
    fn test_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();
        let records = engine(path).filter_by_type("odd", 4, 2).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_free_function() {
        let dir = tempdir().unwrap();
        let config = FilterConfig {
            data_file: write_rows(&dir, 10),
            ..Default::default()
        };
        let records = filter_by_type(&config, "odd", 2, 2).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_huge_target_on_small_file() {
        let dir = tempdir().unwrap();
        let engine = engine(write_rows(&dir, 10));

        let output = engine
            .filter_file(&dir.path().join("pokemon.csv"), "odd", 1 << 50, 1 << 50)
            .unwrap();
        assert_eq!(output.workers, 1);
        let mut ids: Vec<i64> = output.records.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3, 5, 7, 9]);
        assert_eq!(output.finish, Finish::WorkersFinished);
    }

    #[test]
    fn test_repeated_calls_are_independent() {
        let dir = tempdir().unwrap();
        let engine = engine(write_rows(&dir, 100));
        for _ in 0..20 {
            let records = engine.filter_by_type("odd", 7, 2).unwrap();
            assert_eq!(records.len(), 7);
        }
    }
}
