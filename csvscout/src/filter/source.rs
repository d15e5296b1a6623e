use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Deref;
use std::path::Path;
use tracing::trace;

use crate::errors::{FilterError, FilterResult};
use crate::metrics::ScanMetrics;

const BUFFER_CAPACITY: usize = 65536;
pub const DEFAULT_MMAP_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// The bytes of a data file, opened once per filter call and shared
/// read-only by every worker.
#[derive(Debug)]
pub enum SourceBytes {
    Buffered(Vec<u8>),
    Mapped(Mmap),
}

impl SourceBytes {
    /// Opens `path` and loads it, reading small files into memory and
    /// memory-mapping files of at least `mmap_threshold` bytes.
    pub fn open(path: &Path, mmap_threshold: u64, metrics: &ScanMetrics) -> FilterResult<Self> {
        let file = File::open(path).map_err(|e| FilterError::from_io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| FilterError::from_io(path, e))?
            .len();

        // Zero-length maps are rejected on some platforms
        if len > 0 && len >= mmap_threshold {
            trace!("Memory-mapping {} ({} bytes)", path.display(), len);
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| FilterError::from_io(path, e))?;
            metrics.record_source(len, true);
            return Ok(SourceBytes::Mapped(mmap));
        }

        trace!("Reading {} into memory ({} bytes)", path.display(), len);
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut bytes = Vec::with_capacity(len as usize);
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| FilterError::from_io(path, e))?;
        metrics.record_source(bytes.len() as u64, false);
        Ok(SourceBytes::Buffered(bytes))
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, SourceBytes::Mapped(_))
    }
}

impl Deref for SourceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            SourceBytes::Buffered(bytes) => bytes,
            SourceBytes::Mapped(mmap) => mmap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_small_file_is_buffered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.csv");
        std::fs::write(&path, "1,bulbasaur\n2,ivysaur\n").unwrap();

        let metrics = ScanMetrics::new();
        let source = SourceBytes::open(&path, DEFAULT_MMAP_THRESHOLD, &metrics).unwrap();
        assert!(!source.is_mapped());
        assert_eq!(&source[..], b"1,bulbasaur\n2,ivysaur\n");
        assert_eq!(metrics.get_stats().buffered_bytes, 22);
    }

    #[test]
    fn test_threshold_switches_to_mmap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("large.csv");
        std::fs::write(&path, "1,bulbasaur\n").unwrap();

        let metrics = ScanMetrics::new();
        let source = SourceBytes::open(&path, 1, &metrics).unwrap();
        assert!(source.is_mapped());
        assert_eq!(&source[..], b"1,bulbasaur\n");
        assert_eq!(metrics.get_stats().mapped_bytes, 12);
    }

    #[test]
    fn test_empty_file_never_maps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();

        let source = SourceBytes::open(&path, 0, &ScanMetrics::new()).unwrap();
        assert!(!source.is_mapped());
        assert!(source.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = SourceBytes::open(
            &dir.path().join("nope.csv"),
            DEFAULT_MMAP_THRESHOLD,
            &ScanMetrics::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FilterError::FileNotFound(_)));
        assert!(err.is_io_failure());
    }
}
