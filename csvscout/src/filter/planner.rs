use std::num::NonZeroUsize;
use std::ops::Range;
use tracing::{debug, trace};

use crate::errors::{FilterError, FilterResult};

const RECORD_TERMINATOR: u8 = b'\n';

/// How many matches a filter call wants and how many each worker may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub desired_matches: NonZeroUsize,
    pub per_worker_quota: NonZeroUsize,
}

impl Target {
    /// Validates caller-supplied counts. Both must be strictly positive.
    pub fn new(desired_matches: i64, per_worker_quota: i64) -> FilterResult<Self> {
        let desired_matches = positive(desired_matches, "items")?;
        let per_worker_quota = positive(per_worker_quota, "items per worker")?;
        Ok(Self {
            desired_matches,
            per_worker_quota,
        })
    }

    /// `ceil(desired_matches / per_worker_quota)`
    pub fn num_workers(&self) -> usize {
        self.desired_matches
            .get()
            .div_ceil(self.per_worker_quota.get())
    }
}

fn positive(value: i64, name: &str) -> FilterResult<NonZeroUsize> {
    usize::try_from(value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            FilterError::invalid_parameter(format!("{} must be greater than 0, got {}", name, value))
        })
}

/// Half-open byte range `[start_offset, end_offset)` owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub start_offset: usize,
    pub end_offset: usize,
}

impl ChunkDescriptor {
    pub fn range(&self) -> Range<usize> {
        self.start_offset..self.end_offset
    }

    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }
}

/// Splits `bytes` into one chunk per worker.
///
/// Each tentative boundary at `i * (len / num_workers)` is pushed forward to
/// the first byte after the record it lands in, so no record is ever split.
/// Start and end offsets are realigned with the same rule, which makes
/// neighbouring chunks meet exactly and their union cover `[0, len)`. Chunks
/// may come out empty when records are longer than the raw chunk size.
///
/// Records are newline terminated; quoted fields containing a newline are
/// not recognised as a single record at a chunk boundary.
pub fn plan_chunks(bytes: &[u8], target: &Target) -> Vec<ChunkDescriptor> {
    let len = bytes.len();
    let num_workers = target.num_workers();
    let raw_chunk_size = len / num_workers;

    debug!(
        "Planning {} chunks over {} bytes (raw chunk size {})",
        num_workers, len, raw_chunk_size
    );

    (0..num_workers)
        .map(|i| {
            let start = i * raw_chunk_size;
            let end = if i + 1 == num_workers {
                len
            } else {
                start + raw_chunk_size
            };

            let chunk = ChunkDescriptor {
                start_offset: realign(bytes, start),
                end_offset: realign(bytes, end),
            };
            trace!("Chunk {}: {:?} (raw {}..{})", i, chunk.range(), start, end);
            chunk
        })
        .collect()
}

/// Moves `offset` to the start of the next whole record unless it already
/// sits on one.
fn realign(bytes: &[u8], offset: usize) -> usize {
    let len = bytes.len();
    if offset == 0 || offset >= len {
        return offset.min(len);
    }
    if bytes[offset - 1] == RECORD_TERMINATOR {
        return offset;
    }
    bytes[offset..]
        .iter()
        .position(|&b| b == RECORD_TERMINATOR)
        .map_or(len, |pos| offset + pos + 1)
}
