use csv::{ReaderBuilder, StringRecord};
use tracing::trace;

use crate::metrics::ScanMetrics;
use crate::record::Record;

/// Lazily decodes the records of one chunk.
///
/// The scanner sees only the bytes it was given, so a realigned chunk yields
/// exactly the records that start inside it. Rows that fail to decode, or
/// whose id is not an integer, are skipped and counted; they never end the
/// scan.
pub struct RecordScanner<'a> {
    reader: csv::Reader<&'a [u8]>,
    row: StringRecord,
    skipped: u64,
    metrics: Option<ScanMetrics>,
}

impl<'a> RecordScanner<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);
        Self {
            reader,
            row: StringRecord::new(),
            skipped: 0,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ScanMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Number of malformed rows skipped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn skip(&mut self, reason: &dyn std::fmt::Display) {
        self.skipped += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_malformed();
        }
        trace!("Skipping malformed row: {}", reason);
    }
}

impl Iterator for RecordScanner<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            match self.reader.read_record(&mut self.row) {
                Ok(false) => return None,
                Ok(true) => match Record::from_fields(&self.row) {
                    Ok(record) => {
                        if let Some(metrics) = &self.metrics {
                            metrics.record_scanned();
                        }
                        return Some(record);
                    }
                    Err(defect) => self.skip(&defect),
                },
                // An in-memory slice cannot fail to read
                Err(e) if e.is_io_error() => return None,
                Err(e) => self.skip(&e),
            }
        }
    }
}
