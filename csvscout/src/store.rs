use csv::{ReaderBuilder, WriterBuilder};
use dashmap::DashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::FilterConfig;
use crate::enrich::ImageSource;
use crate::errors::{FilterError, FilterResult};
use crate::filter::FilterEngine;
use crate::record::Record;

/// In-memory copy of a data file, keyed by id.
///
/// Loading is strict: unlike the concurrent filter, which skips malformed
/// rows, a bad row here fails the whole load. Writes go back to the same
/// file through [`RecordStore::persist`].
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    records: DashMap<i64, Record>,
    engine: FilterEngine,
}

impl RecordStore {
    /// Loads `path` using default filter settings
    pub fn load(path: impl Into<PathBuf>) -> FilterResult<Self> {
        let config = FilterConfig {
            data_file: path.into(),
            ..Default::default()
        };
        Self::open(&config)
    }

    /// Loads `config.data_file`; filters run with `config`'s settings
    pub fn open(config: &FilterConfig) -> FilterResult<Self> {
        let path = config.data_file.clone();
        let records = read_records(&path)?;
        info!("Loaded {} records from {}", records.len(), path.display());
        Ok(Self {
            path,
            records,
            engine: FilterEngine::new(config.clone()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get_by_id(&self, id: i64) -> FilterResult<Record> {
        self.records
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(FilterError::RecordNotFound(id))
    }

    /// All records, sorted by id
    pub fn get_all(&self) -> Vec<Record> {
        let mut all: Vec<Record> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|record| record.id);
        all
    }

    pub fn set_image(&self, id: i64, image: impl Into<String>) -> FilterResult<()> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or(FilterError::RecordNotFound(id))?;
        entry.image = image.into();
        Ok(())
    }

    /// Writes every record back to the data file, sorted by id. The file is
    /// replaced atomically.
    pub fn persist(&self) -> FilterResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir).map_err(|e| FilterError::from_io(dir, e))?;

        {
            let mut writer = WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file());
            for record in self.get_all() {
                writer.write_record(&record.to_fields())?;
            }
            writer.flush()?;
        }

        tmp.persist(&self.path)
            .map_err(|e| FilterError::from_io(&self.path, e.error))?;
        debug!("Persisted {} records to {}", self.len(), self.path.display());
        Ok(())
    }

    /// Resolves an image for every record in id order, then persists.
    /// Stops at the first failure without writing anything.
    pub fn update_images(&self, source: &dyn ImageSource) -> FilterResult<Vec<Record>> {
        let records = self.get_all();
        let mut images = Vec::with_capacity(records.len());
        for record in &records {
            images.push((record.id, source.image_for(record)?));
        }
        for (id, image) in images {
            self.set_image(id, image)?;
        }

        self.persist()?;
        info!("Updated images for {} records", records.len());
        Ok(self.get_all())
    }

    /// Runs the concurrent filter against the store's data file
    pub fn filter_by_type(
        &self,
        filter_kind: &str,
        desired_matches: i64,
        per_worker_quota: i64,
    ) -> FilterResult<Vec<Record>> {
        self.engine
            .filter_file(&self.path, filter_kind, desired_matches, per_worker_quota)
            .map(|output| output.records)
    }
}

fn read_records(path: &Path) -> FilterResult<DashMap<i64, Record>> {
    let file = File::open(path).map_err(|e| FilterError::from_io(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let records = DashMap::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map_or(0, |pos| pos.line());
        let record =
            Record::from_fields(&row).map_err(|defect| FilterError::malformed_record(line, defect.to_string()))?;
        records.insert(record.id, record);
    }
    Ok(records)
}
