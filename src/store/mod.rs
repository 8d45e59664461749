//! Batch persistence: one pretty-printed JSON file per batch

mod batch;
mod timestamp;

pub use batch::{Batch, BatchMetadata, PersonaEntry};

use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const FILE_PREFIX: &str = "personas_batch_";
const ENRICHED_SUFFIX: &str = "_with_lifecycle";

/// Listing entry for a saved batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub path: PathBuf,
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_personas: usize,
    pub error_count: usize,
    pub lifecycle_enhanced: bool,
}

/// Directory of saved batch files
#[derive(Debug, Clone)]
pub struct BatchStore {
    dir: PathBuf,
}

impl BatchStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save under `personas_batch_{YYYYmmdd_HHMMSS}.json`, creating the directory if needed
    pub fn save(&self, batch: &Batch) -> StoreResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stamp = batch.metadata.generated_at.format("%Y%m%d_%H%M%S");
        let mut path = self.dir.join(format!("{}{}.json", FILE_PREFIX, stamp));
        if path.exists() {
            // Two batches in the same second
            let id = batch.metadata.batch_id.simple().to_string();
            path = self.dir.join(format!("{}{}_{}.json", FILE_PREFIX, stamp, &id[..8]));
        }

        Self::write(batch, &path)?;
        log::info!("Saved {} personas to {}", batch.len(), path.display());
        Ok(path)
    }

    /// Write to an explicit path
    pub fn write<P: AsRef<Path>>(batch: &Batch, path: P) -> StoreResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, batch)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a batch file. Files written by the earlier Python tool load too.
    pub fn load<P: AsRef<Path>>(path: P) -> StoreResult<Batch> {
        let reader = BufReader::new(File::open(path)?);
        let mut batch: Batch = serde_json::from_reader(reader)?;
        batch.fill_missing_counts();
        Ok(batch)
    }

    /// Saved batches, newest first. Files that fail to parse are skipped.
    pub fn list(&self) -> StoreResult<Vec<BatchSummary>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if !is_batch_file(&path) {
                continue;
            }

            match Self::load(&path) {
                Ok(batch) => summaries.push(BatchSummary {
                    batch_id: batch.metadata.batch_id,
                    generated_at: batch.metadata.generated_at,
                    total_personas: batch.personas.len(),
                    error_count: batch.errors.len(),
                    lifecycle_enhanced: batch.lifecycle_enhanced,
                    path,
                }),
                Err(e) => log::warn!("Skipping unreadable batch file {}: {}", path.display(), e),
            }
        }

        summaries.sort_by(|a, b| b.generated_at.cmp(&a.generated_at).then_with(|| b.path.cmp(&a.path)));
        Ok(summaries)
    }

    /// Sibling path for the lifecycle-enriched copy of a batch file
    pub fn enriched_path<P: AsRef<Path>>(path: P) -> PathBuf {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!("{}{}.json", stem, ENRICHED_SUFFIX))
    }
}

fn is_batch_file(path: &Path) -> bool {
    let named = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with(FILE_PREFIX));
    named && path.extension().map_or(false, |ext| ext == "json")
}
