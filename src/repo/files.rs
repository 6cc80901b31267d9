use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use super::{HistoricalSource, TopologySource};
use crate::data::MeasurementTable;

/// Measurement tables stored as `<dir>/<YYYY-MM-DD>.json`.
pub struct FileMeasurementSource {
    dir: PathBuf,
}

impl FileMeasurementSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl HistoricalSource for FileMeasurementSource {
    async fn day_table(&self, date: NaiveDate) -> Result<MeasurementTable> {
        let path = self.path_for(date);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let table: MeasurementTable = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid measurement table {}", path.display()))?;
        debug!(%date, rows = table.len(), "measurement table loaded");
        Ok(table)
    }
}

/// Grid descriptors stored as `<dir>/<network>.json`.
pub struct FileTopologySource {
    dir: PathBuf,
}

impl FileTopologySource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TopologySource for FileTopologySource {
    async fn grid(&self, network: &str) -> Result<serde_json::Value> {
        let path = self.dir.join(format!("{}.json", network));
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read topology {}", path.display()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
