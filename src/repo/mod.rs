//! Read-only collaborators queried once per run
//!
//! - [`HistoricalSource`]: measurement table for a calendar day
//! - [`TopologySource`]: opaque grid descriptor for a network

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::Config;
use crate::data::MeasurementTable;

pub mod files;
pub mod memory;

pub use files::*;
pub use memory::*;

#[async_trait]
pub trait HistoricalSource: Send + Sync {
    /// Table of measurements available as of `date`, including past days.
    async fn day_table(&self, date: NaiveDate) -> Result<MeasurementTable>;
}

#[async_trait]
pub trait TopologySource: Send + Sync {
    async fn grid(&self, network: &str) -> Result<serde_json::Value>;
}

pub struct Repositories {
    pub history: Arc<dyn HistoricalSource>,
    pub topology: Arc<dyn TopologySource>,
}

impl Repositories {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            history: Arc::new(FileMeasurementSource::new(&cfg.data.measurement_dir)),
            topology: Arc::new(FileTopologySource::new(&cfg.grid.topology_dir)),
        }
    }
}
