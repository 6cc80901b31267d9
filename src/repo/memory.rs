use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use super::{HistoricalSource, TopologySource};
use crate::data::MeasurementTable;

/// In-process source for simulations and tests.
#[derive(Default)]
pub struct InMemorySource {
    tables: HashMap<NaiveDate, MeasurementTable>,
    grid: serde_json::Value,
}

impl InMemorySource {
    pub fn new(grid: serde_json::Value) -> Self {
        Self {
            tables: HashMap::new(),
            grid,
        }
    }

    pub fn with_table(mut self, date: NaiveDate, table: MeasurementTable) -> Self {
        self.tables.insert(date, table);
        self
    }
}

#[async_trait]
impl HistoricalSource for InMemorySource {
    async fn day_table(&self, date: NaiveDate) -> Result<MeasurementTable> {
        self.tables
            .get(&date)
            .cloned()
            .ok_or_else(|| anyhow!("No measurements for {}", date))
    }
}

#[async_trait]
impl TopologySource for InMemorySource {
    async fn grid(&self, _network: &str) -> Result<serde_json::Value> {
        Ok(self.grid.clone())
    }
}
