use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{OptimizerResponse, ResultBundle};

const WORKING_SLOT: &str = "tmp_da.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whether the results archive was (re)written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Written,
    /// A results slot already existed and the new objective was zero
    Skipped,
}

/// Persisted slots of the day-ahead run, all under one directory.
///
/// - working slot `tmp_da.json`: request bundle, then the optimizer response
/// - forecast archive `for_<YYYY_MM_DD>.json`: request bundle
/// - results archive `results_<YYYY_MM_DD>.json`: optimizer response
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn working_path(&self) -> PathBuf {
        self.dir.join(WORKING_SLOT)
    }

    pub fn forecast_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("for_{}.json", date.format("%Y_%m_%d")))
    }

    pub fn results_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("results_{}.json", date.format("%Y_%m_%d")))
    }

    /// Write the bundle to the working slot and the forecast archive of `date`.
    pub async fn persist_request(
        &self,
        date: NaiveDate,
        bundle: &ResultBundle,
    ) -> Result<(), StoreError> {
        self.write_json(&self.working_path(), bundle).await?;
        self.write_json(&self.forecast_path(date), bundle).await?;
        info!(dir = %self.dir.display(), %date, "Request bundle persisted");
        Ok(())
    }

    /// Overwrite the working slot with the optimizer response.
    pub async fn persist_response(&self, response: &OptimizerResponse) -> Result<(), StoreError> {
        self.write_json(&self.working_path(), response).await
    }

    pub async fn read_response(&self) -> Result<OptimizerResponse, StoreError> {
        self.read_json(&self.working_path()).await
    }

    /// Archive `response` for `date` unless a result already exists and the
    /// objective is zero.
    pub async fn persist_results(
        &self,
        date: NaiveDate,
        response: &OptimizerResponse,
    ) -> Result<ArchiveOutcome, StoreError> {
        let path = self.results_path(date);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        if exists && response.objective == 0.0 {
            debug!(path = %path.display(), "Zero objective, keeping existing results");
            return Ok(ArchiveOutcome::Skipped);
        }
        self.write_json(&path, response).await?;
        Ok(ArchiveOutcome::Written)
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BandForecast, HORIZON};

    fn response(objective: f64) -> OptimizerResponse {
        OptimizerResponse {
            active_power: vec![1.0; HORIZON],
            reactive_power: vec![0.0; HORIZON],
            reserve_active_up: vec![0.0; HORIZON],
            reserve_active_down: vec![0.0; HORIZON],
            reserve_reactive_up: vec![0.0; HORIZON],
            reserve_reactive_down: vec![0.0; HORIZON],
            soc_desired: vec![0.75; HORIZON],
            prices: vec![vec![1.0; HORIZON]; 6],
            objective,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_slot_names() {
        let store = ResultStore::new("/out");
        assert_eq!(store.working_path(), PathBuf::from("/out/tmp_da.json"));
        assert_eq!(store.forecast_path(date()), PathBuf::from("/out/for_2024_03_09.json"));
        assert_eq!(store.results_path(date()), PathBuf::from("/out/results_2024_03_09.json"));
    }

    #[tokio::test]
    async fn test_request_then_response_share_working_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("outputs"));
        let bundle = ResultBundle::assemble(
            serde_json::json!({"bus": 1}),
            BandForecast::flat(1.0),
            BandForecast::flat(1.0),
            BandForecast::flat(1.0),
            0.5,
        );

        store.persist_request(date(), &bundle).await.unwrap();
        assert!(store.forecast_path(date()).exists());
        assert!(store.read_response().await.is_err());

        store.persist_response(&response(3.0)).await.unwrap();
        assert_eq!(store.read_response().await.unwrap().objective, 3.0);
    }

    #[tokio::test]
    async fn test_zero_objective_is_archived_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());

        let first = store.persist_results(date(), &response(0.0)).await.unwrap();
        assert_eq!(first, ArchiveOutcome::Written);

        let mut changed = response(0.0);
        changed.active_power[0] = 99.0;
        let second = store.persist_results(date(), &changed).await.unwrap();
        assert_eq!(second, ArchiveOutcome::Skipped);

        let stored: OptimizerResponse = store.read_json(&store.results_path(date())).await.unwrap();
        assert_eq!(stored.active_power[0], 1.0);
    }

    #[tokio::test]
    async fn test_non_zero_objective_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        store.persist_results(date(), &response(0.0)).await.unwrap();
        let outcome = store.persist_results(date(), &response(-4.0)).await.unwrap();
        assert_eq!(outcome, ArchiveOutcome::Written);
    }
}
