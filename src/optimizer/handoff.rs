use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{OptimizerResponse, ResultBundle};
use crate::process::{JsonProcess, ProcessError};

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("Optimizer process failed: {0}")]
    Process(#[from] ProcessError),

    #[error("Undecodable optimizer response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Optimizer failed after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<HandoffError>,
    },
}

/// Request/response exchange with the dispatch optimizer.
#[async_trait]
pub trait OptimizerHandoff: Send + Sync {
    async fn solve(&self, request: &ResultBundle) -> Result<OptimizerResponse, HandoffError>;
}

/// Optimizer running as a child process.
///
/// The bundle is written as JSON to the child's stdin; the response is read
/// as JSON from its stdout once the child exits successfully.
#[derive(Debug, Clone)]
pub struct ProcessOptimizer {
    process: JsonProcess,
    pub max_attempts: u32,
}

impl ProcessOptimizer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            process: JsonProcess::new(program, args, Duration::from_secs(600)),
            max_attempts: 1,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.process.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    async fn run_once(&self, payload: &[u8]) -> Result<OptimizerResponse, HandoffError> {
        let out = self.process.exchange(payload).await?;
        Ok(serde_json::from_slice(&out)?)
    }
}

#[async_trait]
impl OptimizerHandoff for ProcessOptimizer {
    async fn solve(&self, request: &ResultBundle) -> Result<OptimizerResponse, HandoffError> {
        let payload = serde_json::to_vec(request)?;
        let max_attempts = self.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.run_once(&payload).await {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(attempt, "Optimizer succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(attempt, error = %e, "Optimizer attempt failed");
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(HandoffError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    })
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::{BandForecast, HORIZON};

    fn bundle() -> ResultBundle {
        ResultBundle::assemble(
            serde_json::json!({}),
            BandForecast::flat(1.0),
            BandForecast::flat(2.0),
            BandForecast::flat(0.5),
            0.9,
        )
    }

    fn response_json(objective: f64) -> String {
        let series = vec![0.0; HORIZON];
        serde_json::to_string(&OptimizerResponse {
            active_power: series.clone(),
            reactive_power: series.clone(),
            reserve_active_up: series.clone(),
            reserve_active_down: series.clone(),
            reserve_reactive_up: series.clone(),
            reserve_reactive_down: series,
            soc_desired: vec![0.75],
            prices: vec![],
            objective,
        })
        .unwrap()
    }

    fn shell(script: String) -> ProcessOptimizer {
        ProcessOptimizer::new("sh", vec!["-c".into(), script])
    }

    #[tokio::test]
    async fn test_round_trip_over_pipes() {
        let script = format!("cat > /dev/null; echo '{}'", response_json(12.5));
        let response = shell(script).solve(&bundle()).await.unwrap();
        assert_eq!(response.objective, 12.5);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_a_failure() {
        let err = shell("cat > /dev/null; echo boom >&2; exit 2".into())
            .solve(&bundle())
            .await
            .unwrap_err();
        match err {
            HandoffError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 1);
                assert!(matches!(
                    *last,
                    HandoffError::Process(ProcessError::ExitStatus { code: Some(2), ref stderr, .. })
                        if stderr == "boom"
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_with_retries() {
        let err = shell("sleep 5".into())
            .with_timeout(Duration::from_millis(100))
            .with_max_attempts(2)
            .solve(&bundle())
            .await
            .unwrap_err();
        match err {
            HandoffError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, HandoffError::Process(ProcessError::Timeout { .. })));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_output() {
        let err = shell("cat > /dev/null; echo not-json".into())
            .solve(&bundle())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::Exhausted { ref last, .. } if matches!(**last, HandoffError::Decode(_))));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = ProcessOptimizer::new("/nonexistent/optimizer", vec![])
            .solve(&bundle())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 attempts"));
    }
}
