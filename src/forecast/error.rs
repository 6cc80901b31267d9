use thiserror::Error;

use crate::ml::ModelError;
use crate::scenario::ScenarioError;

/// Errors raised while producing a band forecast
#[derive(Debug, Clone, Error)]
pub enum ForecastError {
    #[error("Unknown forecast strategy: {0}")]
    UnknownStrategy(String),

    #[error("Insufficient history: need at least {required} days, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid noise distribution: {0}")]
    Noise(String),

    #[error("Strategy requires per-slot covariates, none were provided")]
    MissingCovariates,

    #[error("Bootstrap backend not configured")]
    BackendUnavailable,

    #[error("Bootstrap backend failed: {0}")]
    Bootstrap(String),

    #[error("Forecast task failed: {0}")]
    Task(String),
}
