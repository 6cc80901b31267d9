//! Scenario generation and reduction
//!
//! - Transition-matrix estimation over quantized series
//! - Markov-chain sample path synthesis
//! - k-means scenario reduction with silhouette diagnostics

use ndarray::Array2;
use thiserror::Error;

pub mod clustering;
pub mod markov;
pub mod quantize;
pub mod transition;

pub use clustering::*;
pub use markov::*;
pub use quantize::*;
pub use transition::*;

/// Candidate trajectories, one per row.
pub type ScenarioSet = Array2<f64>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScenarioError {
    #[error("Need at least {required} trajectories for clustering, got {actual}")]
    TooFewTrajectories { required: usize, actual: usize },

    #[error("Trajectory length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Initial state {state} outside chain of size {size}")]
    InvalidInitialState { state: usize, size: usize },

    #[error("Invalid transition row {row}: {reason}")]
    InvalidTransitionRow { row: usize, reason: String },
}
