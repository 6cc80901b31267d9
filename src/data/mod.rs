//! Measurement tables and the windows cut from them
//!
//! - [`MeasurementTable`]: time-indexed named columns with inclusive slicing
//! - [`history_window`]: strategy input for one quantity
//! - [`realized_window`]: realized values of the forecast day
//! - [`covariates`]: per-slot inputs for the bootstrap backend

use thiserror::Error;

pub mod table;
pub mod windows;

pub use table::*;
pub use windows::*;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("Measurement table is empty")]
    Empty,

    #[error("Timestamps are not strictly increasing")]
    UnsortedIndex,

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {column} has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Not enough data in column {column}: need {required} values, got {actual}")]
    InsufficientData {
        column: String,
        required: usize,
        actual: usize,
    },
}
