//! Band forecast strategies
//!
//! Every strategy turns a history window (or per-slot covariates) into a
//! [`BandForecast`](crate::domain::BandForecast) for one quantity. The
//! [`ForecastEngine`] runs the selected strategy for all three quantities and
//! [`ValidationReport`] scores the result against realized data.

pub mod bootstrap;
pub mod clustering;
pub mod engine;
pub mod error;
pub mod features;
pub mod markov;
pub mod metrics;
pub mod no_clustering;
pub mod regression;
pub mod strategy;

pub use bootstrap::*;
pub use clustering::*;
pub use engine::*;
pub use error::*;
pub use markov::*;
pub use metrics::*;
pub use no_clustering::*;
pub use regression::*;
pub use strategy::*;
