//! Day-ahead band forecasting for a small electrical network.
//!
//! Historical measurements are turned into center/margin bands for PV
//! generation and active/reactive demand, scored against realized data and
//! handed to an external dispatch optimizer.

pub mod config;
pub mod controller;
pub mod data;
pub mod domain;
pub mod forecast;
pub mod ml;
pub mod optimizer;
pub mod process;
pub mod repo;
pub mod scenario;
pub mod telemetry;
