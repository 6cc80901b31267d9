//! Day-ahead run orchestration

pub mod dayahead;

pub use dayahead::*;
