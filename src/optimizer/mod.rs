//! Handoff to the external dispatch optimizer
//!
//! - [`OptimizerHandoff`]: request bundle in, dispatch response out
//! - [`ProcessOptimizer`]: child process over stdin/stdout with timeout and retries
//! - [`ResultStore`]: working slot and date-stamped archives

pub mod handoff;
pub mod store;

pub use handoff::*;
pub use store::*;
