//! Back-test evaluation.
//!
//! Responsibilities:
//!
//! - run the rolling-origin back-test of the roster over one series (`cross_validation`)
//! - reduce the back-test rows to per-model errors (`metrics`)
//! - package both as engine transforms (`task`)
//! - pick the best model per series and build the leaderboard (`selection`)

pub mod cross_validation;
pub mod metrics;
pub mod selection;
pub mod task;

pub use cross_validation::*;
pub use metrics::*;
pub use selection::*;
pub use task::*;
