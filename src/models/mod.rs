//! Forecasting model roster.
//!
//! Models are implemented as small, pure functions so that the back-test code can
//! stay generic and every task can rebuild the roster locally.

pub mod model;

pub use model::*;
