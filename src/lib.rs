//! `series-batch` library crate.
//!
//! The binary (`sb`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the batch engine and evaluators are reusable from other drivers
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod batch;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod eval;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
