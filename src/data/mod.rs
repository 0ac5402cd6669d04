//! Data sources.
//!
//! - synthetic M5-style sales generator (`sample`)

pub mod sample;

pub use sample::*;
