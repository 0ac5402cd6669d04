//! Per-series batch plumbing.
//!
//! Responsibilities:
//!
//! - compress one series into a compact record (`compress`)
//! - partition the raw table and compress every group (`dispatch`)
//! - rebuild the long-format series on the worker side (`expand`)
//! - encode records for the worker boundary and measure payloads (`wire`)
//! - declare output schemas (`schema`) and run typed transforms (`engine`)

pub mod compress;
pub mod dispatch;
pub mod engine;
pub mod expand;
pub mod schema;
pub mod wire;

pub use compress::*;
pub use dispatch::*;
pub use engine::*;
pub use expand::*;
pub use schema::*;
pub use wire::*;
