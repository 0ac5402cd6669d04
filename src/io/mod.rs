//! Input/output helpers.
//!
//! - sales CSV ingest + validation (`ingest`)
//! - metric / back-test / observation CSV exports (`export`)
//! - compact record JSON Lines read/write (`compact`)

pub mod compact;
pub mod export;
pub mod ingest;

pub use compact::*;
pub use export::*;
pub use ingest::*;
