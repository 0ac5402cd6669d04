//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`GroupColumn`, `GapPolicy`, `Metric`, `EngineKind`, `ModelKind`)
//! - the entities flowing between stages (`RawObservation`, `CompactRecord`,
//!   `ExpandedSeries`, `CvResult`, `MetricRecord`)
//! - the resolved run configuration (`RunConfig`)

pub mod types;

pub use types::*;
