//! Per-series tasks as engine transforms.
//!
//! Both transforms run `expand -> cross_validation` on one compact record. The
//! metrics transform reduces inside the task, so only a handful of rows per
//! series come back; the back-test transform returns every CV row and leaves
//! the reduction to the driver.

use crate::batch::engine::Transform;
use crate::batch::expand::expand;
use crate::batch::schema::Record;
use crate::domain::{CvResult, CvRow, Metric, MetricRecord};
use crate::eval::cross_validation::{CvConfig, cross_validation};
use crate::eval::metrics::reduce_metrics;
use crate::models::Roster;

pub fn metrics_transform(roster: Roster, cv: CvConfig, metric: Metric) -> Transform<MetricRecord> {
    Transform::new("metrics", MetricRecord::schema(), move |record| {
        let series = expand(&record)?;
        let result = cross_validation(&series, &roster, &cv)?;
        Ok(reduce_metrics(&result, metric))
    })
}

pub fn backtest_transform(roster: Roster, cv: CvConfig) -> Transform<CvRow> {
    Transform::new("backtest", CvRow::schema(), move |record| {
        let series = expand(&record)?;
        Ok(cross_validation(&series, &roster, &cv)?.rows)
    })
}

/// Rebuild the per-series result from rows returned by `backtest_transform`.
pub fn regroup(unique_id: &str, roster: &Roster, rows: Vec<CvRow>) -> CvResult {
    CvResult {
        unique_id: unique_id.to_string(),
        models: roster.models().to_vec(),
        rows,
    }
}
