//! Reduce cross-validation rows to one error value per (series, model).

use crate::domain::{CvResult, Metric, MetricRecord};
use crate::models::Roster;

/// One `MetricRecord` per model, in roster order.
///
/// A model with any `NaN` prediction (a failed window) gets a `NaN` metric, as
/// does every model of a result with no rows.
pub fn reduce_metrics(cv: &CvResult, metric: Metric) -> Vec<MetricRecord> {
    cv.models
        .iter()
        .enumerate()
        .map(|(m, kind)| {
            let pairs: Vec<(f64, f64)> = cv.rows.iter().map(|r| (r.y, r.predictions[m])).collect();
            MetricRecord {
                models: kind.display_name().to_string(),
                metric: score(metric, &pairs),
                unique_id: cv.unique_id.clone(),
            }
        })
        .collect()
}

/// Explicit missing-metric rows for a series that failed before scoring.
pub fn missing_metrics(unique_id: &str, roster: &Roster) -> Vec<MetricRecord> {
    roster
        .models()
        .iter()
        .map(|kind| MetricRecord {
            models: kind.display_name().to_string(),
            metric: f64::NAN,
            unique_id: unique_id.to_string(),
        })
        .collect()
}

/// Score `(actual, predicted)` pairs.
pub fn score(metric: Metric, pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() || pairs.iter().any(|(y, p)| !y.is_finite() || !p.is_finite()) {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    match metric {
        Metric::Mae => pairs.iter().map(|(y, p)| (y - p).abs()).sum::<f64>() / n,
        Metric::Rmse => (pairs.iter().map(|(y, p)| (y - p) * (y - p)).sum::<f64>() / n).sqrt(),
        Metric::Smape => {
            pairs
                .iter()
                .map(|(y, p)| {
                    let denom = y.abs() + p.abs();
                    // 0/0: both zero is a perfect forecast.
                    if denom == 0.0 { 0.0 } else { 200.0 * (y - p).abs() / denom }
                })
                .sum::<f64>()
                / n
        }
    }
}
