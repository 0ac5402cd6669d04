//! Downstream consumers of the metric table: best model per series and a
//! per-model leaderboard.

use std::collections::HashMap;

use crate::domain::MetricRecord;

/// Aggregate view of one model across all series.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub model: String,
    /// Mean metric over series where this model scored; `NaN` if none did.
    pub mean_metric: f64,
    pub scored: usize,
    pub failures: usize,
    /// Series for which this model had the lowest metric.
    pub wins: usize,
}

/// The minimum-metric row of each series.
///
/// Series keep their first-appearance order; ties go to the earlier row (roster
/// order). A series whose metrics are all `NaN` keeps its first row, still `NaN`.
pub fn best_models(records: &[MetricRecord]) -> Vec<MetricRecord> {
    let mut order: Vec<&str> = Vec::new();
    let mut best: HashMap<&str, &MetricRecord> = HashMap::new();

    for r in records {
        match best.get(r.unique_id.as_str()) {
            None => {
                order.push(&r.unique_id);
                best.insert(&r.unique_id, r);
            }
            Some(&current) => {
                let better = r.metric.is_finite() && (current.metric.is_nan() || r.metric < current.metric);
                if better {
                    best.insert(&r.unique_id, r);
                }
            }
        }
    }

    order.into_iter().filter_map(|id| best.get(id).map(|r| (*r).clone())).collect()
}

/// Per-model mean metric, failure count and win count, in first-appearance order.
pub fn summarize(records: &[MetricRecord]) -> Vec<ModelSummary> {
    let mut out: Vec<ModelSummary> = Vec::new();
    let mut sums: Vec<f64> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for r in records {
        let i = *index.entry(r.models.as_str()).or_insert_with(|| {
            out.push(ModelSummary {
                model: r.models.clone(),
                mean_metric: f64::NAN,
                scored: 0,
                failures: 0,
                wins: 0,
            });
            sums.push(0.0);
            out.len() - 1
        });
        if r.metric.is_finite() {
            out[i].scored += 1;
            sums[i] += r.metric;
        } else {
            out[i].failures += 1;
        }
    }

    for (summary, sum) in out.iter_mut().zip(&sums) {
        if summary.scored > 0 {
            summary.mean_metric = sum / summary.scored as f64;
        }
    }

    for winner in best_models(records).iter().filter(|r| r.metric.is_finite()) {
        if let Some(&i) = index.get(winner.models.as_str()) {
            out[i].wins += 1;
        }
    }

    out
}
