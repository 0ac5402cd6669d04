//! Shared pipeline logic behind `sb compress` and `sb evaluate`.
//!
//! ingest -> dispatch (group + compress) -> engine (expand + back-test + metrics
//! per series) -> metric table -> best model per series + leaderboard
//!
//! The CLI handlers only print and export what these functions return.

use std::path::Path;

use tracing::{info, warn};

use crate::batch::{
    Batch, EngineTarget, ExecutionContext, PartitionSkew, PartitionSpec, PayloadStats, RejectedGroup, dispatch,
};
use crate::domain::{CvRow, EngineKind, GapPolicy, GroupColumn, InputSource, MetricRecord, RawObservation, RunConfig};
use crate::error::{AppError, SeriesError};
use crate::eval::{
    CvConfig, ModelSummary, backtest_transform, best_models, metrics_transform, missing_metrics, reduce_metrics,
    regroup, summarize,
};
use crate::io::{DatasetStats, load_observations, read_compact_jsonl};
use crate::models::{ModelParams, Roster};

/// A series whose task ran and failed.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSeries {
    pub unique_id: String,
    pub reason: SeriesError,
}

/// Where the evaluated series came from.
#[derive(Debug, Clone)]
pub struct SourceSummary {
    /// Present for CSV input.
    pub stats: Option<DatasetStats>,
    pub rows_read: usize,
    pub row_errors: usize,
}

/// All computed outputs of a single `sb evaluate` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub source: SourceSummary,
    pub payload: Option<PayloadStats>,
    pub series: usize,
    pub rejected: Vec<RejectedGroup>,
    pub failed: Vec<FailedSeries>,
    pub skew: Option<PartitionSkew>,
    pub engine: EngineTarget,
    pub workers: usize,
    /// One row per (series, roster model), sorted by series then roster order.
    pub metrics: Vec<MetricRecord>,
    pub best: Vec<MetricRecord>,
    pub summary: Vec<ModelSummary>,
    /// Back-test rows, only collected when they are exported.
    pub cv_rows: Vec<CvRow>,
}

impl RunOutput {
    /// Series inside rejected groups.
    pub fn rejected_series(&self) -> usize {
        self.rejected.iter().map(|g| g.series.len()).sum()
    }
}

/// All computed outputs of a single `sb compress` run.
#[derive(Debug, Clone)]
pub struct CompressOutput {
    pub source: SourceSummary,
    pub batch: Batch,
    pub payload: PayloadStats,
    pub skew: Option<PartitionSkew>,
}

/// Load the configured input and evaluate every series in it.
pub fn run_evaluate(config: &RunConfig) -> Result<RunOutput, AppError> {
    match &config.source {
        InputSource::Csv(path) => {
            let ingest = load_observations(path)?;
            let source = SourceSummary {
                stats: Some(ingest.stats.clone()),
                rows_read: ingest.rows_read,
                row_errors: ingest.row_errors.len(),
            };
            evaluate_observations(config, &ingest.rows, source)
        }
        InputSource::Compact(path) => {
            let records = read_compact_jsonl(path)?;
            let source = SourceSummary {
                stats: None,
                rows_read: records.len(),
                row_errors: 0,
            };
            let batch = Batch {
                records,
                rejected: Vec::new(),
            };
            evaluate_batch(config, batch, source, None)
        }
    }
}

/// Group, compress and evaluate already-validated rows.
pub fn evaluate_observations(
    config: &RunConfig,
    rows: &[RawObservation],
    source: SourceSummary,
) -> Result<RunOutput, AppError> {
    let spec = PartitionSpec::new(config.group_by.clone())?;
    let batch = dispatch(rows, &spec, config.gap_policy);
    let payload = PayloadStats::measure(rows, &batch.records)?;
    log_payload(&payload);
    evaluate_batch(config, batch, source, Some(payload))
}

/// Evaluate a dispatched batch on the configured engine.
pub fn evaluate_batch(
    config: &RunConfig,
    batch: Batch,
    source: SourceSummary,
    payload: Option<PayloadStats>,
) -> Result<RunOutput, AppError> {
    if batch.group_count() == 0 {
        return Err(AppError::new(3, "No series to evaluate."));
    }

    let roster = Roster::new(
        config.models.clone(),
        ModelParams {
            season_length: config.season_length,
            window_size: config.window_size,
            ar_lags: config.ar_lags,
        },
    )?;
    let cv = CvConfig::new(config.horizon, config.n_windows, config.step_size)
        .map_err(|e| AppError::new(2, e.to_string()))?;

    let skew = PartitionSkew::measure(&batch.records);
    let series = batch.series_count();
    let Batch { records, rejected } = batch;

    let ctx = ExecutionContext::create(engine_target(config))?;
    let engine = ctx.target();
    let workers = ctx.workers();

    let mut metrics = Vec::new();
    let mut failed = Vec::new();
    let mut cv_rows = Vec::new();

    if config.export_cv.is_some() {
        for outcome in ctx.submit(records, &backtest_transform(roster.clone(), cv))? {
            match outcome.result {
                Ok(rows) => {
                    let result = regroup(&outcome.unique_id, &roster, rows);
                    metrics.extend(reduce_metrics(&result, config.metric));
                    cv_rows.extend(result.rows);
                }
                Err(reason) => record_failure(&mut metrics, &mut failed, &roster, outcome.unique_id, reason),
            }
        }
    } else {
        for outcome in ctx.submit(records, &metrics_transform(roster.clone(), cv, config.metric))? {
            match outcome.result {
                Ok(rows) => metrics.extend(rows),
                Err(reason) => record_failure(&mut metrics, &mut failed, &roster, outcome.unique_id, reason),
            }
        }
    }
    ctx.shutdown();

    for unique_id in rejected.iter().flat_map(|g| &g.series) {
        metrics.extend(missing_metrics(unique_id, &roster));
    }
    // Stable: a series id shared by several rejected groups keeps input order.
    metrics.sort_by(|a, b| {
        a.unique_id
            .cmp(&b.unique_id)
            .then_with(|| roster_rank(&roster, a).cmp(&roster_rank(&roster, b)))
    });

    let best = best_models(&metrics);
    let summary = summarize(&metrics);
    info!(
        series,
        rejected = rejected.len(),
        failed = failed.len(),
        metric_rows = metrics.len(),
        "evaluation finished"
    );

    Ok(RunOutput {
        source,
        payload,
        series,
        rejected,
        failed,
        skew,
        engine,
        workers,
        metrics,
        best,
        summary,
        cv_rows,
    })
}

/// Ingest and compress without evaluating.
pub fn run_compress(input: &Path, group_by: &[GroupColumn], gap_policy: GapPolicy) -> Result<CompressOutput, AppError> {
    let ingest = load_observations(input)?;
    let spec = PartitionSpec::new(group_by.to_vec())?;
    let batch = dispatch(&ingest.rows, &spec, gap_policy);
    let payload = PayloadStats::measure(&ingest.rows, &batch.records)?;
    log_payload(&payload);
    let skew = PartitionSkew::measure(&batch.records);

    Ok(CompressOutput {
        source: SourceSummary {
            stats: Some(ingest.stats),
            rows_read: ingest.rows_read,
            row_errors: ingest.row_errors.len(),
        },
        batch,
        payload,
        skew,
    })
}

pub fn engine_target(config: &RunConfig) -> EngineTarget {
    match config.engine {
        EngineKind::Local => EngineTarget::Local,
        EngineKind::Pool => EngineTarget::Pool {
            workers: config.workers,
        },
    }
}

fn record_failure(
    metrics: &mut Vec<MetricRecord>,
    failed: &mut Vec<FailedSeries>,
    roster: &Roster,
    unique_id: String,
    reason: SeriesError,
) {
    warn!(%unique_id, %reason, "series evaluation failed");
    metrics.extend(missing_metrics(&unique_id, roster));
    failed.push(FailedSeries { unique_id, reason });
}

fn roster_rank(roster: &Roster, record: &MetricRecord) -> usize {
    roster.position(&record.models).unwrap_or(usize::MAX)
}

fn log_payload(payload: &PayloadStats) {
    info!(
        raw_rows = payload.raw_rows,
        raw_bytes = payload.raw_bytes,
        records = payload.records,
        compact_bytes = payload.compact_bytes,
        ratio = payload.ratio(),
        "payload accounting"
    );
}
