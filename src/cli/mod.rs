//! Command-line parsing for the per-series back-test runner.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the batching/modeling code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{EngineKind, GapPolicy, GroupColumn, Metric, ModelKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sb", version, about = "Batch back-testing of many retail sales series")]
pub struct Cli {
    /// Log filter (e.g. `info`, `series_batch=debug`). Overrides `SB_LOG`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a synthetic M5-style daily sales CSV.
    Synth(SynthArgs),
    /// Group and compress a sales CSV into compact records (JSON Lines).
    Compress(CompressArgs),
    /// Back-test the model roster on every series and report per-series metrics.
    Evaluate(EvaluateArgs),
    /// Pick the best model per series from a metrics CSV.
    Best(BestArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// Number of stores (spread over CA, TX, WI).
    #[arg(long, default_value_t = 3)]
    pub stores: usize,

    /// Number of items per store.
    #[arg(long, default_value_t = 12)]
    pub items: usize,

    /// Number of days per series.
    #[arg(long, default_value_t = 120)]
    pub days: usize,

    /// First calendar day.
    #[arg(long, default_value = "2016-01-01")]
    pub start: NaiveDate,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Probability of a zero-sales day.
    #[arg(long, default_value_t = 0.3)]
    pub zero_prob: f64,

    /// Probability that a day is missing from the output.
    #[arg(long, default_value_t = 0.0)]
    pub gap_prob: f64,
}

/// How the raw table is cut into series.
#[derive(Debug, Args, Clone)]
pub struct GroupingArgs {
    /// Columns that identify one series.
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [GroupColumn::StoreId, GroupColumn::ItemId])]
    pub group_by: Vec<GroupColumn>,

    /// What to do with missing calendar days inside a series.
    #[arg(long, value_enum, default_value_t = GapPolicy::Reject)]
    pub gap_policy: GapPolicy,
}

#[derive(Debug, Parser, Clone)]
pub struct CompressArgs {
    /// Sales CSV.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// Output JSON Lines path.
    #[arg(long, value_name = "JSONL")]
    pub out: PathBuf,

    #[command(flatten)]
    pub grouping: GroupingArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct EvaluateArgs {
    /// Sales CSV.
    #[arg(long, value_name = "CSV", required_unless_present = "compact", conflicts_with = "compact")]
    pub input: Option<PathBuf>,

    /// Compact records written by `sb compress` (instead of `--input`).
    #[arg(long, value_name = "JSONL")]
    pub compact: Option<PathBuf>,

    /// Columns that identify one series (CSV input only; compact records are
    /// already grouped).
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [GroupColumn::StoreId, GroupColumn::ItemId],
        conflicts_with = "compact"
    )]
    pub group_by: Vec<GroupColumn>,

    /// What to do with missing calendar days inside a series (CSV input only).
    #[arg(long, value_enum, default_value_t = GapPolicy::Reject, conflicts_with = "compact")]
    pub gap_policy: GapPolicy,

    /// Models to back-test, in output order.
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = ModelKind::ALL)]
    pub models: Vec<ModelKind>,

    /// Season length for SeasonalNaive.
    #[arg(long, default_value_t = 7)]
    pub season_length: usize,

    /// Window size for WindowAverage.
    #[arg(long, default_value_t = 7)]
    pub window_size: usize,

    /// Number of lags for AutoRegressive.
    #[arg(long, default_value_t = 7)]
    pub ar_lags: usize,

    /// Forecast horizon (days).
    #[arg(long, default_value_t = 28)]
    pub horizon: usize,

    /// Number of back-test windows.
    #[arg(long, default_value_t = 1)]
    pub n_windows: usize,

    /// Days between consecutive cutoffs (defaults to the horizon).
    #[arg(long)]
    pub step_size: Option<usize>,

    /// Error metric.
    #[arg(long, value_enum, default_value_t = Metric::Mae)]
    pub metric: Metric,

    /// Where per-series tasks run.
    #[arg(long, value_enum, default_value_t = EngineKind::Pool)]
    pub engine: EngineKind,

    /// Worker threads for the pool engine (falls back to `SB_WORKERS`, then all cores).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Rows shown in the best-model table.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the metric table (`models,metric,unique_id`) to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the best model per series to CSV.
    #[arg(long = "export-best", value_name = "CSV")]
    pub export_best: Option<PathBuf>,

    /// Export every back-test row with per-model predictions to CSV.
    #[arg(long = "export-cv", value_name = "CSV")]
    pub export_cv: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct BestArgs {
    /// Metrics CSV produced by `sb evaluate --export`.
    #[arg(long, value_name = "CSV")]
    pub metrics: PathBuf,

    /// Rows shown in the terminal.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the best model per series to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}
