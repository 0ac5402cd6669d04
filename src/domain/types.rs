//! Shared domain types.
//!
//! Every stage of the pipeline consumes one of these values and builds a new one;
//! nothing is mutated after construction. The types that cross the worker
//! boundary or land in exports are serializable.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A column of the input table that can participate in the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GroupColumn {
    #[value(name = "unique_id")]
    UniqueId,
    #[value(name = "item_id")]
    ItemId,
    #[value(name = "dept_id")]
    DeptId,
    #[value(name = "cat_id")]
    CatId,
    #[value(name = "store_id")]
    StoreId,
    #[value(name = "state_id")]
    StateId,
}

impl GroupColumn {
    pub fn column_name(self) -> &'static str {
        match self {
            GroupColumn::UniqueId => "unique_id",
            GroupColumn::ItemId => "item_id",
            GroupColumn::DeptId => "dept_id",
            GroupColumn::CatId => "cat_id",
            GroupColumn::StoreId => "store_id",
            GroupColumn::StateId => "state_id",
        }
    }

    /// Borrow this column's value from a row.
    pub fn value(self, row: &RawObservation) -> &str {
        match self {
            GroupColumn::UniqueId => &row.unique_id,
            GroupColumn::ItemId => &row.item_id,
            GroupColumn::DeptId => &row.dept_id,
            GroupColumn::CatId => &row.cat_id,
            GroupColumn::StoreId => &row.store_id,
            GroupColumn::StateId => &row.state_id,
        }
    }
}

/// What to do when a series is missing calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GapPolicy {
    /// Reject the whole series with a validation error.
    Reject,
    /// Insert the missing days with `y = 0` and the previous day's price.
    FillZero,
}

/// Error metric used to reduce cross-validation rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Mean absolute error.
    Mae,
    /// Root mean squared error.
    Rmse,
    /// Symmetric mean absolute percentage error, in percent (0..=200).
    Smape,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Mae => "mae",
            Metric::Rmse => "rmse",
            Metric::Smape => "smape",
        }
    }
}

/// Where per-series tasks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Sequentially, on the calling thread.
    Local,
    /// On a dedicated rayon worker pool.
    Pool,
}

/// Candidate forecasting models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    Naive,
    SeasonalNaive,
    HistoricAverage,
    WindowAverage,
    Ses,
    CrostonClassic,
    AutoRegressive,
}

impl ModelKind {
    pub const ALL: [ModelKind; 7] = [
        ModelKind::Naive,
        ModelKind::SeasonalNaive,
        ModelKind::HistoricAverage,
        ModelKind::WindowAverage,
        ModelKind::Ses,
        ModelKind::CrostonClassic,
        ModelKind::AutoRegressive,
    ];

    /// Column label used in metric and cross-validation outputs.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Naive => "Naive",
            ModelKind::SeasonalNaive => "SeasonalNaive",
            ModelKind::HistoricAverage => "HistoricAverage",
            ModelKind::WindowAverage => "WindowAverage",
            ModelKind::Ses => "SES",
            ModelKind::CrostonClassic => "CrostonClassic",
            ModelKind::AutoRegressive => "AutoRegressive",
        }
    }

    pub fn from_display_name(name: &str) -> Option<ModelKind> {
        ModelKind::ALL.into_iter().find(|k| k.display_name() == name)
    }
}

/// One input row: one series on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub unique_id: String,
    pub item_id: String,
    pub dept_id: String,
    pub cat_id: String,
    pub store_id: String,
    pub state_id: String,
    pub ds: NaiveDate,
    /// Units sold; non-negative, possibly fractional.
    pub y: f64,
    pub wm_yr_wk: Option<i32>,
    pub sell_price: f64,
}

/// Array-packed encoding of one series.
///
/// Dates are implied: `y[i]` and `prices[i]` belong to `start_date + i days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactRecord {
    pub unique_id: String,
    pub store_id: String,
    pub item_id: String,
    pub start_date: NaiveDate,
    pub y: Vec<f64>,
    pub prices: Vec<f64>,
}

impl CompactRecord {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// One reconstructed day of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpandedRow {
    pub ds: NaiveDate,
    pub y: f64,
    pub price: f64,
}

/// Long-format series rebuilt on the worker side.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedSeries {
    pub unique_id: String,
    pub rows: Vec<ExpandedRow>,
}

impl ExpandedSeries {
    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.y).collect()
    }
}

/// One back-test row: the actual value at `ds` and each model's forecast made at `cutoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct CvRow {
    pub unique_id: String,
    pub ds: NaiveDate,
    pub cutoff: NaiveDate,
    pub y: f64,
    /// One entry per roster model, in roster order. `NaN` marks a failed fit.
    pub predictions: Vec<f64>,
}

/// All back-test rows of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct CvResult {
    pub unique_id: String,
    pub models: Vec<ModelKind>,
    pub rows: Vec<CvRow>,
}

/// Final output row: one error value per (series, model).
///
/// `metric` is `NaN` when the model (or the whole series) failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub models: String,
    pub metric: f64,
    pub unique_id: String,
}

/// Where `sb evaluate` reads its series from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Long-format sales CSV; grouped and compressed in this run.
    Csv(PathBuf),
    /// Compact records written earlier by `sb compress`.
    Compact(PathBuf),
}

/// A full `sb evaluate` configuration as understood by the pipeline.
///
/// Derived from CLI flags, `.env` defaults and built-in defaults.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: InputSource,
    pub group_by: Vec<GroupColumn>,
    pub gap_policy: GapPolicy,

    pub models: Vec<ModelKind>,
    pub season_length: usize,
    pub window_size: usize,
    pub ar_lags: usize,

    pub horizon: usize,
    pub n_windows: usize,
    /// Distance between consecutive cutoffs; `None` means `horizon`.
    pub step_size: Option<usize>,
    pub metric: Metric,

    pub engine: EngineKind,
    /// Worker threads for the pool engine (0 = rayon default).
    pub workers: usize,

    pub top_n: usize,
    pub export_metrics: Option<PathBuf>,
    pub export_best: Option<PathBuf>,
    pub export_cv: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::from_display_name(kind.display_name()), Some(kind));
        }
        assert_eq!(ModelKind::from_display_name("ARIMA"), None);
    }

    #[test]
    fn group_column_reads_row_values() {
        let row = RawObservation {
            unique_id: "FOODS_1_001_CA_1".to_string(),
            item_id: "FOODS_1_001".to_string(),
            dept_id: "FOODS_1".to_string(),
            cat_id: "FOODS".to_string(),
            store_id: "CA_1".to_string(),
            state_id: "CA".to_string(),
            ds: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
            y: 3.0,
            wm_yr_wk: Some(11549),
            sell_price: 2.0,
        };
        assert_eq!(GroupColumn::StoreId.value(&row), "CA_1");
        assert_eq!(GroupColumn::ItemId.value(&row), "FOODS_1_001");
        assert_eq!(GroupColumn::StateId.column_name(), "state_id");
    }
}
