//! Forecast functions for the model roster.
//!
//! Each model is a pure `history -> h-step forecast` function. Nothing is kept
//! between calls, so a task can rebuild the whole roster from its (tiny, `Copy`)
//! description and no fitted state ever crosses the worker boundary.

use crate::domain::ModelKind;
use crate::error::{AppError, ModelError};
use crate::math::{lag_design, solve_least_squares};

/// Smoothing constant used by Croston's method for both demand size and interval.
const CROSTON_ALPHA: f64 = 0.1;

/// Number of alpha candidates tried by SES (0.01, 0.02, ..., 0.99).
const SES_ALPHA_STEPS: usize = 99;

/// Hyper-parameters shared by the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelParams {
    pub season_length: usize,
    pub window_size: usize,
    pub ar_lags: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            season_length: 7,
            window_size: 7,
            ar_lags: 7,
        }
    }
}

/// The fixed, ordered list of candidate models for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    models: Vec<ModelKind>,
    params: ModelParams,
}

impl Roster {
    pub fn new(models: Vec<ModelKind>, params: ModelParams) -> Result<Self, AppError> {
        if models.is_empty() {
            return Err(AppError::new(2, "Model roster must contain at least one model."));
        }
        for (i, m) in models.iter().enumerate() {
            if models[..i].contains(m) {
                return Err(AppError::new(
                    2,
                    format!("Model `{}` appears twice in the roster.", m.display_name()),
                ));
            }
        }
        if params.season_length == 0 || params.window_size == 0 || params.ar_lags == 0 {
            return Err(AppError::new(
                2,
                "season_length, window_size and ar_lags must all be > 0.",
            ));
        }
        Ok(Self { models, params })
    }

    pub fn models(&self) -> &[ModelKind] {
        &self.models
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Roster position of a model label, used to order output rows.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.models.iter().position(|m| m.display_name() == name)
    }
}

/// Minimum history length `forecast` accepts for this model.
pub fn min_history(kind: ModelKind, params: &ModelParams) -> usize {
    match kind {
        ModelKind::Naive | ModelKind::HistoricAverage | ModelKind::CrostonClassic => 1,
        ModelKind::SeasonalNaive => params.season_length,
        ModelKind::WindowAverage => params.window_size,
        ModelKind::Ses => 2,
        // One more regression row than coefficients (intercept + lags).
        ModelKind::AutoRegressive => 2 * params.ar_lags + 2,
    }
}

/// Fit `kind` on `history` and forecast the next `h` values.
pub fn forecast(
    kind: ModelKind,
    params: &ModelParams,
    history: &[f64],
    h: usize,
) -> Result<Vec<f64>, ModelError> {
    let required = min_history(kind, params);
    if history.len() < required {
        return Err(ModelError::InsufficientData {
            required,
            actual: history.len(),
        });
    }

    let out = match kind {
        ModelKind::Naive => vec![history[history.len() - 1]; h],
        ModelKind::SeasonalNaive => seasonal_naive(history, params.season_length, h),
        ModelKind::HistoricAverage => vec![mean(history); h],
        ModelKind::WindowAverage => vec![mean(&history[history.len() - params.window_size..]); h],
        ModelKind::Ses => vec![ses_optimized(history); h],
        ModelKind::CrostonClassic => vec![croston_classic(history); h],
        ModelKind::AutoRegressive => auto_regressive(history, params.ar_lags, h)?,
    };

    if out.iter().all(|v| v.is_finite()) {
        Ok(out)
    } else {
        Err(ModelError::NonFinite)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn seasonal_naive(history: &[f64], season: usize, h: usize) -> Vec<f64> {
    let last_season = &history[history.len() - season..];
    (0..h).map(|i| last_season[i % season]).collect()
}

/// Final SES level, starting from `values[0]`.
fn ses_level(values: &[f64], alpha: f64) -> f64 {
    let mut level = values[0];
    for &v in &values[1..] {
        level = alpha * v + (1.0 - alpha) * level;
    }
    level
}

/// SES with alpha picked by grid search on one-step-ahead squared error.
///
/// Ties keep the smaller alpha, so the choice is deterministic.
fn ses_optimized(history: &[f64]) -> f64 {
    let mut best_alpha = 0.5;
    let mut best_sse = f64::INFINITY;
    for step in 1..=SES_ALPHA_STEPS {
        let alpha = step as f64 / (SES_ALPHA_STEPS + 1) as f64;
        let mut level = history[0];
        let mut sse = 0.0;
        for &v in &history[1..] {
            let err = v - level;
            sse += err * err;
            level = alpha * v + (1.0 - alpha) * level;
        }
        if sse < best_sse {
            best_sse = sse;
            best_alpha = alpha;
        }
    }
    ses_level(history, best_alpha)
}

/// Croston's method: smooth non-zero demand sizes and the intervals between them.
///
/// An all-zero history forecasts zero.
fn croston_classic(history: &[f64]) -> f64 {
    let mut sizes = Vec::new();
    let mut intervals = Vec::new();
    let mut last_idx: Option<usize> = None;
    for (i, &v) in history.iter().enumerate() {
        if v != 0.0 {
            sizes.push(v);
            intervals.push(match last_idx {
                Some(prev) => (i - prev) as f64,
                None => (i + 1) as f64,
            });
            last_idx = Some(i);
        }
    }
    if sizes.is_empty() {
        return 0.0;
    }
    ses_level(&sizes, CROSTON_ALPHA) / ses_level(&intervals, CROSTON_ALPHA)
}

/// AR(p) with intercept, fitted by least squares and iterated forward.
fn auto_regressive(history: &[f64], p: usize, h: usize) -> Result<Vec<f64>, ModelError> {
    let n = history.len();
    let (x, y) = lag_design(history, p);
    let beta = solve_least_squares(&x, &y)?;

    let mut path: Vec<f64> = history[n - p..].to_vec();
    let mut out = Vec::with_capacity(h);
    for _ in 0..h {
        let len = path.len();
        let mut next = beta[0];
        for lag in 1..=p {
            next += beta[lag] * path[len - lag];
        }
        if !next.is_finite() {
            return Err(ModelError::NonFinite);
        }
        path.push(next);
        out.push(next);
    }
    Ok(out)
}
