//! Rolling-origin back-test.
//!
//! For a series of length `n`, horizon `h`, `n_windows` windows and step `s`,
//! window `w` (0-based) trains on `y[..train_end]` with
//!
//! ```text
//! train_end = n - h - (n_windows - 1 - w) * s
//! ```
//!
//! and is scored on `y[train_end..train_end + h]`. The cutoff is the date of the
//! last training row. No model ever sees a value at or after its test window.

use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use crate::batch::engine::panic_message;
use crate::domain::{CvResult, CvRow, ExpandedSeries};
use crate::error::{ModelError, SeriesError};
use crate::models::{Roster, forecast};

/// Back-test geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CvConfig {
    horizon: usize,
    n_windows: usize,
    step_size: usize,
    min_length: usize,
}

impl CvConfig {
    /// `step_size = None` means consecutive, non-overlapping windows (`step = h`).
    pub fn new(horizon: usize, n_windows: usize, step_size: Option<usize>) -> Result<Self, SeriesError> {
        if horizon == 0 {
            return Err(SeriesError::InvalidConfig("horizon must be > 0".to_string()));
        }
        if n_windows == 0 {
            return Err(SeriesError::InvalidConfig("n_windows must be > 0".to_string()));
        }
        let step_size = step_size.unwrap_or(horizon);
        if step_size == 0 {
            return Err(SeriesError::InvalidConfig("step_size must be > 0".to_string()));
        }
        let min_length = (n_windows - 1)
            .checked_mul(step_size)
            .and_then(|span| span.checked_add(horizon))
            .and_then(|len| len.checked_add(1))
            .ok_or_else(|| {
                SeriesError::InvalidConfig(format!(
                    "horizon {horizon} with {n_windows} windows of step {step_size} spans more days than can be counted"
                ))
            })?;
        Ok(Self {
            horizon,
            n_windows,
            step_size,
            min_length,
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn n_windows(&self) -> usize {
        self.n_windows
    }

    pub fn step_size(&self) -> usize {
        self.step_size
    }

    /// Shortest series that leaves at least one training row in the first window.
    pub fn min_length(&self) -> usize {
        self.min_length
    }
}

/// Run every roster model over every window of one series.
///
/// A model that fails on a window contributes `NaN` predictions for that
/// window; the series itself only fails when it is too short to back-test.
pub fn cross_validation(series: &ExpandedSeries, roster: &Roster, cv: &CvConfig) -> Result<CvResult, SeriesError> {
    let n = series.rows.len();
    let required = cv.min_length();
    if n < required {
        return Err(SeriesError::InsufficientHistory { required, actual: n });
    }

    let values = series.values();
    let h = cv.horizon;
    let mut rows = Vec::with_capacity(cv.n_windows * h);

    for w in 0..cv.n_windows {
        let train_end = n - h - (cv.n_windows - 1 - w) * cv.step_size;
        let history = &values[..train_end];
        let cutoff = series.rows[train_end - 1].ds;

        let per_model: Vec<Vec<f64>> = roster
            .models()
            .iter()
            .map(|&kind| match contained(|| forecast(kind, roster.params(), history, h)) {
                Ok(f) => f,
                Err(e) => {
                    debug!(
                        unique_id = %series.unique_id,
                        model = kind.display_name(),
                        %cutoff,
                        error = %e,
                        "model failed on window"
                    );
                    vec![f64::NAN; h]
                }
            })
            .collect();

        for j in 0..h {
            let row = &series.rows[train_end + j];
            rows.push(CvRow {
                unique_id: series.unique_id.clone(),
                ds: row.ds,
                cutoff,
                y: row.y,
                predictions: per_model.iter().map(|f| f[j]).collect(),
            });
        }
    }

    Ok(CvResult {
        unique_id: series.unique_id.clone(),
        models: roster.models().to_vec(),
        rows,
    })
}

/// Run one model fit, turning a panic into a `ModelError` for that model only.
fn contained<F>(fit: F) -> Result<Vec<f64>, ModelError>
where
    F: FnOnce() -> Result<Vec<f64>, ModelError>,
{
    panic::catch_unwind(AssertUnwindSafe(fit))
        .unwrap_or_else(|payload| Err(ModelError::Panicked(panic_message(payload.as_ref()))))
}
