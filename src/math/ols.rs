//! Least squares for autoregressive fits.
//!
//! An AR(p) fit regresses `y_t` on an intercept and the `p` previous values.
//! Lag columns of flat or nearly flat sales are close to collinear, so the
//! system is solved through SVD with a rank cutoff relative to the largest
//! singular value: rank-deficient designs get the minimum-norm solution, and
//! only a design with no usable direction at all is refused.

use nalgebra::{DMatrix, DVector};

use crate::error::ModelError;

/// Design matrix `[1, y_{t-1}, .., y_{t-p}]` and targets `y_t` for `t = p..n`.
///
/// Callers guarantee `series.len() > p`.
pub fn lag_design(series: &[f64], p: usize) -> (DMatrix<f64>, DVector<f64>) {
    let rows = series.len() - p;
    let x = DMatrix::from_fn(rows, p + 1, |r, c| if c == 0 { 1.0 } else { series[r + p - c] });
    let y = DVector::from_fn(rows, |r, _| series[r + p]);
    (x, y)
}

/// Solve `min ||x β - y||²`.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, ModelError> {
    let svd = x.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    if !(max_sv.is_finite() && max_sv > 0.0) {
        return Err(ModelError::IllConditioned);
    }

    let tol = max_sv * x.nrows().max(x.ncols()) as f64 * f64::EPSILON;
    let beta = svd.solve(y, tol).map_err(|_| ModelError::IllConditioned)?;
    if beta.iter().all(|v| v.is_finite()) {
        Ok(beta)
    } else {
        Err(ModelError::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn constant_lag_column_still_solves() {
        // Intercept and lag columns are identical: rank 1.
        let (x, y) = lag_design(&[4.0, 4.0, 4.0, 4.0], 1);
        assert_eq!(x.shape(), (3, 2));

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] + 4.0 * beta[1] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn lag_design_layout() {
        let (x, y) = lag_design(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(x.row(0).iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 1.0]);
        assert_eq!(x.row(2).iter().copied().collect::<Vec<_>>(), vec![1.0, 4.0, 3.0]);
        assert_eq!(y.as_slice(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn zero_design_is_ill_conditioned() {
        let x = DMatrix::<f64>::zeros(3, 2);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(solve_least_squares(&x, &y), Err(ModelError::IllConditioned));
    }
}
