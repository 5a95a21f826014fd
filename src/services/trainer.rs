//! Linear model trainer.
//!
//! Ordinary least squares via the normal equations:
//!
//! `(Xᵀ·X) · β = Xᵀ·y`, with `X` augmented by a leading column of ones.
//!
//! The system is solved with Gauss-Jordan elimination and partial pivoting.
//! Columns without a usable pivot (constant or collinear inputs, common
//! when a feature scores every entity the same) get a zero weight, so the
//! fit is still defined. Training is pure: inputs are copied into the
//! returned [`LinearModel`] and nothing else is touched.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::LinearModel;

/// Relative pivot tolerance for rank-deficient systems.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Fit a linear model mapping `inputs` rows to `targets`.
///
/// Requires `inputs.len() == targets.len() >= dimension + 1`.
pub fn train(inputs: &[Vec<f64>], targets: &[f64]) -> DomainResult<LinearModel> {
    if inputs.len() != targets.len() {
        return Err(DomainError::DimensionMismatch {
            context: "training targets".to_string(),
            expected: inputs.len(),
            actual: targets.len(),
        });
    }

    let dimension = inputs.first().map_or(0, Vec::len);
    if let Some(row) = inputs.iter().find(|row| row.len() != dimension) {
        return Err(DomainError::DimensionMismatch {
            context: "training input row".to_string(),
            expected: dimension,
            actual: row.len(),
        });
    }

    let required = dimension + 1;
    if inputs.len() < required {
        return Err(DomainError::InsufficientData {
            rows: inputs.len(),
            dimension,
            required,
        });
    }

    let (xtx, xty) = normal_equations(inputs, targets, dimension);
    let coefficients = solve(xtx, xty);

    Ok(LinearModel::from_parts(
        coefficients,
        inputs.to_vec(),
        targets.to_vec(),
    ))
}

/// Predict one value per input row.
pub fn predict(model: &LinearModel, inputs: &[Vec<f64>]) -> DomainResult<Vec<f64>> {
    model.predict(inputs)
}

/// Mean absolute residual between `predictions` and `targets`.
pub fn mean_absolute_error(predictions: &[f64], targets: &[f64]) -> DomainResult<f64> {
    if predictions.len() != targets.len() {
        return Err(DomainError::DimensionMismatch {
            context: "error targets".to_string(),
            expected: predictions.len(),
            actual: targets.len(),
        });
    }
    if targets.is_empty() {
        return Err(DomainError::InsufficientData {
            rows: 0,
            dimension: 0,
            required: 1,
        });
    }

    let total: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).abs())
        .sum();
    Ok(total / targets.len() as f64)
}

/// Mean absolute residual of `model` on a held-out set.
pub fn validation_error(model: &LinearModel, inputs: &[Vec<f64>], targets: &[f64]) -> DomainResult<f64> {
    let predictions = model.predict(inputs)?;
    mean_absolute_error(&predictions, targets)
}

/// Build `Xᵀ·X` (row-major, n × n) and `Xᵀ·y` for the intercept-augmented design.
fn normal_equations(inputs: &[Vec<f64>], targets: &[f64], dimension: usize) -> (Vec<f64>, Vec<f64>) {
    let n = dimension + 1;
    let mut xtx = vec![0.0f64; n * n];
    let mut xty = vec![0.0f64; n];
    let mut augmented = vec![1.0f64; n];

    for (row, &y) in inputs.iter().zip(targets) {
        augmented[1..].copy_from_slice(row);
        for a in 0..n {
            let xa = augmented[a];
            // Upper triangle only (symmetric)
            for b in a..n {
                xtx[a * n + b] += xa * augmented[b];
            }
            xty[a] += xa * y;
        }
    }

    for a in 0..n {
        for b in (a + 1)..n {
            xtx[b * n + a] = xtx[a * n + b];
        }
    }

    (xtx, xty)
}

/// Solve `A·β = b` by Gauss-Jordan elimination with partial pivoting.
///
/// `A` is n × n row-major. Free variables (no pivot) are set to zero.
fn solve(mut a: Vec<f64>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    let scale = (0..n).map(|i| a[i * n + i].abs()).fold(0.0f64, f64::max);
    let tolerance = PIVOT_TOLERANCE * scale.max(1.0);

    let mut pivots: Vec<(usize, usize)> = Vec::with_capacity(n);
    let mut row = 0;

    for col in 0..n {
        if row == n {
            break;
        }

        let best = (row..n)
            .max_by(|&i, &j| a[i * n + col].abs().total_cmp(&a[j * n + col].abs()))
            .unwrap_or(row);
        if a[best * n + col].abs() <= tolerance {
            continue;
        }

        if best != row {
            for k in 0..n {
                a.swap(best * n + k, row * n + k);
            }
            b.swap(best, row);
        }

        let pivot = a[row * n + col];
        for k in 0..n {
            a[row * n + k] /= pivot;
        }
        b[row] /= pivot;

        for other in 0..n {
            if other == row {
                continue;
            }
            let factor = a[other * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[other * n + k] -= factor * a[row * n + k];
            }
            b[other] -= factor * b[row];
        }

        pivots.push((row, col));
        row += 1;
    }

    let mut coefficients = vec![0.0f64; n];
    for (r, c) in pivots {
        coefficients[c] = b[r];
    }
    coefficients
}
