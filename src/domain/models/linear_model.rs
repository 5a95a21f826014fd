//! Fitted linear model snapshot.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// An immutable fitted multivariate linear regression.
///
/// `coefficients[0]` is the intercept; `coefficients[1..]` are the weights of
/// each input dimension in input-vector order (auxiliary covariates first,
/// then feature scores). A new model is produced by every training call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    coefficients: Vec<f64>,
    training_inputs: Vec<Vec<f64>>,
    training_targets: Vec<f64>,
}

impl LinearModel {
    /// Build a model from already-fitted coefficients.
    pub fn from_parts(
        coefficients: Vec<f64>,
        training_inputs: Vec<Vec<f64>>,
        training_targets: Vec<f64>,
    ) -> Self {
        Self {
            coefficients,
            training_inputs,
            training_targets,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.coefficients.first().copied().unwrap_or(0.0)
    }

    /// Per-dimension weights, without the intercept.
    pub fn weights(&self) -> &[f64] {
        self.coefficients.get(1..).unwrap_or(&[])
    }

    /// Number of input dimensions the model expects.
    pub fn dimension(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn training_inputs(&self) -> &[Vec<f64>] {
        &self.training_inputs
    }

    pub fn training_targets(&self) -> &[f64] {
        &self.training_targets
    }

    /// Predict a single input row.
    pub fn predict_one(&self, row: &[f64]) -> DomainResult<f64> {
        if row.len() != self.dimension() {
            return Err(DomainError::DimensionMismatch {
                context: "prediction input row".to_string(),
                expected: self.dimension(),
                actual: row.len(),
            });
        }
        Ok(self.intercept()
            + self
                .weights()
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>())
    }

    /// Predict every row of `inputs`.
    pub fn predict(&self, inputs: &[Vec<f64>]) -> DomainResult<Vec<f64>> {
        inputs.iter().map(|row| self.predict_one(row)).collect()
    }
}
