//! Entity and evidence models.

use serde::{Deserialize, Serialize};

/// An opaque record whose scalar target the model predicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier (e.g. video or paper title)
    pub id: String,
    /// Scalar target in the original scale (e.g. view count)
    pub target: f64,
    /// Auxiliary numeric covariates supplied outside the discovery loop
    #[serde(default)]
    pub covariates: Vec<f64>,
    /// Free-form content the scorer and proposer reason about
    #[serde(default)]
    pub content: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, target: f64) -> Self {
        Self {
            id: id.into(),
            target,
            covariates: Vec::new(),
            content: String::new(),
        }
    }

    pub fn with_covariates(mut self, covariates: Vec<f64>) -> Self {
        self.covariates = covariates;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

/// One badly predicted entity handed to the proposer as evidence.
///
/// `actual` and `predicted` are in the model's native (transformed) scale.
/// `signed_delta = predicted - actual` is in the same scale, while
/// `abs_diff` is the error magnitude back in the original scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntity {
    pub entity: Entity,
    pub actual: f64,
    pub predicted: f64,
    pub abs_diff: f64,
    pub signed_delta: f64,
}

impl EvidenceEntity {
    /// Actual exceeded predicted.
    pub fn is_under_predicted(&self) -> bool {
        self.signed_delta < 0.0
    }

    /// Predicted exceeded actual.
    pub fn is_over_predicted(&self) -> bool {
        self.signed_delta > 0.0
    }
}
