//! Target scale transforms.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Transform applied to targets before training.
///
/// The trainer is scale-agnostic; the loop fits in the transformed
/// ("native") scale and maps back with [`TargetTransform::inverse`] when
/// reporting error magnitudes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTransform {
    /// `ln(1 + y)`, defined for y > -1
    #[default]
    Log1p,
    /// `ln(y)`, defined for y > 0
    Log,
    Identity,
}

impl TargetTransform {
    pub fn forward(self, value: f64) -> DomainResult<f64> {
        let transformed = match self {
            Self::Log1p if value > -1.0 => value.ln_1p(),
            Self::Log if value > 0.0 => value.ln(),
            Self::Identity => value,
            _ => f64::NAN,
        };
        if transformed.is_finite() {
            Ok(transformed)
        } else {
            Err(DomainError::InvalidState(format!(
                "target {value} is outside the domain of the {self:?} transform"
            )))
        }
    }

    pub fn inverse(self, value: f64) -> f64 {
        match self {
            Self::Log1p => value.exp_m1(),
            Self::Log => value.exp(),
            Self::Identity => value,
        }
    }
}
