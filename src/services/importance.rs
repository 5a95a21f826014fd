//! Feature importance ranking.
//!
//! Importance of a feature is the absolute value of its fitted coefficient.
//! Coefficients are laid out as intercept, auxiliary covariate weights, then
//! feature weights, matching the input-vector concatenation order.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::LinearModel;

/// Importance of one feature in a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Position in the caller's feature order
    pub index: usize,
    pub name: String,
    pub importance: f64,
}

/// Importance of every feature, in `feature_names` order.
pub fn feature_importances(
    model: &LinearModel,
    feature_names: &[String],
    auxiliary_dim_count: usize,
) -> DomainResult<Vec<FeatureImportance>> {
    let coefficients = model.coefficients();
    let available = coefficients.len().saturating_sub(1 + auxiliary_dim_count);
    if coefficients.len() < 1 + auxiliary_dim_count || feature_names.len() != available {
        return Err(DomainError::DimensionMismatch {
            context: "feature names vs coefficients".to_string(),
            expected: available,
            actual: feature_names.len(),
        });
    }

    Ok(feature_names
        .iter()
        .enumerate()
        .map(|(index, name)| FeatureImportance {
            index,
            name: name.clone(),
            importance: coefficients[1 + auxiliary_dim_count + index].abs(),
        })
        .collect())
}

/// The least important feature.
///
/// Ties resolve to the first feature in `feature_names` order.
pub fn least_important(
    model: &LinearModel,
    feature_names: &[String],
    auxiliary_dim_count: usize,
) -> DomainResult<FeatureImportance> {
    let importances = feature_importances(model, feature_names, auxiliary_dim_count)?;

    let mut least: Option<FeatureImportance> = None;
    for candidate in importances {
        let replace = least
            .as_ref()
            .is_none_or(|current| candidate.importance.total_cmp(&current.importance).is_lt());
        if replace {
            least = Some(candidate);
        }
    }

    least.ok_or_else(|| DomainError::InvalidState("no features to rank".to_string()))
}

/// All features sorted by ascending importance (stable on ties).
pub fn rank_importances(
    model: &LinearModel,
    feature_names: &[String],
    auxiliary_dim_count: usize,
) -> DomainResult<Vec<FeatureImportance>> {
    let mut importances = feature_importances(model, feature_names, auxiliary_dim_count)?;
    importances.sort_by(|a, b| a.importance.total_cmp(&b.importance));
    Ok(importances)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    fn model(coefficients: Vec<f64>) -> LinearModel {
        LinearModel::from_parts(coefficients, vec![], vec![])
    }

    #[test]
    fn test_least_important_len_caps() {
        let model = model(vec![1.0, 0.1, 5.0]);
        let least = least_important(&model, &names(&["len", "caps"]), 0).unwrap();

        assert_eq!(least.index, 0);
        assert_eq!(least.name, "len");
        assert!((least.importance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_uses_absolute_value() {
        let model = model(vec![0.0, -4.0, 0.5, -0.2]);
        let least = least_important(&model, &names(&["a", "b", "c"]), 0).unwrap();
        assert_eq!(least.name, "c");
    }

    #[test]
    fn test_ties_resolve_to_first() {
        let model = model(vec![0.0, 2.0, -1.0, 1.0]);
        let least = least_important(&model, &names(&["a", "b", "c"]), 0).unwrap();
        assert_eq!(least.index, 1);
        assert_eq!(least.name, "b");
    }

    #[test]
    fn test_skips_auxiliary_coefficients() {
        // intercept, two covariates (tiny), then features
        let model = model(vec![3.0, 0.0, 0.001, 2.0, 0.7]);
        let least = least_important(&model, &names(&["x", "y"]), 2).unwrap();
        assert_eq!(least.index, 1);
        assert_eq!(least.name, "y");
    }

    #[test]
    fn test_dimension_mismatch() {
        let model = model(vec![1.0, 0.1, 5.0]);
        let err = least_important(&model, &names(&["len"]), 0).unwrap_err();
        assert!(matches!(
            err,
            DomainError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));

        let err = least_important(&model, &names(&["len"]), 5).unwrap_err();
        assert!(matches!(err, DomainError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_deterministic() {
        let model = model(vec![1.0, 0.3, 0.3, 0.9]);
        let feature_names = names(&["a", "b", "c"]);
        let first = least_important(&model, &feature_names, 0).unwrap();
        for _ in 0..10 {
            assert_eq!(least_important(&model, &feature_names, 0).unwrap(), first);
        }
    }

    #[test]
    fn test_rank_importances_ascending() {
        let model = model(vec![0.0, 3.0, -1.0, 2.0]);
        let ranked = rank_importances(&model, &names(&["a", "b", "c"]), 0).unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }
}
