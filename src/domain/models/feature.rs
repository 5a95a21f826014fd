//! Feature domain model.
//!
//! A feature is a named, human-describable predictor that the external
//! scorer rates per entity on a 0-10 scale. Identity is the exact,
//! case-sensitive `name`.

use serde::{Deserialize, Serialize};

/// Lowest score a feature may assign to an entity.
pub const MIN_SCORE: f64 = 0.0;
/// Highest score a feature may assign to an entity.
pub const MAX_SCORE: f64 = 10.0;

/// A named numeric predictor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Unique (within a set) identifier
    pub name: String,
    /// One-line summary
    #[serde(default)]
    pub summary: String,
    /// Full scoring rubric handed to the scorer
    #[serde(default)]
    pub description: String,
}

impl Feature {
    pub fn new(
        name: impl Into<String>,
        summary: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            description: description.into(),
        }
    }

    /// Two features are the same feature iff their names match exactly.
    pub fn same_as(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Whether `score` is a usable feature score.
pub fn is_valid_score(score: f64) -> bool {
    score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score)
}

/// Whether any feature in `features` is named `name`.
pub fn contains_name(features: &[Feature], name: &str) -> bool {
    features.iter().any(|f| f.name == name)
}

/// Names of `features`, in order.
pub fn feature_names(features: &[Feature]) -> Vec<String> {
    features.iter().map(|f| f.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_name_only() {
        let a = Feature::new("caps", "uses caps", "rate caps usage");
        let b = Feature::new("caps", "different summary", "different rubric");
        let c = Feature::new("Caps", "uses caps", "rate caps usage");

        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_score_range() {
        assert!(is_valid_score(0.0));
        assert!(is_valid_score(10.0));
        assert!(is_valid_score(4.5));
        assert!(!is_valid_score(-0.1));
        assert!(!is_valid_score(10.5));
        assert!(!is_valid_score(f64::NAN));
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let feature: Feature = serde_json::from_str(r#"{"name": "len"}"#).unwrap();
        assert_eq!(feature.name, "len");
        assert!(feature.summary.is_empty());
    }
}
