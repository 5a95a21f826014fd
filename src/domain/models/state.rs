//! Reflexion loop state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::feature::{contains_name, Feature};
use crate::domain::errors::{DomainError, DomainResult};

/// The running feature set and rejection history of a Reflexion run.
///
/// Invariants (checked by [`ReflexionState::new`] and preserved by every
/// transition):
/// - `active_features` is non-empty and its names are unique
/// - no rejected feature shares a name with an active feature
/// - the active cardinality never changes across transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflexionState {
    active_features: Vec<Feature>,
    rejected_features: Vec<Feature>,
    iteration: usize,
}

impl ReflexionState {
    /// Create the initial state for a run.
    pub fn new(active_features: Vec<Feature>) -> DomainResult<Self> {
        Self::restore(active_features, Vec::new(), 0)
    }

    /// Rebuild a state from persisted parts, re-checking every invariant.
    pub fn restore(
        active_features: Vec<Feature>,
        rejected_features: Vec<Feature>,
        iteration: usize,
    ) -> DomainResult<Self> {
        let state = Self {
            active_features,
            rejected_features,
            iteration,
        };
        state.check_invariants()?;
        Ok(state)
    }

    pub fn active_features(&self) -> &[Feature] {
        &self.active_features
    }

    pub fn rejected_features(&self) -> &[Feature] {
        &self.rejected_features
    }

    pub const fn iteration(&self) -> usize {
        self.iteration
    }

    /// Number of active features (K).
    pub fn cardinality(&self) -> usize {
        self.active_features.len()
    }

    pub fn is_rejected(&self, name: &str) -> bool {
        contains_name(&self.rejected_features, name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        contains_name(&self.active_features, name)
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.active_features.is_empty() {
            return Err(DomainError::InvalidState(
                "active feature set must contain at least one feature".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for feature in &self.active_features {
            if !seen.insert(feature.name.as_str()) {
                return Err(DomainError::InvalidState(format!(
                    "active feature '{}' appears more than once",
                    feature.name
                )));
            }
        }

        if let Some(overlap) = self
            .rejected_features
            .iter()
            .find(|f| seen.contains(f.name.as_str()))
        {
            return Err(DomainError::InvalidState(format!(
                "feature '{}' is both active and rejected",
                overlap.name
            )));
        }

        Ok(())
    }

    /// Swap `dropped` for `candidate` and remember the evicted incumbent.
    pub(crate) fn accept(&self, dropped: &Feature, candidate: Feature) -> Self {
        let mut active_features: Vec<Feature> = self
            .active_features
            .iter()
            .filter(|f| !f.same_as(dropped))
            .cloned()
            .collect();
        active_features.push(candidate);

        let mut rejected_features = self.rejected_features.clone();
        push_unique(&mut rejected_features, dropped.clone());

        Self {
            active_features,
            rejected_features,
            iteration: self.iteration + 1,
        }
    }

    /// Keep the active set and remember the failed newcomer.
    pub(crate) fn reject(&self, candidate: Feature) -> Self {
        let mut rejected_features = self.rejected_features.clone();
        push_unique(&mut rejected_features, candidate);

        Self {
            active_features: self.active_features.clone(),
            rejected_features,
            iteration: self.iteration + 1,
        }
    }

    /// Advance the iteration index without touching either feature list.
    pub(crate) fn skip(&self) -> Self {
        Self {
            iteration: self.iteration + 1,
            ..self.clone()
        }
    }
}

fn push_unique(features: &mut Vec<Feature>, feature: Feature) {
    if !contains_name(features, &feature.name) {
        features.push(feature);
    }
}
