//! Per-entity feature scores.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::entity::Entity;

/// Cache of feature scores keyed by feature name, then entity id.
///
/// Each entity's feature vector is read out of this table in a caller-chosen
/// feature order. Scores are facts about (feature, entity) pairs, so the
/// table outlives individual iterations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    scores: HashMap<String, HashMap<String, f64>>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: &str, entity_id: &str) -> Option<f64> {
        self.scores.get(feature)?.get(entity_id).copied()
    }

    pub fn insert(&mut self, feature: &str, entity_id: &str, score: f64) {
        self.scores
            .entry(feature.to_string())
            .or_default()
            .insert(entity_id.to_string(), score);
    }

    /// Merge a batch of scores for one feature.
    pub fn extend(&mut self, feature: &str, scores: HashMap<String, f64>) {
        self.scores
            .entry(feature.to_string())
            .or_default()
            .extend(scores);
    }

    /// Entities (in input order) that have no score for `feature` yet.
    pub fn missing<'a>(&self, feature: &str, entities: &'a [Entity]) -> Vec<&'a Entity> {
        let known = self.scores.get(feature);
        entities
            .iter()
            .filter(|e| known.is_none_or(|m| !m.contains_key(&e.id)))
            .collect()
    }

    /// Number of scored entities for `feature`.
    pub fn scored_count(&self, feature: &str) -> usize {
        self.scores.get(feature).map_or(0, HashMap::len)
    }
}
