//! Train/validation splitting and design-matrix assembly.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Entity, Feature, ScoreTable, TargetTransform};

/// Entities partitioned for one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSplit {
    pub training: Vec<Entity>,
    pub validation: Vec<Entity>,
}

/// Shuffle `entities` with `rng` and hold out `validation_fraction` of them.
///
/// The validation size is `round(n * fraction)` clamped to `[1, n - 1]`, so
/// both sides are always non-empty.
pub fn split_entities<R: Rng + ?Sized>(
    entities: &[Entity],
    validation_fraction: f64,
    rng: &mut R,
) -> DomainResult<DataSplit> {
    let n = entities.len();
    if n < 2 {
        return Err(DomainError::InvalidState(format!(
            "need at least 2 entities to split into training and validation, got {n}"
        )));
    }

    let mut shuffled = entities.to_vec();
    shuffled.shuffle(rng);

    let validation_len = ((n as f64 * validation_fraction).round() as usize).clamp(1, n - 1);
    let validation = shuffled.split_off(n - validation_len);

    Ok(DataSplit {
        training: shuffled,
        validation,
    })
}

/// Auxiliary covariate width shared by every entity.
pub fn auxiliary_dimension(entities: &[Entity]) -> DomainResult<usize> {
    let width = entities.first().map_or(0, |e| e.covariates.len());
    match entities.iter().find(|e| e.covariates.len() != width) {
        Some(odd) => Err(DomainError::InvalidState(format!(
            "entity '{}' has {} covariates, expected {width}",
            odd.id,
            odd.covariates.len()
        ))),
        None => Ok(width),
    }
}

/// Reject entity sets where two entities share an id.
///
/// Scores are keyed by id, so duplicates would silently share every score.
pub fn check_unique_ids(entities: &[Entity]) -> DomainResult<()> {
    let mut seen = HashSet::with_capacity(entities.len());
    match entities.iter().find(|e| !seen.insert(e.id.as_str())) {
        Some(duplicate) => Err(DomainError::InvalidState(format!(
            "entity id '{}' appears more than once",
            duplicate.id
        ))),
        None => Ok(()),
    }
}

/// One input row per entity: covariates followed by feature scores in `features` order.
pub fn design_matrix(entities: &[Entity], features: &[Feature], scores: &ScoreTable) -> DomainResult<Vec<Vec<f64>>> {
    entities
        .iter()
        .map(|entity| {
            let mut row = Vec::with_capacity(entity.covariates.len() + features.len());
            row.extend_from_slice(&entity.covariates);
            for feature in features {
                let score = scores.get(&feature.name, &entity.id).ok_or_else(|| {
                    DomainError::InvalidState(format!(
                        "no score for feature '{}' on entity '{}'",
                        feature.name, entity.id
                    ))
                })?;
                row.push(score);
            }
            Ok(row)
        })
        .collect()
}

/// Targets of `entities` in the model's native scale.
pub fn transformed_targets(entities: &[Entity], transform: TargetTransform) -> DomainResult<Vec<f64>> {
    entities.iter().map(|e| transform.forward(e.target)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entities(n: usize) -> Vec<Entity> {
        (0..n).map(|i| Entity::new(format!("e{i}"), i as f64)).collect()
    }

    #[test]
    fn test_split_sizes() {
        let mut rng = StdRng::seed_from_u64(42);
        let split = split_entities(&entities(10), 0.2, &mut rng).unwrap();
        assert_eq!(split.training.len(), 8);
        assert_eq!(split.validation.len(), 2);

        let split = split_entities(&entities(3), 0.2, &mut rng).unwrap();
        assert_eq!(split.validation.len(), 1);
        assert_eq!(split.training.len(), 2);

        let split = split_entities(&entities(2), 0.9, &mut rng).unwrap();
        assert_eq!(split.validation.len(), 1);
    }

    #[test]
    fn test_split_is_a_partition() {
        let mut rng = StdRng::seed_from_u64(7);
        let population = entities(25);
        let split = split_entities(&population, 0.2, &mut rng).unwrap();

        let mut ids: Vec<String> = split
            .training
            .iter()
            .chain(&split.validation)
            .map(|e| e.id.clone())
            .collect();
        ids.sort();
        let mut expected: Vec<String> = population.iter().map(|e| e.id.clone()).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_split_reproducible_with_seed() {
        let population = entities(30);
        let a = split_entities(&population, 0.2, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = split_entities(&population, 0.2, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_needs_two_entities() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(split_entities(&entities(1), 0.2, &mut rng).is_err());
    }

    #[test]
    fn test_design_matrix_order() {
        let population = vec![Entity::new("a", 1.0).with_covariates(vec![0.5, 0.25])];
        let features = vec![Feature::new("y", "", ""), Feature::new("x", "", "")];
        let mut scores = ScoreTable::new();
        scores.insert("x", "a", 1.0);
        scores.insert("y", "a", 9.0);

        let matrix = design_matrix(&population, &features, &scores).unwrap();
        assert_eq!(matrix, vec![vec![0.5, 0.25, 9.0, 1.0]]);
    }

    #[test]
    fn test_design_matrix_missing_score() {
        let population = entities(1);
        let features = vec![Feature::new("x", "", "")];
        let err = design_matrix(&population, &features, &ScoreTable::new()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn test_check_unique_ids() {
        assert!(check_unique_ids(&entities(5)).is_ok());

        let mut population = entities(3);
        population.push(Entity::new("e1", 42.0));
        let err = check_unique_ids(&population).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(ref msg) if msg.contains("e1")));
    }

    #[test]
    fn test_auxiliary_dimension() {
        let ok = vec![
            Entity::new("a", 1.0).with_covariates(vec![1.0, 2.0]),
            Entity::new("b", 1.0).with_covariates(vec![3.0, 4.0]),
        ];
        assert_eq!(auxiliary_dimension(&ok).unwrap(), 2);

        let ragged = vec![
            Entity::new("a", 1.0).with_covariates(vec![1.0]),
            Entity::new("b", 1.0),
        ];
        assert!(auxiliary_dimension(&ragged).is_err());
    }
}
