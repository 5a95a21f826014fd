use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use reflexion::services::dataset::split_entities;
use reflexion::services::{least_important, partition_by_sign, rank_importances, train, validation_error, worst_predictions};
use reflexion::{Entity, TargetTransform};

/// Rows on a small integer lattice so the normal equations stay well conditioned.
fn lattice_inputs(rows: usize, dimension: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|r| {
            (0..dimension)
                .map(|d| (((r + 1) * (d + 2) * 7 + r * r * (d + 1)) % 11) as f64 - 5.0)
                .collect()
        })
        .collect()
}

fn entities(n: usize) -> Vec<Entity> {
    (0..n).map(|i| Entity::new(format!("e{i}"), i as f64)).collect()
}

proptest! {
    /// Property: an exactly linear target is recovered by training.
    #[test]
    fn prop_train_recovers_exact_linear_target(
        weights in prop::collection::vec(-5.0f64..5.0, 1..4),
        intercept in -10.0f64..10.0,
    ) {
        let dimension = weights.len();
        let inputs = lattice_inputs(30, dimension);
        let targets: Vec<f64> = inputs
            .iter()
            .map(|row| intercept + row.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>())
            .collect();

        let model = train(&inputs, &targets).unwrap();
        prop_assert!((model.intercept() - intercept).abs() < 1e-6);
        for (fitted, expected) in model.weights().iter().zip(&weights) {
            prop_assert!((fitted - expected).abs() < 1e-6);
        }
        prop_assert!(validation_error(&model, &inputs, &targets).unwrap() < 1e-6);
    }

    /// Property: the least important feature has the minimum absolute weight.
    #[test]
    fn prop_least_important_is_minimum(
        weights in prop::collection::vec(-5.0f64..5.0, 1..4),
    ) {
        let inputs = lattice_inputs(30, weights.len());
        let targets: Vec<f64> = inputs
            .iter()
            .map(|row| 1.0 + row.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>())
            .collect();
        let model = train(&inputs, &targets).unwrap();
        let names: Vec<String> = (0..weights.len()).map(|i| format!("f{i}")).collect();

        let least = least_important(&model, &names, 0).unwrap();
        let ranked = rank_importances(&model, &names, 0).unwrap();
        prop_assert_eq!(&ranked[0].name, &least.name);
        for other in &ranked {
            prop_assert!(least.importance <= other.importance);
        }
    }

    /// Property: worst predictions are bounded by k and sorted by residual magnitude.
    #[test]
    fn prop_worst_predictions_sorted_and_bounded(
        noise in prop::collection::vec(-3.0f64..3.0, 12..40),
        k in 0usize..50,
    ) {
        let population = entities(noise.len());
        let inputs = lattice_inputs(noise.len(), 1);
        let targets: Vec<f64> = inputs.iter().zip(&noise).map(|(row, n)| 2.0 * row[0] + n).collect();
        let model = train(&inputs, &targets).unwrap();

        let worst = worst_predictions(&population, &model, &inputs, &targets, k, TargetTransform::Identity).unwrap();
        prop_assert_eq!(worst.len(), k.min(population.len()));
        for pair in worst.windows(2) {
            prop_assert!(pair[0].signed_delta.abs() >= pair[1].signed_delta.abs());
        }

        let (under, over) = partition_by_sign(&worst);
        prop_assert!(under.iter().all(|e| e.signed_delta < 0.0));
        prop_assert!(over.iter().all(|e| e.signed_delta > 0.0));
        prop_assert!(under.len() + over.len() <= worst.len());
    }

    /// Property: splits are partitions with both sides non-empty.
    #[test]
    fn prop_split_is_partition(
        n in 2usize..200,
        fraction in 0.01f64..0.99,
        seed in any::<u64>(),
    ) {
        let population = entities(n);
        let split = split_entities(&population, fraction, &mut StdRng::seed_from_u64(seed)).unwrap();

        prop_assert!(!split.training.is_empty());
        prop_assert!(!split.validation.is_empty());
        prop_assert_eq!(split.training.len() + split.validation.len(), n);
    }
}
