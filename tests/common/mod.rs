//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use reflexion::adapters::MockEntityScorer;
use reflexion::domain::models::{LoopConfig, RetryConfig, ScoringConfig};
use reflexion::{Entity, Feature, TargetTransform};

/// Entities whose target is `2 * (i mod 9) + 1` with a small deterministic wobble.
pub fn synthetic_entities(n: usize) -> Vec<Entity> {
    (0..n)
        .map(|i| {
            let x = (i % 9) as f64;
            let wobble = ((i * 13) % 5) as f64 * 0.1;
            Entity::new(format!("e{i}"), 2.0 * x + 1.0 + wobble).with_content(format!("entity number {i}"))
        })
        .collect()
}

/// Ground-truth signal for an entity built by [`synthetic_entities`].
pub fn signal_of(entity: &Entity) -> f64 {
    entity.id[1..].parse::<usize>().map_or(0.0, |i| (i % 9) as f64)
}

pub fn feature(name: &str) -> Feature {
    Feature::new(name, format!("{name} summary"), format!("Rate the entity on {name}."))
}

pub fn features(names: &[&str]) -> Vec<Feature> {
    names.iter().map(|n| feature(n)).collect()
}

/// Scores "signal" with the ground truth and everything else with a constant.
pub fn signal_scorer() -> Arc<MockEntityScorer> {
    Arc::new(MockEntityScorer::from_fn(|entity, feature| {
        if feature.name == "signal" {
            signal_of(entity)
        } else {
            4.0
        }
    }))
}

pub fn scoring_config() -> ScoringConfig {
    ScoringConfig {
        batch_size: 7,
        max_concurrency: 3,
        retry: RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        },
    }
}

pub fn loop_config(max_iterations: usize) -> LoopConfig {
    LoopConfig {
        max_iterations,
        worst_k: 6,
        validation_fraction: 0.2,
        seed: Some(17),
        target_transform: TargetTransform::Identity,
    }
}
