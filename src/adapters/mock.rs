//! Mock collaborators for testing and dry runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Entity, EvidenceEntity, Feature, MAX_SCORE};
use crate::domain::ports::{EntityScorer, FeatureBootstrapper, FeatureProposer};

type ScoreFn = dyn Fn(&Entity, &Feature) -> f64 + Send + Sync;

/// How a [`MockEntityScorer`] derives scores.
#[derive(Clone)]
enum ScoreMode {
    Constant(f64),
    /// Stable pseudo-random score per (feature, entity) pair.
    Hashed,
    Function(Arc<ScoreFn>),
}

/// Mock scorer with failure injection.
pub struct MockEntityScorer {
    mode: ScoreMode,
    fail_first: u32,
    omit_on_first_call: usize,
    calls: AtomicU32,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockEntityScorer {
    fn with_mode(mode: ScoreMode) -> Self {
        Self {
            mode,
            fail_first: 0,
            omit_on_first_call: 0,
            calls: AtomicU32::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Every entity gets `score`.
    pub fn constant(score: f64) -> Self {
        Self::with_mode(ScoreMode::Constant(score))
    }

    /// Deterministic scores in `[0, 10]` derived from feature name and entity id.
    pub fn hashed() -> Self {
        Self::with_mode(ScoreMode::Hashed)
    }

    /// Scores computed by `f`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Entity, &Feature) -> f64 + Send + Sync + 'static,
    {
        Self::with_mode(ScoreMode::Function(Arc::new(f)))
    }

    /// The first `n` calls fail with a transient scoring error.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    /// The first call leaves out the first `n` entities of its batch.
    pub fn omitting_first(mut self, n: usize) -> Self {
        self.omit_on_first_call = n;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sizes of every batch received, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }

    fn score(&self, entity: &Entity, feature: &Feature) -> f64 {
        match &self.mode {
            ScoreMode::Constant(score) => *score,
            ScoreMode::Hashed => hashed_score(&feature.name, &entity.id),
            ScoreMode::Function(f) => f(entity, feature),
        }
    }
}

#[async_trait]
impl EntityScorer for MockEntityScorer {
    async fn score_entities(
        &self,
        entities: &[Entity],
        feature: &Feature,
    ) -> DomainResult<HashMap<String, f64>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sizes) = self.batch_sizes.lock() {
            sizes.push(entities.len());
        }

        if call < self.fail_first {
            return Err(DomainError::ScoringFailed(format!(
                "mock scorer failure on call {}",
                call + 1
            )));
        }

        let skip = if call == 0 { self.omit_on_first_call } else { 0 };
        Ok(entities
            .iter()
            .skip(skip)
            .map(|e| (e.id.clone(), self.score(e, feature)))
            .collect())
    }
}

/// FNV-1a over `feature\0entity`, folded into `[0, 10]` in 0.5 steps.
fn hashed_score(feature: &str, entity: &str) -> f64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in feature.bytes().chain(std::iter::once(0)).chain(entity.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    let steps = (MAX_SCORE * 2.0) as u64 + 1;
    (hash % steps) as f64 / 2.0
}

/// Arguments of one recorded proposal call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalCall {
    pub active: Vec<String>,
    pub under_predicted: usize,
    pub over_predicted: usize,
    pub rejected: Vec<String>,
}

/// Mock proposer returning scripted replies, then fresh sequential features.
pub struct MockFeatureProposer {
    prefix: String,
    script: Mutex<VecDeque<DomainResult<Feature>>>,
    generated: AtomicU32,
    calls: Mutex<Vec<ProposalCall>>,
}

impl MockFeatureProposer {
    /// Proposes `{prefix}_1`, `{prefix}_2`, ... forever.
    pub fn sequential(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            script: Mutex::new(VecDeque::new()),
            generated: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replies with `script` in order before falling back to sequential names.
    pub fn scripted(prefix: impl Into<String>, script: Vec<DomainResult<Feature>>) -> Self {
        let proposer = Self::sequential(prefix);
        if let Ok(mut queue) = proposer.script.lock() {
            queue.extend(script);
        }
        proposer
    }

    pub fn calls(&self) -> Vec<ProposalCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_generated(&self) -> Feature {
        let n = self.generated.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("{}_{n}", self.prefix);
        Feature::new(
            name.clone(),
            format!("generated feature {n}"),
            format!("Rate how strongly the entity exhibits {name}."),
        )
    }
}

#[async_trait]
impl FeatureProposer for MockFeatureProposer {
    async fn propose_feature(
        &self,
        active: &[Feature],
        worst_under: &[EvidenceEntity],
        worst_over: &[EvidenceEntity],
        rejected: &[Feature],
    ) -> DomainResult<Feature> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ProposalCall {
                active: active.iter().map(|f| f.name.clone()).collect(),
                under_predicted: worst_under.len(),
                over_predicted: worst_over.len(),
                rejected: rejected.iter().map(|f| f.name.clone()).collect(),
            });
        }

        let scripted = self.script.lock().ok().and_then(|mut q| q.pop_front());
        scripted.unwrap_or_else(|| Ok(self.next_generated()))
    }
}

#[async_trait]
impl FeatureBootstrapper for MockFeatureProposer {
    async fn bootstrap_features(&self, _entities: &[Entity], count: usize) -> DomainResult<Vec<Feature>> {
        Ok((1..=count)
            .map(|i| {
                Feature::new(
                    format!("seed_{i}"),
                    format!("seed feature {i}"),
                    format!("Rate the entity on seed dimension {i}."),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_score_is_stable_and_in_range() {
        let a = hashed_score("caps", "video-1");
        assert_eq!(a, hashed_score("caps", "video-1"));
        for id in 0..50 {
            let s = hashed_score("caps", &format!("video-{id}"));
            assert!((0.0..=10.0).contains(&s));
        }
    }

    #[tokio::test]
    async fn test_scripted_then_sequential() {
        let proposer = MockFeatureProposer::scripted(
            "cand",
            vec![
                Err(DomainError::ProposalFailed("bad".into())),
                Ok(Feature::new("scripted", "", "")),
            ],
        );

        assert!(proposer.propose_feature(&[], &[], &[], &[]).await.is_err());
        assert_eq!(
            proposer.propose_feature(&[], &[], &[], &[]).await.unwrap().name,
            "scripted"
        );
        assert_eq!(
            proposer.propose_feature(&[], &[], &[], &[]).await.unwrap().name,
            "cand_1"
        );
        assert_eq!(proposer.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_bootstrap_count() {
        let proposer = MockFeatureProposer::sequential("cand");
        let features = proposer.bootstrap_features(&[], 3).await.unwrap();
        let names: Vec<&str> = features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["seed_1", "seed_2", "seed_3"]);
    }
}
