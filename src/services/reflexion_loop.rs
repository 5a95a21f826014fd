//! Reflexion loop: prune, propose, score, retrain, validate, accept or reject.
//!
//! One iteration, given the current state and a fresh 80/20 split:
//! 1. Train the incumbent model on the active features (training split)
//! 2. Pick the least important feature as the eviction candidate
//! 3. Collect the worst training residuals, split by sign
//! 4. Ask the proposer for a replacement (the evicted feature counts as rejected)
//! 5. Score the newcomer on the training split
//! 6. Retrain on (active - evicted + newcomer)
//! 7. Compare both models' mean absolute residual on the validation split
//! 8. Accept iff the candidate set is strictly better
//!
//! On accept the evicted incumbent is remembered as rejected; on reject the
//! newcomer is. Iteration-local failures (collaborator errors, too few rows)
//! skip the iteration and leave both feature lists unchanged. Iterations are
//! strictly sequential; only scoring inside an iteration runs concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::feature::{contains_name, feature_names};
use crate::domain::models::{
    Config, Decision, Entity, EvidenceEntity, Feature, IterationRecord, LoopConfig, ReflexionState,
    RunInfo, RunSummary, ScoreTable,
};
use crate::domain::ports::{EntityScorer, FeatureProposer, RunRepository};
use crate::services::dataset::{
    auxiliary_dimension, check_unique_ids, design_matrix, split_entities, transformed_targets, DataSplit,
};
use crate::services::error_analysis::{partition_by_sign, worst_predictions};
use crate::services::importance::{least_important, rank_importances};
use crate::services::retry::RetryPolicy;
use crate::services::scoring::ScoreBatcher;
use crate::services::trainer::{train, validation_error};

/// External stop signal, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to stop after the in-flight iteration.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notifications emitted while a run executes.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    IterationStarted { run_id: Uuid, iteration: usize },
    IterationFinished { record: Box<IterationRecord> },
    RunFinished { run_id: Uuid, stopped: bool },
}

/// The Reflexion controller.
pub struct ReflexionLoop {
    proposer: Arc<dyn FeatureProposer>,
    batcher: ScoreBatcher,
    config: LoopConfig,
    proposal_retry: RetryPolicy,
    repository: Option<Arc<dyn RunRepository>>,
    events: Option<mpsc::Sender<LoopEvent>>,
    stop: StopHandle,
}

impl ReflexionLoop {
    pub fn new(proposer: Arc<dyn FeatureProposer>, batcher: ScoreBatcher, config: LoopConfig) -> Self {
        Self {
            proposer,
            batcher,
            config,
            proposal_retry: RetryPolicy::default(),
            repository: None,
            events: None,
            stop: StopHandle::new(),
        }
    }

    /// Build a loop from the full application configuration.
    pub fn from_config(
        proposer: Arc<dyn FeatureProposer>,
        scorer: Arc<dyn EntityScorer>,
        config: &Config,
    ) -> Self {
        Self::new(
            proposer,
            ScoreBatcher::new(scorer, &config.scoring),
            config.reflexion.clone(),
        )
        .with_proposal_retry(RetryPolicy::from(&config.proposal))
    }

    pub fn with_proposal_retry(mut self, retry: RetryPolicy) -> Self {
        self.proposal_retry = retry;
        self
    }

    /// Attach a repository for the per-iteration audit trail.
    ///
    /// Write failures are logged and never abort the run.
    pub fn with_repository(mut self, repository: Arc<dyn RunRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<LoopEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Start a new run from `initial` and iterate until the budget or a stop signal.
    pub async fn run<R: Rng + Send>(
        &self,
        entities: &[Entity],
        initial: ReflexionState,
        rng: &mut R,
    ) -> DomainResult<RunSummary> {
        let run = RunInfo::new(
            entities.len(),
            initial.cardinality(),
            self.config.max_iterations,
            self.config.seed,
        );
        if let Some(repository) = &self.repository {
            if let Err(err) = repository.create_run(&run).await {
                warn!(run_id = %run.id, error = %err, "failed to persist run");
            }
        }

        let mut scores = ScoreTable::new();
        self.execute(run.id, entities, initial, &mut scores, rng).await
    }

    /// Continue an existing run from `state` (typically its last recorded state).
    pub async fn resume<R: Rng + Send>(
        &self,
        run_id: Uuid,
        entities: &[Entity],
        state: ReflexionState,
        rng: &mut R,
    ) -> DomainResult<RunSummary> {
        let mut scores = ScoreTable::new();
        self.execute(run_id, entities, state, &mut scores, rng).await
    }

    /// Drive iterations for `run_id`, reusing and extending `scores`.
    ///
    /// Only configuration-level problems (bad initial state, unusable
    /// entities) and caller bugs surface as errors; iteration-local failures
    /// are recorded as skipped iterations.
    pub async fn execute<R: Rng + Send>(
        &self,
        run_id: Uuid,
        entities: &[Entity],
        initial: ReflexionState,
        scores: &mut ScoreTable,
        rng: &mut R,
    ) -> DomainResult<RunSummary> {
        initial.check_invariants()?;
        check_unique_ids(entities)?;
        let auxiliary_dim = auxiliary_dimension(entities)?;
        transformed_targets(entities, self.config.target_transform)?;
        if entities.len() < 2 {
            return Err(DomainError::InvalidState(format!(
                "need at least 2 entities, got {}",
                entities.len()
            )));
        }

        info!(
            %run_id,
            entities = entities.len(),
            features = initial.cardinality(),
            start_iteration = initial.iteration(),
            max_iterations = self.config.max_iterations,
            "starting reflexion run"
        );

        let mut state = initial;
        let mut records = Vec::new();
        let mut stopped = false;

        while state.iteration() < self.config.max_iterations {
            if self.stop.is_stopped() {
                info!(%run_id, iteration = state.iteration(), "stop requested, ending run");
                stopped = true;
                break;
            }

            let iteration = state.iteration();
            self.emit(LoopEvent::IterationStarted { run_id, iteration }).await;

            let split = split_entities(entities, self.config.validation_fraction, rng)?;
            let record = match self.step(run_id, &state, &split, auxiliary_dim, scores).await {
                Ok(record) => record,
                Err(err) if err.is_iteration_local() => {
                    warn!(%run_id, iteration, error = %err, "iteration skipped");
                    IterationRecord::skipped(run_id, iteration, err.to_string(), state.skip())
                }
                Err(err) => return Err(err),
            };

            record.state.check_invariants()?;
            self.persist(&record).await;
            state = record.state.clone();
            self.emit(LoopEvent::IterationFinished {
                record: Box::new(record.clone()),
            })
            .await;
            records.push(record);
        }

        info!(
            %run_id,
            iterations = records.len(),
            active = ?feature_names(state.active_features()),
            rejected = state.rejected_features().len(),
            stopped,
            "reflexion run finished"
        );
        self.emit(LoopEvent::RunFinished { run_id, stopped }).await;

        Ok(RunSummary {
            run_id,
            final_state: state,
            records,
            stopped,
        })
    }

    /// Run one full iteration and return its record (carrying the next state).
    #[instrument(skip_all, fields(iteration = state.iteration()))]
    pub async fn step(
        &self,
        run_id: Uuid,
        state: &ReflexionState,
        split: &DataSplit,
        auxiliary_dim: usize,
        scores: &mut ScoreTable,
    ) -> DomainResult<IterationRecord> {
        let transform = self.config.target_transform;
        let active = state.active_features();

        // Incumbent model
        self.batcher.ensure_scored(scores, active, &split.training).await?;
        let train_inputs = design_matrix(&split.training, active, scores)?;
        let train_targets = transformed_targets(&split.training, transform)?;
        let old_model = train(&train_inputs, &train_targets)?;

        let names = feature_names(active);
        let ranking: Vec<(String, f64)> = rank_importances(&old_model, &names, auxiliary_dim)?
            .into_iter()
            .map(|f| (f.name, f.importance))
            .collect();
        debug!(?ranking, "feature importances");
        let least = least_important(&old_model, &names, auxiliary_dim)?;
        let dropped = active[least.index].clone();
        debug!(feature = %dropped.name, importance = least.importance, "least important feature");

        let worst = worst_predictions(
            &split.training,
            &old_model,
            &train_inputs,
            &train_targets,
            self.config.worst_k,
            transform,
        )?;
        let (worst_under, worst_over) = partition_by_sign(&worst);

        // Replacement proposal
        let remaining: Vec<Feature> = active
            .iter()
            .filter(|f| !f.same_as(&dropped))
            .cloned()
            .collect();
        let mut rejected = state.rejected_features().to_vec();
        if !contains_name(&rejected, &dropped.name) {
            rejected.push(dropped.clone());
        }
        let candidate = self
            .propose(active, &remaining, &worst_under, &worst_over, &rejected)
            .await?;
        info!(dropped = %dropped.name, candidate = %candidate.name, "candidate proposed");

        // Candidate model
        self.batcher
            .ensure_scored(scores, std::slice::from_ref(&candidate), &split.training)
            .await?;
        let mut candidate_set = remaining;
        candidate_set.push(candidate.clone());
        let candidate_inputs = design_matrix(&split.training, &candidate_set, scores)?;
        let new_model = train(&candidate_inputs, &train_targets)?;

        // Validation
        self.batcher.ensure_scored(scores, active, &split.validation).await?;
        self.batcher
            .ensure_scored(scores, std::slice::from_ref(&candidate), &split.validation)
            .await?;
        let validation_targets = transformed_targets(&split.validation, transform)?;
        let old_error = validation_error(
            &old_model,
            &design_matrix(&split.validation, active, scores)?,
            &validation_targets,
        )?;
        let new_error = validation_error(
            &new_model,
            &design_matrix(&split.validation, &candidate_set, scores)?,
            &validation_targets,
        )?;

        let (decision, next_state) = if new_error < old_error {
            (Decision::Accepted, state.accept(&dropped, candidate.clone()))
        } else {
            (Decision::Rejected, state.reject(candidate.clone()))
        };

        info!(
            decision = decision.as_str(),
            dropped = %dropped.name,
            candidate = %candidate.name,
            old_error,
            new_error,
            "iteration decided"
        );

        Ok(IterationRecord {
            run_id,
            iteration: state.iteration(),
            decision,
            dropped_feature: Some(dropped.name),
            candidate_feature: Some(candidate),
            old_validation_error: Some(old_error),
            new_validation_error: Some(new_error),
            state: next_state,
            recorded_at: Utc::now(),
        })
    }

    /// Ask for a replacement feature, rejecting name collisions.
    async fn propose(
        &self,
        active: &[Feature],
        remaining: &[Feature],
        worst_under: &[EvidenceEntity],
        worst_over: &[EvidenceEntity],
        rejected: &[Feature],
    ) -> DomainResult<Feature> {
        let proposer = &self.proposer;
        self.proposal_retry
            .execute("propose_feature", || async move {
                let candidate = proposer
                    .propose_feature(remaining, worst_under, worst_over, rejected)
                    .await?;
                if candidate.name.trim().is_empty() {
                    return Err(DomainError::ProposalFailed(
                        "proposed feature has an empty name".to_string(),
                    ));
                }
                if contains_name(active, &candidate.name) || contains_name(rejected, &candidate.name) {
                    return Err(DomainError::DuplicateFeatureName(candidate.name));
                }
                Ok(candidate)
            })
            .await
    }

    async fn persist(&self, record: &IterationRecord) {
        if let Some(repository) = &self.repository {
            if let Err(err) = repository.record_iteration(record).await {
                warn!(
                    run_id = %record.run_id,
                    iteration = record.iteration,
                    error = %err,
                    "failed to persist iteration record"
                );
            }
        }
    }

    async fn emit(&self, event: LoopEvent) {
        if let Some(events) = &self.events {
            if events.send(event).await.is_err() {
                debug!("loop event receiver dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockEntityScorer, MockFeatureProposer};
    use crate::domain::models::{RetryConfig, ScoringConfig, TargetTransform};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scoring_config() -> ScoringConfig {
        ScoringConfig {
            batch_size: 8,
            max_concurrency: 2,
            retry: RetryConfig {
                max_attempts: 2,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
            },
        }
    }

    fn loop_config(max_iterations: usize) -> LoopConfig {
        LoopConfig {
            max_iterations,
            worst_k: 5,
            validation_fraction: 0.2,
            seed: Some(42),
            target_transform: TargetTransform::Identity,
        }
    }

    /// Entity `i` has target `3 * (i mod 11)` plus a little noise.
    fn entities(n: usize) -> Vec<Entity> {
        (0..n)
            .map(|i| {
                let x = (i % 11) as f64;
                Entity::new(format!("e{i}"), 3.0 * x + ((i * 7) % 3) as f64)
            })
            .collect()
    }

    fn signal(entity: &Entity) -> f64 {
        entity.id[1..].parse::<usize>().map_or(0.0, |i| (i % 11) as f64)
    }

    /// "signal" tracks the target; every other feature is hashed noise.
    fn scorer() -> Arc<MockEntityScorer> {
        Arc::new(MockEntityScorer::from_fn(|entity, feature| {
            if feature.name == "signal" {
                signal(entity)
            } else {
                let id_sum: usize = entity.id.bytes().map(usize::from).sum();
                let name_sum: usize = feature.name.bytes().map(usize::from).sum();
                ((id_sum * 31 + name_sum * 17 + id_sum * name_sum) % 11) as f64
            }
        }))
    }

    fn features(names: &[&str]) -> Vec<Feature> {
        names
            .iter()
            .map(|n| Feature::new(*n, format!("{n} summary"), format!("{n} rubric")))
            .collect()
    }

    #[tokio::test]
    async fn test_iteration_count_and_invariants() {
        let proposer = Arc::new(MockFeatureProposer::sequential("cand"));
        let reflexion = ReflexionLoop::new(
            proposer,
            ScoreBatcher::new(scorer(), &scoring_config()),
            loop_config(4),
        )
        .with_proposal_retry(RetryPolicy::immediate(2));

        let initial = ReflexionState::new(features(&["noise_a", "noise_b"])).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let summary = reflexion.run(&entities(40), initial, &mut rng).await.unwrap();

        assert_eq!(summary.records.len(), 4);
        assert_eq!(summary.final_state.iteration(), 4);
        assert_eq!(summary.final_state.cardinality(), 2);
        summary.final_state.check_invariants().unwrap();
        for record in &summary.records {
            assert_eq!(record.state.cardinality(), 2);
            record.state.check_invariants().unwrap();
        }
    }

    #[tokio::test]
    async fn test_accepts_only_strict_improvement() {
        let proposer = Arc::new(MockFeatureProposer::scripted(
            "cand",
            vec![Ok(Feature::new("signal", "tracks target", "rate signal"))],
        ));
        let reflexion = ReflexionLoop::new(
            proposer,
            ScoreBatcher::new(scorer(), &scoring_config()),
            loop_config(3),
        );

        let initial = ReflexionState::new(features(&["noise_a", "noise_b"])).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let summary = reflexion.run(&entities(60), initial, &mut rng).await.unwrap();

        for record in &summary.records {
            match record.decision {
                Decision::Accepted => {
                    assert!(record.new_validation_error.unwrap() < record.old_validation_error.unwrap());
                }
                Decision::Rejected => {
                    assert!(record.new_validation_error.unwrap() >= record.old_validation_error.unwrap());
                }
                Decision::Skipped { .. } => {}
            }
        }
        assert_eq!(summary.records[0].decision, Decision::Accepted);
        assert!(summary.final_state.is_active("signal"));
    }

    #[tokio::test]
    async fn test_proposer_sees_dropped_feature_as_rejected() {
        let proposer = Arc::new(MockFeatureProposer::sequential("cand"));
        let reflexion = ReflexionLoop::new(
            proposer.clone(),
            ScoreBatcher::new(scorer(), &scoring_config()),
            loop_config(1),
        );

        let initial = ReflexionState::new(features(&["noise_a", "noise_b"])).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let summary = reflexion.run(&entities(30), initial, &mut rng).await.unwrap();

        let calls = proposer.calls();
        assert_eq!(calls.len(), 1);
        let dropped = summary.records[0].dropped_feature.clone().unwrap();
        assert!(calls[0].rejected.contains(&dropped));
        assert!(!calls[0].active.contains(&dropped));
        assert_eq!(calls[0].active.len(), 1);
        assert!(calls[0].under_predicted + calls[0].over_predicted <= 5);
    }

    #[tokio::test]
    async fn test_duplicate_proposal_skips_iteration() {
        let proposer = Arc::new(MockFeatureProposer::scripted(
            "cand",
            vec![
                Ok(Feature::new("noise_a", "", "")),
                Ok(Feature::new("noise_b", "", "")),
            ],
        ));
        let reflexion = ReflexionLoop::new(
            proposer,
            ScoreBatcher::new(scorer(), &scoring_config()),
            loop_config(1),
        )
        .with_proposal_retry(RetryPolicy::immediate(2));

        let initial = ReflexionState::new(features(&["noise_a", "noise_b"])).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let summary = reflexion
            .run(&entities(30), initial.clone(), &mut rng)
            .await
            .unwrap();

        assert!(matches!(summary.records[0].decision, Decision::Skipped { .. }));
        assert_eq!(summary.final_state.active_features(), initial.active_features());
        assert!(summary.final_state.rejected_features().is_empty());
        assert_eq!(summary.final_state.iteration(), 1);
    }

    #[tokio::test]
    async fn test_scoring_outage_skips_iteration_and_continues() {
        let scorer = Arc::new(MockEntityScorer::constant(4.0).failing_first(2));
        let proposer = Arc::new(MockFeatureProposer::sequential("cand"));
        let reflexion = ReflexionLoop::new(
            proposer,
            ScoreBatcher::new(scorer, &scoring_config()),
            loop_config(2),
        );

        let initial = ReflexionState::new(features(&["a"])).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let summary = reflexion.run(&entities(20), initial, &mut rng).await.unwrap();

        assert_eq!(summary.records.len(), 2);
        assert!(matches!(summary.records[0].decision, Decision::Skipped { .. }));
        assert!(!matches!(summary.records[1].decision, Decision::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_insufficient_data_skips_iteration() {
        let proposer = Arc::new(MockFeatureProposer::sequential("cand"));
        let reflexion = ReflexionLoop::new(
            proposer,
            ScoreBatcher::new(scorer(), &scoring_config()),
            loop_config(1),
        );

        // 4 entities -> 3 training rows, but 3 features need 4
        let initial = ReflexionState::new(features(&["a", "b", "c"])).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let summary = reflexion.run(&entities(4), initial, &mut rng).await.unwrap();

        match &summary.records[0].decision {
            Decision::Skipped { reason } => assert!(reason.contains("Insufficient")),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_signal_ends_run_before_next_iteration() {
        let proposer = Arc::new(MockFeatureProposer::sequential("cand"));
        let reflexion = ReflexionLoop::new(
            proposer,
            ScoreBatcher::new(scorer(), &scoring_config()),
            loop_config(10),
        );
        reflexion.stop_handle().stop();

        let initial = ReflexionState::new(features(&["a"])).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let summary = reflexion.run(&entities(20), initial, &mut rng).await.unwrap();

        assert!(summary.stopped);
        assert!(summary.records.is_empty());
        assert_eq!(summary.final_state.iteration(), 0);
    }

    #[tokio::test]
    async fn test_invalid_entities_are_configuration_errors() {
        let proposer = Arc::new(MockFeatureProposer::sequential("cand"));
        let reflexion = ReflexionLoop::new(
            proposer,
            ScoreBatcher::new(scorer(), &scoring_config()),
            LoopConfig {
                target_transform: TargetTransform::Log,
                ..loop_config(1)
            },
        );

        let initial = ReflexionState::new(features(&["a"])).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        // entity e0 has target 0, outside ln's domain
        let err = reflexion.run(&entities(10), initial, &mut rng).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_duplicate_entity_ids_are_configuration_errors() {
        let scorer = scorer();
        let proposer = Arc::new(MockFeatureProposer::sequential("cand"));
        let reflexion = ReflexionLoop::new(
            proposer.clone(),
            ScoreBatcher::new(scorer.clone(), &scoring_config()),
            loop_config(1),
        );

        let population: Vec<Entity> = (0..20).map(|i| Entity::new("same", f64::from(i))).collect();
        let initial = ReflexionState::new(features(&["a", "b"])).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let err = reflexion.run(&population, initial, &mut rng).await.unwrap_err();

        assert!(matches!(err, DomainError::InvalidState(ref msg) if msg.contains("same")));
        assert_eq!(scorer.call_count(), 0);
        assert!(proposer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let (tx, mut rx) = mpsc::channel(64);
        let proposer = Arc::new(MockFeatureProposer::sequential("cand"));
        let reflexion = ReflexionLoop::new(
            proposer,
            ScoreBatcher::new(scorer(), &scoring_config()),
            loop_config(2),
        )
        .with_events(tx);

        let initial = ReflexionState::new(features(&["a"])).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        reflexion.run(&entities(20), initial, &mut rng).await.unwrap();
        drop(reflexion);

        let mut started = 0;
        let mut finished = 0;
        let mut run_finished = false;
        while let Some(event) = rx.recv().await {
            match event {
                LoopEvent::IterationStarted { .. } => started += 1,
                LoopEvent::IterationFinished { .. } => finished += 1,
                LoopEvent::RunFinished { stopped, .. } => {
                    assert!(!stopped);
                    run_finished = true;
                }
            }
        }
        assert_eq!((started, finished), (2, 2));
        assert!(run_finished);
    }
}
