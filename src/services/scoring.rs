//! Batched, retrying access to the external entity scorer.
//!
//! Pending entities are chunked into batches and up to `max_concurrency`
//! batches are in flight at once. Every batch returns its own result map;
//! maps are merged only after the whole round completes. Ids that come back
//! missing, out of range, or from a failed batch stay pending and are retried
//! as a smaller set in the next round, until the attempt budget runs out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::feature::is_valid_score;
use crate::domain::models::{Entity, Feature, ScoreTable, ScoringConfig};
use crate::domain::ports::EntityScorer;
use crate::services::retry::RetryPolicy;

/// Scorer adapter wrapper that batches, parallelises and retries.
#[derive(Clone)]
pub struct ScoreBatcher {
    scorer: Arc<dyn EntityScorer>,
    batch_size: usize,
    max_concurrency: usize,
    retry: RetryPolicy,
}

impl ScoreBatcher {
    pub fn new(scorer: Arc<dyn EntityScorer>, config: &ScoringConfig) -> Self {
        Self {
            scorer,
            batch_size: config.batch_size.max(1),
            max_concurrency: config.max_concurrency.max(1),
            retry: RetryPolicy::from(&config.retry),
        }
    }

    /// Score every entity in `entities` on `feature`.
    ///
    /// Returns a score for each distinct entity id, or
    /// [`DomainError::ScoringFailed`] once the retry budget is exhausted.
    pub async fn score_all(&self, feature: &Feature, entities: &[Entity]) -> DomainResult<HashMap<String, f64>> {
        let mut seen = HashSet::new();
        let mut pending: Vec<Entity> = entities
            .iter()
            .filter(|e| seen.insert(e.id.as_str()))
            .cloned()
            .collect();
        let requested = pending.len();
        let mut scored: HashMap<String, f64> = HashMap::with_capacity(requested);
        let mut attempt = 0u32;

        while !pending.is_empty() {
            let results: Vec<DomainResult<HashMap<String, f64>>> = stream::iter(pending.chunks(self.batch_size))
                .map(|batch| async move { self.scorer.score_entities(batch, feature).await })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;

            let pending_ids: HashSet<&str> = pending.iter().map(|e| e.id.as_str()).collect();
            let mut failed_batches = 0usize;
            for result in results {
                match result {
                    Ok(batch_scores) => {
                        for (id, score) in batch_scores {
                            if !pending_ids.contains(id.as_str()) {
                                continue;
                            }
                            if is_valid_score(score) {
                                scored.insert(id, score);
                            } else {
                                warn!(feature = %feature.name, entity = %id, score, "discarding out-of-range score");
                            }
                        }
                    }
                    Err(err) if err.is_transient() => {
                        failed_batches += 1;
                        warn!(feature = %feature.name, attempt = attempt + 1, error = %err, "scoring batch failed");
                    }
                    Err(err) => return Err(err),
                }
            }

            pending.retain(|e| !scored.contains_key(&e.id));
            if pending.is_empty() {
                break;
            }

            if !self.retry.has_attempts_left(attempt) {
                return Err(DomainError::ScoringFailed(format!(
                    "feature '{}': {} of {} entities unscored after {} attempts",
                    feature.name,
                    pending.len(),
                    requested,
                    attempt + 1
                )));
            }

            let backoff = self.retry.backoff(attempt);
            warn!(
                feature = %feature.name,
                missing = pending.len(),
                failed_batches,
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                "retrying unscored entities"
            );
            sleep(backoff).await;
            attempt += 1;
        }

        debug!(feature = %feature.name, scored = scored.len(), attempts = attempt + 1, "feature scored");
        Ok(scored)
    }

    /// Score every (feature, entity) pair not already in `table`.
    pub async fn ensure_scored(
        &self,
        table: &mut ScoreTable,
        features: &[Feature],
        entities: &[Entity],
    ) -> DomainResult<()> {
        for feature in features {
            let missing: Vec<Entity> = table
                .missing(&feature.name, entities)
                .into_iter()
                .cloned()
                .collect();
            if missing.is_empty() {
                continue;
            }
            let scores = self.score_all(feature, &missing).await?;
            table.extend(&feature.name, scores);
        }
        Ok(())
    }
}
