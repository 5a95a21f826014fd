//! Entity scorer port - the external model that rates entities per feature.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Entity, Feature};

/// Scores a batch of entities against one feature description.
#[async_trait]
pub trait EntityScorer: Send + Sync {
    /// Score `entities` on `feature`.
    ///
    /// Returns a map from entity id to a score in `[0, 10]`. A result that
    /// omits some ids is a partial success: the caller retries the missing
    /// subset rather than failing the batch.
    async fn score_entities(
        &self,
        entities: &[Entity],
        feature: &Feature,
    ) -> DomainResult<HashMap<String, f64>>;
}
