//! Feature bootstrapper port - produces the initial active feature set.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Entity, Feature};

/// Produces the initial `count` features for a run.
#[async_trait]
pub trait FeatureBootstrapper: Send + Sync {
    async fn bootstrap_features(&self, entities: &[Entity], count: usize) -> DomainResult<Vec<Feature>>;
}
