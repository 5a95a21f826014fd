//! Feature proposer port - the external model that suggests new features.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EvidenceEntity, Feature};

/// Proposes one replacement feature given where the current model fails.
///
/// Implementations must return a feature whose name collides with neither
/// `active` nor `rejected`. The loop re-checks this and treats a collision
/// as a failed proposal.
#[async_trait]
pub trait FeatureProposer: Send + Sync {
    /// Propose a single new feature.
    ///
    /// # Arguments
    /// * `active` - The features that will remain after the eviction
    /// * `worst_under` - Worst residuals where actual exceeded predicted
    /// * `worst_over` - Worst residuals where predicted exceeded actual
    /// * `rejected` - Features already shown unhelpful (never re-propose)
    ///
    /// # Returns
    /// * `Ok(feature)` - The candidate feature
    /// * `Err(DomainError::ProposalFailed)` - The proposer could not answer
    async fn propose_feature(
        &self,
        active: &[Feature],
        worst_under: &[EvidenceEntity],
        worst_over: &[EvidenceEntity],
        rejected: &[Feature],
    ) -> DomainResult<Feature>;
}
