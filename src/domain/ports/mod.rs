//! Port trait definitions (Hexagonal Architecture)
//!
//! The loop core talks to its collaborators only through these traits:
//! - FeatureProposer: suggests a replacement feature from failure evidence
//! - EntityScorer: rates entities on a feature description
//! - FeatureBootstrapper: produces the initial feature set
//! - RunRepository: stores the per-iteration audit trail

pub mod entity_scorer;
pub mod feature_bootstrapper;
pub mod feature_proposer;
pub mod run_repository;

pub use entity_scorer::EntityScorer;
pub use feature_bootstrapper::FeatureBootstrapper;
pub use feature_proposer::FeatureProposer;
pub use run_repository::RunRepository;
