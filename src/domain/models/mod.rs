//! Domain models for the Reflexion feature-discovery loop.

pub mod config;
pub mod entity;
pub mod feature;
pub mod iteration;
pub mod linear_model;
pub mod scores;
pub mod state;
pub mod transform;

pub use config::{
    Config, DatabaseConfig, LoggingConfig, LoopConfig, RetryConfig, ScoringConfig, ServiceConfig,
};
pub use entity::{Entity, EvidenceEntity};
pub use feature::{Feature, MAX_SCORE, MIN_SCORE};
pub use iteration::{Decision, IterationRecord, RunInfo, RunSummary};
pub use linear_model::LinearModel;
pub use scores::ScoreTable;
pub use state::ReflexionState;
pub use transform::TargetTransform;
