//! Domain services for Reflexion.

pub mod dataset;
pub mod error_analysis;
pub mod importance;
pub mod reflexion_loop;
pub mod retry;
pub mod scoring;
pub mod trainer;

pub use dataset::{split_entities, DataSplit};
pub use error_analysis::{partition_by_sign, worst_predictions};
pub use importance::{feature_importances, least_important, rank_importances, FeatureImportance};
pub use reflexion_loop::{LoopEvent, ReflexionLoop, StopHandle};
pub use retry::RetryPolicy;
pub use scoring::ScoreBatcher;
pub use trainer::{mean_absolute_error, predict, train, validation_error};
