//! Reflexion - iterative feature discovery for linear models
//!
//! Reflexion grows a small set of human-readable features that explain a
//! scalar target. Each iteration trains a linear model on the current
//! features, evicts the least important one, asks an external proposer for a
//! replacement informed by the worst residuals, and keeps the swap only if it
//! lowers validation error.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and collaborator ports
//! - **Service Layer** (`services`): Regression, importance, residual analysis and the loop
//! - **Adapters** (`adapters`): HTTP feature service, SQLite run store, mocks
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rand::SeedableRng;
//! use reflexion::adapters::{MockEntityScorer, MockFeatureProposer};
//! use reflexion::{Config, ReflexionLoop, ReflexionState};
//!
//! let reflexion = ReflexionLoop::from_config(
//!     Arc::new(MockFeatureProposer::sequential("candidate")),
//!     Arc::new(MockEntityScorer::hashed()),
//!     &Config::default(),
//! );
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let summary = reflexion.run(&entities, ReflexionState::new(features)?, &mut rng).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, Decision, Entity, EvidenceEntity, Feature, IterationRecord, LinearModel, ReflexionState,
    RunInfo, RunSummary, ScoreTable, TargetTransform,
};
pub use domain::ports::{EntityScorer, FeatureBootstrapper, FeatureProposer, RunRepository};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{LoopEvent, ReflexionLoop, StopHandle};
