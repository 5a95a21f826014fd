//! HTTP adapters for the external feature service.

pub mod feature_service;

pub use feature_service::{FeatureServiceConfig, HttpFeatureService};
