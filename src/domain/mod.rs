//! Domain layer for Reflexion
//!
//! This module contains the core models, errors and collaborator ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
