//! In-process adapters.

pub mod run_repository;

pub use run_repository::InMemoryRunRepository;
