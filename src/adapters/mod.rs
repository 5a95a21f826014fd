//! Adapters for external systems.

pub mod http;
pub mod memory;
pub mod mock;
pub mod sqlite;

pub use http::HttpFeatureService;
pub use memory::InMemoryRunRepository;
pub use mock::{MockEntityScorer, MockFeatureProposer};
pub use sqlite::SqliteRunRepository;
