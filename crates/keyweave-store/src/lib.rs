//! Keyweave Store: SQLite schema, job keyword rows, analytics queries.

pub mod analytics;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::KeywordStore;
pub use types::*;
