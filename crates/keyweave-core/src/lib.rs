//! Keyweave Core: error taxonomy and configuration shared by every crate.

pub mod config;
pub mod error;

pub use config::{KeyweaveConfig, ScorerKind};
pub use error::{Error, Result};
