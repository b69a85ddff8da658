//! Error types for Keyweave.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A record's keyword text could not be parsed under any supported format.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A keyword row referenced a job record that does not exist.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// DDL failed; the schema was left untouched.
    #[error("Schema application failed: {0}")]
    SchemaApplication(String),

    /// Storage failed mid-transaction. Safe to retry by re-running.
    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short machine-readable kind, used in migration reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::IntegrityViolation(_) => "integrity_violation",
            Self::SchemaApplication(_) => "schema_application",
            Self::StorageIo(_) => "storage_io",
            Self::Database(_) => "database",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the runner may skip the current record and keep going.
    pub fn is_record_recoverable(&self) -> bool {
        matches!(self, Self::MalformedInput(_) | Self::IntegrityViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
