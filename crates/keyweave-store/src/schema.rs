//! Database schema SQL for the normalized keyword table.
//!
//! Every statement is create-if-absent so the whole set can be replayed.

/// Pre-existing table owning the denormalized `keywords_text` column.
pub const LEGACY_TABLE: &str = "job_descriptions";

pub const KEYWORD_TABLE: &str = "job_keywords";

/// Checkpoint table, written only when skip-unchanged is enabled.
pub const SOURCE_STATE_TABLE: &str = "job_keyword_sources";

pub const SCHEMA_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Version recorded in `schema_migrations` by this migration.
pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA_DESCRIPTION: &str = "Normalize job_descriptions.keywords_text into job_keywords";

/// Shape of the legacy table, for fixtures and fresh databases.
pub const LEGACY_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS job_descriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    keywords_text TEXT,
    created_at INTEGER
);
"#;

pub const SCHEMA_MIGRATIONS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at INTEGER NOT NULL
);
"#;

pub const KEYWORD_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS job_keywords (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_record_id INTEGER NOT NULL REFERENCES job_descriptions(id) ON DELETE CASCADE,
    text TEXT NOT NULL CHECK (length(text) > 0),
    frequency INTEGER NOT NULL DEFAULT 1 CHECK (frequency >= 1),
    importance_score REAL NOT NULL DEFAULT 1.0 CHECK (importance_score > 0),
    category TEXT,
    created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000),
    UNIQUE (job_record_id, text)
);
"#;

/// The five access paths: (index name, DDL).
pub const KEYWORD_INDEXES: &[(&str, &str)] = &[
    (
        "idx_job_keywords_job_record_id",
        "CREATE INDEX IF NOT EXISTS idx_job_keywords_job_record_id ON job_keywords(job_record_id)",
    ),
    (
        "idx_job_keywords_text",
        "CREATE INDEX IF NOT EXISTS idx_job_keywords_text ON job_keywords(text)",
    ),
    (
        "idx_job_keywords_job_importance",
        "CREATE INDEX IF NOT EXISTS idx_job_keywords_job_importance ON job_keywords(job_record_id, importance_score DESC)",
    ),
    (
        "idx_job_keywords_category",
        "CREATE INDEX IF NOT EXISTS idx_job_keywords_category ON job_keywords(category)",
    ),
    (
        "idx_job_keywords_category_importance",
        "CREATE INDEX IF NOT EXISTS idx_job_keywords_category_importance ON job_keywords(category, importance_score DESC)",
    ),
];

pub const SOURCE_STATE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS job_keyword_sources (
    job_record_id INTEGER PRIMARY KEY REFERENCES job_descriptions(id) ON DELETE CASCADE,
    source_hash TEXT NOT NULL,
    migrated_at INTEGER NOT NULL
);
"#;

/// Index names in the order rollback drops them.
pub fn keyword_index_names() -> impl Iterator<Item = &'static str> {
    KEYWORD_INDEXES.iter().map(|(name, _)| *name)
}
