//! Schema Migrator: creates the keyword table, its indexes and the version
//! ledger in one transaction.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use keyweave_core::{Error, Result};
use keyweave_store::schema::{
    KEYWORD_INDEXES, KEYWORD_TABLE, KEYWORD_TABLE_SQL, LEGACY_TABLE, SCHEMA_DESCRIPTION,
    SCHEMA_MIGRATIONS_SQL, SCHEMA_MIGRATIONS_TABLE, SCHEMA_VERSION, SOURCE_STATE_SQL,
    SOURCE_STATE_TABLE,
};
use keyweave_store::sqlite::{configure_connection, foreign_keys_enabled, index_exists, table_exists};

use crate::report::SchemaOutcome;

/// Current schema state as seen through `conn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaStatus {
    pub legacy_table: bool,
    pub keyword_table: bool,
    pub source_state_table: bool,
    pub indexes_present: Vec<String>,
    pub indexes_missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub foreign_keys: bool,
}

impl SchemaStatus {
    pub fn is_applied(&self) -> bool {
        self.keyword_table && self.indexes_missing.is_empty() && self.version.is_some()
    }
}

/// Apply the keyword schema. Re-applying is a no-op.
///
/// Either every object exists afterwards or nothing was changed.
pub fn apply_schema(conn: &mut Connection) -> Result<SchemaOutcome> {
    configure_connection(conn).map_err(|e| Error::SchemaApplication(e.to_string()))?;
    if !table_exists(conn, LEGACY_TABLE).map_err(|e| Error::SchemaApplication(e.to_string()))? {
        return Err(Error::SchemaApplication(format!(
            "legacy table {} not found",
            LEGACY_TABLE
        )));
    }

    let tx = conn
        .transaction()
        .map_err(|e| Error::SchemaApplication(e.to_string()))?;
    let ddl_err = |e: rusqlite::Error| Error::SchemaApplication(e.to_string());

    let mut outcome = SchemaOutcome {
        created_keyword_table: !table_exists(&tx, KEYWORD_TABLE)
            .map_err(|e| Error::SchemaApplication(e.to_string()))?,
        ..Default::default()
    };

    tx.execute_batch(SCHEMA_MIGRATIONS_SQL).map_err(ddl_err)?;
    tx.execute_batch(KEYWORD_TABLE_SQL).map_err(ddl_err)?;
    for (name, ddl) in KEYWORD_INDEXES {
        let existed = index_exists(&tx, name).map_err(|e| Error::SchemaApplication(e.to_string()))?;
        tx.execute_batch(ddl).map_err(ddl_err)?;
        if !existed {
            debug!("Created index {}", name);
            outcome.created_indexes.push((*name).to_string());
        }
    }
    tx.execute_batch(SOURCE_STATE_SQL).map_err(ddl_err)?;

    let recorded = tx
        .execute(
            "INSERT OR IGNORE INTO schema_migrations (version, description, applied_at) \
             VALUES (?1, ?2, ?3)",
            params![
                SCHEMA_VERSION,
                SCHEMA_DESCRIPTION,
                chrono::Utc::now().timestamp_millis()
            ],
        )
        .map_err(ddl_err)?;
    outcome.version_recorded = recorded > 0;

    tx.commit().map_err(ddl_err)?;

    if outcome.was_noop() {
        debug!("Keyword schema already applied");
    } else {
        info!(
            "Applied keyword schema v{}: table {}, {} index(es) created",
            SCHEMA_VERSION,
            if outcome.created_keyword_table { "created" } else { "present" },
            outcome.created_indexes.len()
        );
    }
    Ok(outcome)
}

/// Inspect which schema objects exist.
pub fn schema_status(conn: &Connection) -> Result<SchemaStatus> {
    let mut indexes_present = Vec::new();
    let mut indexes_missing = Vec::new();
    for (name, _) in KEYWORD_INDEXES {
        if index_exists(conn, name)? {
            indexes_present.push((*name).to_string());
        } else {
            indexes_missing.push((*name).to_string());
        }
    }

    let version = if table_exists(conn, SCHEMA_MIGRATIONS_TABLE)? {
        conn.query_row(
            "SELECT version FROM schema_migrations WHERE version = ?1",
            params![SCHEMA_VERSION],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))?
    } else {
        None
    };

    Ok(SchemaStatus {
        legacy_table: table_exists(conn, LEGACY_TABLE)?,
        keyword_table: table_exists(conn, KEYWORD_TABLE)?,
        source_state_table: table_exists(conn, SOURCE_STATE_TABLE)?,
        indexes_present,
        indexes_missing,
        version,
        foreign_keys: foreign_keys_enabled(conn)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyweave_store::schema::{keyword_index_names, LEGACY_SCHEMA_SQL};

    fn legacy_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEGACY_SCHEMA_SQL).unwrap();
        conn
    }

    #[test]
    fn test_apply_creates_everything() {
        let mut conn = legacy_conn();
        let outcome = apply_schema(&mut conn).unwrap();
        assert!(outcome.created_keyword_table);
        assert_eq!(outcome.created_indexes.len(), 5);
        assert!(outcome.version_recorded);

        let status = schema_status(&conn).unwrap();
        assert!(status.is_applied());
        assert!(status.foreign_keys);
        assert!(status.source_state_table);
        assert_eq!(status.version, Some(SCHEMA_VERSION));
        assert_eq!(
            status.indexes_present,
            keyword_index_names().map(String::from).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut conn = legacy_conn();
        apply_schema(&mut conn).unwrap();
        let second = apply_schema(&mut conn).unwrap();
        assert!(second.was_noop());
        assert!(schema_status(&conn).unwrap().is_applied());
    }

    #[test]
    fn test_recreates_missing_index() {
        let mut conn = legacy_conn();
        apply_schema(&mut conn).unwrap();
        conn.execute_batch("DROP INDEX idx_job_keywords_category").unwrap();
        assert_eq!(
            schema_status(&conn).unwrap().indexes_missing,
            vec!["idx_job_keywords_category".to_string()]
        );

        let outcome = apply_schema(&mut conn).unwrap();
        assert!(!outcome.created_keyword_table);
        assert_eq!(outcome.created_indexes, vec!["idx_job_keywords_category".to_string()]);
        assert!(!outcome.version_recorded);
    }

    #[test]
    fn test_missing_legacy_table_aborts_untouched() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = apply_schema(&mut conn).unwrap_err();
        assert!(matches!(err, Error::SchemaApplication(_)));

        let status = schema_status(&conn).unwrap();
        assert!(!status.keyword_table);
        assert_eq!(status.indexes_missing.len(), 5);
        assert_eq!(status.version, None);
    }

    #[test]
    fn test_failed_ddl_leaves_no_partial_schema() {
        let mut conn = legacy_conn();
        // An unrelated object squatting on one index name makes that DDL fail.
        conn.execute_batch("CREATE TABLE idx_job_keywords_text (x INTEGER)").unwrap();

        let err = apply_schema(&mut conn).unwrap_err();
        assert!(matches!(err, Error::SchemaApplication(_)));

        let status = schema_status(&conn).unwrap();
        assert!(!status.keyword_table);
        assert!(status.indexes_present.is_empty());
        assert!(!table_exists(&conn, SCHEMA_MIGRATIONS_TABLE).unwrap());
    }
}
