//! Rollback Manager: optional export to the legacy text format, then drop
//! the keyword schema objects.
//!
//! Never invoked by the runner; a failed forward run is fixed by re-running.

use std::collections::BTreeMap;

use rusqlite::{params, Connection};
use tracing::{info, warn};

use keyweave_core::{Error, Result};
use keyweave_store::schema::{
    keyword_index_names, KEYWORD_TABLE, SCHEMA_MIGRATIONS_TABLE, SCHEMA_VERSION,
    SOURCE_STATE_TABLE,
};
use keyweave_store::sqlite::{index_exists, table_exists};

use crate::report::RollbackReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackOptions {
    /// Serialize keywords back into legacy text before dropping anything.
    pub export: bool,
    pub separator: String,
}

impl Default for RollbackOptions {
    fn default() -> Self {
        Self {
            export: false,
            separator: ", ".to_string(),
        }
    }
}

/// Keywords per record joined with `separator`, in first-seen (id) order.
///
/// Frequency, importance and category are not representable and are lost.
/// Returns an empty map when the keyword table does not exist.
pub fn export_legacy_text(conn: &Connection, separator: &str) -> Result<BTreeMap<i64, String>> {
    let mut export: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    if !table_exists(conn, KEYWORD_TABLE)? {
        return Ok(BTreeMap::new());
    }

    let mut stmt = conn
        .prepare("SELECT job_record_id, text FROM job_keywords ORDER BY job_record_id, id")
        .map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| Error::Database(e.to_string()))?;
    for row in rows {
        let (job_record_id, text) = row.map_err(|e| Error::Database(e.to_string()))?;
        export.entry(job_record_id).or_default().push(text);
    }

    Ok(export
        .into_iter()
        .map(|(id, keywords)| (id, keywords.join(separator)))
        .collect())
}

/// Drop the five indexes, the keyword table and the checkpoint table, and
/// forget the schema version. Safe to run when nothing is applied.
pub fn rollback(conn: &mut Connection, options: &RollbackOptions) -> Result<RollbackReport> {
    let mut report = RollbackReport::default();

    if options.export {
        let export = export_legacy_text(conn, &options.separator)?;
        info!("Exported keywords of {} job record(s)", export.len());
        report.export = Some(export);
    }

    let tx = conn.transaction().map_err(|e| Error::Database(e.to_string()))?;
    let ddl_err = |e: rusqlite::Error| Error::SchemaApplication(e.to_string());

    for name in keyword_index_names() {
        if index_exists(&tx, name)? {
            tx.execute_batch(&format!("DROP INDEX IF EXISTS {}", name))
                .map_err(ddl_err)?;
            report.indexes_dropped.push(name.to_string());
        }
    }

    if table_exists(&tx, KEYWORD_TABLE)? {
        report.keyword_rows_discarded = tx
            .query_row("SELECT COUNT(*) FROM job_keywords", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute_batch("DROP TABLE IF EXISTS job_keywords")
            .map_err(ddl_err)?;
        report.keyword_table_dropped = true;
    }

    if table_exists(&tx, SOURCE_STATE_TABLE)? {
        tx.execute_batch("DROP TABLE IF EXISTS job_keyword_sources")
            .map_err(ddl_err)?;
        report.source_state_dropped = true;
    }

    if table_exists(&tx, SCHEMA_MIGRATIONS_TABLE)? {
        let removed = tx
            .execute(
                "DELETE FROM schema_migrations WHERE version = ?1",
                params![SCHEMA_VERSION],
            )
            .map_err(ddl_err)?;
        report.version_removed = removed > 0;
    }

    tx.commit().map_err(ddl_err)?;

    if report.keyword_table_dropped {
        warn!(
            "Rolled back keyword schema: dropped {} index(es), discarded {} keyword row(s)",
            report.indexes_dropped.len(),
            report.keyword_rows_discarded
        );
    } else {
        info!("Keyword schema not present; nothing to roll back");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrator::{apply_schema, schema_status};
    use keyweave_store::schema::LEGACY_SCHEMA_SQL;

    fn applied_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEGACY_SCHEMA_SQL).unwrap();
        apply_schema(&mut conn).unwrap();
        conn.execute_batch(
            "INSERT INTO job_descriptions (id, keywords_text) VALUES (1, 'x'), (2, 'y');
             INSERT INTO job_keywords (job_record_id, text) VALUES (1, 'python'), (1, 'sql'), (2, 'go');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_export_joins_in_id_order() {
        let conn = applied_conn();
        let export = export_legacy_text(&conn, "; ").unwrap();
        assert_eq!(export.get(&1).map(String::as_str), Some("python; sql"));
        assert_eq!(export.get(&2).map(String::as_str), Some("go"));
    }

    #[test]
    fn test_rollback_restores_pre_migration_schema() {
        let mut conn = applied_conn();
        let report = rollback(
            &mut conn,
            &RollbackOptions {
                export: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(report.indexes_dropped.len(), 5);
        assert!(report.keyword_table_dropped);
        assert!(report.source_state_dropped);
        assert!(report.version_removed);
        assert_eq!(report.keyword_rows_discarded, 3);
        assert_eq!(report.export.as_ref().map(|e| e.len()), Some(2));

        let status = schema_status(&conn).unwrap();
        assert!(status.legacy_table);
        assert!(!status.keyword_table);
        assert!(status.indexes_present.is_empty());
        assert_eq!(status.version, None);

        // Legacy data is untouched
        let legacy: i64 = conn
            .query_row("SELECT COUNT(*) FROM job_descriptions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(legacy, 2);
    }

    #[test]
    fn test_rollback_is_idempotent() {
        let mut conn = applied_conn();
        rollback(&mut conn, &RollbackOptions::default()).unwrap();
        let again = rollback(&mut conn, &RollbackOptions::default()).unwrap();
        assert!(again.indexes_dropped.is_empty());
        assert!(!again.keyword_table_dropped);
        assert!(!again.version_removed);
        assert!(again.export.is_none());
    }

    #[test]
    fn test_reapply_after_rollback() {
        let mut conn = applied_conn();
        rollback(&mut conn, &RollbackOptions::default()).unwrap();
        let outcome = apply_schema(&mut conn).unwrap();
        assert!(outcome.created_keyword_table);
        assert!(outcome.version_recorded);
        assert!(schema_status(&conn).unwrap().is_applied());
    }
}
