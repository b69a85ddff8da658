//! SQLite-backed store for job records and their normalized keywords.
//!
//! [`KeywordStore`] owns a connection for convenience callers (CLI, tests).
//! The migration crates take an explicit `&Connection` / `&mut Connection`
//! and call the free functions below, so a caller-owned transaction can
//! wrap them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use crate::schema::LEGACY_SCHEMA_SQL;
use crate::types::*;
use keyweave_core::{Error, Result};

/// Owns one SQLite connection with foreign keys enforced.
pub struct KeywordStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl KeywordStore {
    /// Open or create a database file. Parent directories are created.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::StorageIo(e.to_string()))?;
        }
        let conn = Self::create_connection(db_path)?;
        info!("KeywordStore opened: path={}", db_path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
        })
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Database(e.to_string()))?;
        configure_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    pub fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(|e| Error::Database(e.to_string()))?;
        configure_connection(&conn)?;
        Ok(conn)
    }

    /// Exclusive access to the underlying connection.
    pub fn session(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Create `job_descriptions` if it does not exist.
    pub fn init_legacy_schema(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(LEGACY_SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Legacy schema init failed: {}", e)))
    }

    // ---------------------------------------------------------------
    // Job records
    // ---------------------------------------------------------------

    /// Insert a job record. Returns the new ID.
    pub fn add_job_record(&self, title: Option<&str>, keywords_text: Option<&str>) -> Result<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO job_descriptions (title, keywords_text, created_at) VALUES (?1, ?2, ?3)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .insert(params![title, keywords_text, now])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(id)
    }

    /// Replace a record's legacy keyword text.
    pub fn update_job_keywords_text(&self, id: i64, keywords_text: Option<&str>) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE job_descriptions SET keywords_text = ?1 WHERE id = ?2",
                params![keywords_text, id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Delete a job record; its keywords go with it (cascade).
    pub fn delete_job_record(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM job_descriptions WHERE id = ?1", params![id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    pub fn get_job_record(&self, id: i64) -> Result<Option<JobRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .prepare_cached("SELECT id, keywords_text FROM job_descriptions WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![id], row_to_job_record)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(record)
    }

    // ---------------------------------------------------------------
    // Keywords
    // ---------------------------------------------------------------

    pub fn keywords_for_job(&self, job_record_id: i64) -> Result<Vec<Keyword>> {
        list_keywords(&self.conn.lock(), job_record_id)
    }

    /// All keyword rows ordered by (job_record_id, id).
    pub fn all_keywords(&self) -> Result<Vec<Keyword>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM job_keywords ORDER BY job_record_id, id")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], row_to_keyword)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub fn count_keywords(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM job_keywords", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub fn get_stats(&self) -> Result<KeywordStats> {
        let conn = self.conn.lock();
        let job_records: i64 = conn
            .query_row("SELECT COUNT(*) FROM job_descriptions", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        let (keyword_rows, records_with_keywords, distinct_keywords, total_frequency, categorized_rows) =
            conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT job_record_id), COUNT(DISTINCT text), \
                 COALESCE(SUM(frequency), 0), COUNT(category) FROM job_keywords",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(KeywordStats {
            job_records,
            records_with_keywords,
            keyword_rows,
            distinct_keywords,
            total_frequency,
            categorized_rows,
            db_path: self
                .db_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        })
    }
}

// ---------------------------------------------------------------
// Session-level operations
// ---------------------------------------------------------------

/// Pragmas every connection needs. SQLite enforces cascades only with
/// `foreign_keys` on, and the setting is per connection.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| Error::Database(e.to_string()))
}

pub fn foreign_keys_enabled(conn: &Connection) -> Result<bool> {
    conn.query_row("PRAGMA foreign_keys", [], |row| row.get::<_, i64>(0))
        .map(|v| v == 1)
        .map_err(|e| Error::Database(e.to_string()))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    schema_object_exists(conn, "table", table)
}

pub fn index_exists(conn: &Connection, index: &str) -> Result<bool> {
    schema_object_exists(conn, "index", index)
}

fn schema_object_exists(conn: &Connection, kind: &str, name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            params![kind, name],
            |row| row.get(0),
        )
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(count > 0)
}

/// One page of legacy records with `id > after_id`, ascending.
pub fn load_job_records_after(conn: &Connection, after_id: i64, limit: usize) -> Result<Vec<JobRecord>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, keywords_text FROM job_descriptions WHERE id > ?1 ORDER BY id LIMIT ?2",
        )
        .map_err(|e| Error::StorageIo(e.to_string()))?;
    let rows = stmt
        .query_map(params![after_id, limit as i64], row_to_job_record)
        .map_err(|e| Error::StorageIo(e.to_string()))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::StorageIo(e.to_string()))
}

pub fn job_record_exists(conn: &Connection, id: i64) -> Result<bool> {
    conn.prepare_cached("SELECT 1 FROM job_descriptions WHERE id = ?1")
        .map_err(|e| Error::StorageIo(e.to_string()))?
        .exists(params![id])
        .map_err(|e| Error::StorageIo(e.to_string()))
}

/// Keywords of one record in insertion order.
pub fn list_keywords(conn: &Connection, job_record_id: i64) -> Result<Vec<Keyword>> {
    let mut stmt = conn
        .prepare_cached("SELECT * FROM job_keywords WHERE job_record_id = ?1 ORDER BY id")
        .map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params![job_record_id], row_to_keyword)
        .map_err(|e| Error::Database(e.to_string()))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Database(e.to_string()))
}

/// Insert, update or leave alone the (job_record_id, text) row.
///
/// `created_at` is only written on insert.
pub fn upsert_keyword(
    conn: &Connection,
    job_record_id: i64,
    values: &KeywordValues<'_>,
    now_ms: i64,
) -> Result<UpsertOutcome> {
    let existing = conn
        .prepare_cached(
            "SELECT id, frequency, importance_score, category FROM job_keywords \
             WHERE job_record_id = ?1 AND text = ?2",
        )
        .map_err(map_sqlite_error)?
        .query_row(params![job_record_id, values.text], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .optional()
        .map_err(map_sqlite_error)?;

    match existing {
        None => {
            conn.prepare_cached(
                "INSERT INTO job_keywords \
                 (job_record_id, text, frequency, importance_score, category, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(map_sqlite_error)?
            .execute(params![
                job_record_id,
                values.text,
                values.frequency,
                values.importance_score,
                values.category,
                now_ms,
            ])
            .map_err(map_sqlite_error)?;
            Ok(UpsertOutcome::Inserted)
        }
        Some((_, frequency, score, category))
            if frequency == values.frequency
                && scores_equal(score, values.importance_score)
                && category.as_deref() == values.category =>
        {
            Ok(UpsertOutcome::Unchanged)
        }
        Some((id, ..)) => {
            conn.prepare_cached(
                "UPDATE job_keywords SET frequency = ?1, importance_score = ?2, category = ?3 \
                 WHERE id = ?4",
            )
            .map_err(map_sqlite_error)?
            .execute(params![values.frequency, values.importance_score, values.category, id])
            .map_err(map_sqlite_error)?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

/// Delete a record's keywords whose text is not in `keep`. Returns rows removed.
///
/// The keep-set is matched in memory, so its size is not bounded by SQLite's
/// host parameter limit.
pub fn delete_keywords_except(conn: &Connection, job_record_id: i64, keep: &[&str]) -> Result<usize> {
    let keep: HashSet<&str> = keep.iter().copied().collect();
    let stale: Vec<i64> = {
        let mut stmt = conn
            .prepare_cached("SELECT id, text FROM job_keywords WHERE job_record_id = ?1")
            .map_err(map_sqlite_error)?;
        let rows = stmt
            .query_map(params![job_record_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(map_sqlite_error)?;
        let mut stale = Vec::new();
        for row in rows {
            let (id, text) = row.map_err(map_sqlite_error)?;
            if !keep.contains(text.as_str()) {
                stale.push(id);
            }
        }
        stale
    };

    let mut delete = conn
        .prepare_cached("DELETE FROM job_keywords WHERE id = ?1")
        .map_err(map_sqlite_error)?;
    for id in &stale {
        delete.execute(params![id]).map_err(map_sqlite_error)?;
    }
    Ok(stale.len())
}

pub fn source_hash(conn: &Connection, job_record_id: i64) -> Result<Option<String>> {
    conn.prepare_cached("SELECT source_hash FROM job_keyword_sources WHERE job_record_id = ?1")
        .map_err(map_sqlite_error)?
        .query_row(params![job_record_id], |row| row.get(0))
        .optional()
        .map_err(map_sqlite_error)
}

pub fn record_source_hash(conn: &Connection, job_record_id: i64, hash: &str, now_ms: i64) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO job_keyword_sources (job_record_id, source_hash, migrated_at) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT(job_record_id) DO UPDATE SET source_hash = excluded.source_hash, \
         migrated_at = excluded.migrated_at",
    )
    .map_err(map_sqlite_error)?
    .execute(params![job_record_id, hash, now_ms])
    .map_err(map_sqlite_error)?;
    Ok(())
}

/// Classify a rusqlite error raised during a per-record write.
///
/// Foreign-key failures are integrity violations; anything else is treated as
/// a storage fault of the current transaction.
pub fn map_sqlite_error(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Error::IntegrityViolation(e.to_string())
        }
        _ => Error::StorageIo(e.to_string()),
    }
}

/// Bind a whole list as one JSON text parameter, read back in SQL with
/// `json_each(?N)`.
pub(crate) fn json_list_param<T: Serialize>(items: &[T]) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(items)?))
}

fn scores_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}

// ---------------------------------------------------------------
// Row Mapping Helpers
// ---------------------------------------------------------------

fn row_to_job_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get("id")?,
        keywords_text: row.get("keywords_text")?,
    })
}

pub(crate) fn row_to_keyword(row: &rusqlite::Row<'_>) -> rusqlite::Result<Keyword> {
    Ok(Keyword {
        id: row.get("id")?,
        job_record_id: row.get("job_record_id")?,
        text: row.get("text")?,
        frequency: row.get("frequency")?,
        importance_score: row.get("importance_score")?,
        category: row.get("category")?,
        created_at: row.get("created_at")?,
    })
}
