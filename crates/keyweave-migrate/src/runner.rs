//! Data Migration Runner: legacy `keywords_text` → `job_keywords` rows.
//!
//! Records are streamed in id order, one transaction per record. A record
//! either lands completely or not at all, so the run can be interrupted
//! between records and re-invoked from the start.

use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use keyweave_core::{Error, KeyweaveConfig, Result};
use keyweave_extract::KeywordExtractor;
use keyweave_store::schema::KEYWORD_TABLE;
use keyweave_store::sqlite::{
    delete_keywords_except, job_record_exists, load_job_records_after, map_sqlite_error,
    record_source_hash, source_hash, table_exists, upsert_keyword,
};
use keyweave_store::{JobRecord, KeywordValues, UpsertOutcome};

use crate::report::{MigrationReport, SkippedRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    pub batch_size: usize,
    pub prune_stale: bool,
    pub skip_unchanged: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            prune_stale: true,
            skip_unchanged: false,
        }
    }
}

impl RunnerOptions {
    pub fn from_config(config: &KeyweaveConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            prune_stale: config.prune_stale,
            skip_unchanged: config.skip_unchanged,
        }
    }
}

/// Result of migrating one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    pub keywords: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Skipped because the checkpoint hash matched.
    pub source_unchanged: bool,
}

pub struct MigrationRunner {
    extractor: KeywordExtractor,
    options: RunnerOptions,
}

impl MigrationRunner {
    pub fn new(extractor: KeywordExtractor, options: RunnerOptions) -> Self {
        Self { extractor, options }
    }

    pub fn from_config(config: &KeyweaveConfig) -> Self {
        Self::new(
            KeywordExtractor::from_config(config),
            RunnerOptions::from_config(config),
        )
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Migrate every legacy record.
    ///
    /// Malformed records and integrity violations are skipped and reported.
    /// Any other failure rolls back the current record and ends the run with
    /// an error naming it; records committed before it stay committed.
    pub fn run(&self, conn: &mut Connection, cancel: Option<&AtomicBool>) -> Result<MigrationReport> {
        let start = std::time::Instant::now();
        let mut report = MigrationReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            scorer: self.extractor.scorer_name().to_string(),
            ..Default::default()
        };

        if !table_exists(conn, KEYWORD_TABLE)? {
            return Err(Error::NotFound(format!(
                "{} does not exist; apply the schema first",
                KEYWORD_TABLE
            )));
        }

        info!(
            run_id = %report.run_id,
            "Starting keyword migration (scorer: {}, batch: {})",
            report.scorer, self.options.batch_size
        );

        let mut after_id = 0_i64;
        'pages: loop {
            let page = load_job_records_after(conn, after_id, self.options.batch_size)?;
            if page.is_empty() {
                break;
            }

            for record in page {
                if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                    report.interrupted = true;
                    warn!(run_id = %report.run_id, "Migration interrupted before record {}", record.id);
                    break 'pages;
                }
                after_id = record.id;

                match self.migrate_record(conn, &record) {
                    Ok(outcome) => absorb(&mut report, &outcome),
                    Err(e) if e.is_record_recoverable() => {
                        warn!(run_id = %report.run_id, "Skipping job record {}: {}", record.id, e);
                        report.skipped.push(SkippedRecord {
                            job_record_id: record.id,
                            kind: e.kind().to_string(),
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => {
                        error!(run_id = %report.run_id, "Aborting at job record {}: {}", record.id, e);
                        return Err(with_record_id(e, record.id));
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %report.run_id,
            "Keyword migration complete: processed={}, skipped={}, inserted={}, updated={}, removed={}, duration={}ms",
            report.records_processed,
            report.records_skipped(),
            report.keywords_inserted,
            report.keywords_updated,
            report.keywords_removed,
            report.duration_ms
        );
        Ok(report)
    }

    /// Migrate a single record inside its own transaction.
    pub fn migrate_record(&self, conn: &mut Connection, record: &JobRecord) -> Result<RecordOutcome> {
        let extracted = self.extractor.extract(record.keywords_text.as_deref())?;

        let hash = if self.options.skip_unchanged {
            let hash = text_hash(&self.extractor.fingerprint(), record.keywords_text.as_deref());
            if source_hash(conn, record.id)?.as_deref() == Some(hash.as_str()) {
                debug!("Job record {} unchanged since last run", record.id);
                return Ok(RecordOutcome {
                    source_unchanged: true,
                    ..Default::default()
                });
            }
            Some(hash)
        } else {
            None
        };

        let now = chrono::Utc::now().timestamp_millis();
        let tx = conn.transaction().map_err(map_sqlite_error)?;

        if !job_record_exists(&tx, record.id)? {
            return Err(Error::IntegrityViolation(format!(
                "job record {} no longer exists",
                record.id
            )));
        }

        let mut outcome = RecordOutcome {
            keywords: extracted.keywords.len(),
            ..Default::default()
        };
        for keyword in &extracted.keywords {
            let values = KeywordValues {
                text: &keyword.text,
                frequency: i64::from(keyword.frequency),
                importance_score: keyword.importance_score,
                category: keyword.category.map(|c| c.as_str()),
            };
            match upsert_keyword(&tx, record.id, &values, now)? {
                UpsertOutcome::Inserted => outcome.inserted += 1,
                UpsertOutcome::Updated => outcome.updated += 1,
                UpsertOutcome::Unchanged => outcome.unchanged += 1,
            }
        }

        if self.options.prune_stale {
            let keep: Vec<&str> = extracted.keywords.iter().map(|k| k.text.as_str()).collect();
            outcome.removed = delete_keywords_except(&tx, record.id, &keep)?;
        }
        if let Some(hash) = hash {
            record_source_hash(&tx, record.id, &hash, now)?;
        }

        tx.commit().map_err(map_sqlite_error)?;
        debug!(
            "Job record {}: {} keyword(s), +{} ~{} -{}",
            record.id, outcome.keywords, outcome.inserted, outcome.updated, outcome.removed
        );
        Ok(outcome)
    }
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new(KeywordExtractor::default(), RunnerOptions::default())
    }
}

fn absorb(report: &mut MigrationReport, outcome: &RecordOutcome) {
    report.records_processed += 1;
    if outcome.source_unchanged {
        report.records_unchanged += 1;
        return;
    }
    if outcome.keywords == 0 {
        report.records_with_zero_keywords += 1;
    }
    report.keywords_inserted += outcome.inserted;
    report.keywords_updated += outcome.updated;
    report.keywords_unchanged += outcome.unchanged;
    report.keywords_removed += outcome.removed;
}

/// Prefix an aborting error with the record it stopped at, keeping its kind.
fn with_record_id(e: Error, id: i64) -> Error {
    let at = |msg: String| format!("job record {}: {}", id, msg);
    match e {
        Error::StorageIo(msg) => Error::StorageIo(at(msg)),
        Error::Database(msg) => Error::Database(at(msg)),
        Error::SchemaApplication(msg) => Error::SchemaApplication(at(msg)),
        Error::NotFound(msg) => Error::NotFound(at(msg)),
        Error::Internal(msg) => Error::Internal(at(msg)),
        other => Error::StorageIo(at(other.to_string())),
    }
}

/// SHA-256 of the extractor settings and a record's keyword text.
///
/// Null and empty text hash alike. A settings change invalidates every
/// checkpoint, so rows are re-scored under the new configuration.
pub fn text_hash(settings: &str, text: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(settings.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}
