//! Keyweave Migrate: moves denormalized `keywords_text` into `job_keywords`.
//!
//! 1. [`migrator::apply_schema`] creates the table and indexes (idempotent).
//! 2. [`runner::MigrationRunner`] parses, aggregates and scores each record.
//! 3. [`rollback::rollback`] undoes the schema, optionally exporting first.

pub mod migrator;
pub mod report;
pub mod rollback;
pub mod runner;

use std::sync::atomic::AtomicBool;

use rusqlite::Connection;

use keyweave_core::{KeyweaveConfig, Result};

pub use migrator::{apply_schema, schema_status, SchemaStatus};
pub use report::{print_report, print_rollback_report, MigrationReport, RollbackReport, SchemaOutcome, SkippedRecord};
pub use rollback::{export_legacy_text, rollback, RollbackOptions};
pub use runner::{MigrationRunner, RecordOutcome, RunnerOptions};

/// Migration entry point: apply the schema, then migrate every record.
///
/// A schema failure aborts before any data is touched.
pub fn migrate(
    conn: &mut Connection,
    config: &KeyweaveConfig,
    cancel: Option<&AtomicBool>,
) -> Result<MigrationReport> {
    let schema = apply_schema(conn)?;
    let mut report = MigrationRunner::from_config(config).run(conn, cancel)?;
    report.schema = Some(schema);
    Ok(report)
}
