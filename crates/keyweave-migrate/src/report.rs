//! Run reports for schema application, data migration and rollback.

use std::collections::BTreeMap;

use serde::Serialize;

/// What `apply_schema` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaOutcome {
    pub created_keyword_table: bool,
    pub created_indexes: Vec<String>,
    /// False when version 1 was already recorded.
    pub version_recorded: bool,
}

impl SchemaOutcome {
    pub fn was_noop(&self) -> bool {
        !self.created_keyword_table && self.created_indexes.is_empty() && !self.version_recorded
    }
}

/// A record the runner skipped, with the error kind that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub job_record_id: i64,
    pub kind: String,
    pub reason: String,
}

/// Counters for one run of the data migration.
///
/// `records_processed` counts every record that was not skipped, including
/// records with zero keywords and records left alone by the checkpoint.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub run_id: String,
    pub scorer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaOutcome>,
    pub records_processed: usize,
    pub records_with_zero_keywords: usize,
    pub records_unchanged: usize,
    pub keywords_inserted: usize,
    pub keywords_updated: usize,
    pub keywords_unchanged: usize,
    pub keywords_removed: usize,
    pub skipped: Vec<SkippedRecord>,
    pub interrupted: bool,
    pub duration_ms: u64,
}

impl MigrationReport {
    pub fn records_skipped(&self) -> usize {
        self.skipped.len()
    }

    pub fn keywords_written(&self) -> usize {
        self.keywords_inserted + self.keywords_updated
    }
}

/// What a rollback removed, plus the optional legacy-format export.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    pub indexes_dropped: Vec<String>,
    pub keyword_table_dropped: bool,
    pub source_state_dropped: bool,
    pub version_removed: bool,
    pub keyword_rows_discarded: i64,
    /// job_record_id → delimiter-joined keyword text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<BTreeMap<i64, String>>,
}

/// Print a migration report to stdout.
pub fn print_report(report: &MigrationReport) {
    println!("=== Keyword Migration Report ===");
    println!();
    println!("Run id:             {}", report.run_id);
    println!("Scorer:             {}", report.scorer);
    if let Some(schema) = &report.schema {
        if schema.was_noop() {
            println!("Schema:             already applied");
        } else {
            println!(
                "Schema:             table {}, {} index(es) created",
                if schema.created_keyword_table { "created" } else { "present" },
                schema.created_indexes.len()
            );
        }
    }
    println!("Records processed:  {}", report.records_processed);
    println!("  zero keywords:    {}", report.records_with_zero_keywords);
    println!("  unchanged source: {}", report.records_unchanged);
    println!("Records skipped:    {}", report.records_skipped());
    println!("Keywords inserted:  {}", report.keywords_inserted);
    println!("Keywords updated:   {}", report.keywords_updated);
    println!("Keywords unchanged: {}", report.keywords_unchanged);
    println!("Keywords removed:   {}", report.keywords_removed);
    println!("Duration:           {}ms", report.duration_ms);

    if !report.skipped.is_empty() {
        println!();
        println!("Skipped records:");
        for s in &report.skipped {
            println!("  - #{} [{}] {}", s.job_record_id, s.kind, s.reason);
        }
    }

    println!();
    if report.interrupted {
        println!("Status: INTERRUPTED (re-run to resume)");
    } else {
        println!("Status: COMPLETE");
    }
}

/// Print a rollback report to stdout.
pub fn print_rollback_report(report: &RollbackReport) {
    println!("=== Keyword Rollback Report ===");
    println!();
    println!("Indexes dropped:    {}", report.indexes_dropped.len());
    for name in &report.indexes_dropped {
        println!("  - {}", name);
    }
    println!(
        "Keyword table:      {}",
        if report.keyword_table_dropped { "dropped" } else { "not present" }
    );
    println!("Rows discarded:     {}", report.keyword_rows_discarded);
    println!("Version removed:    {}", if report.version_removed { "yes" } else { "no" });
    if let Some(export) = &report.export {
        println!("Records exported:   {}", export.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_outcome_noop() {
        assert!(SchemaOutcome::default().was_noop());
        let created = SchemaOutcome {
            created_keyword_table: true,
            ..Default::default()
        };
        assert!(!created.was_noop());
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = MigrationReport {
            keywords_inserted: 3,
            keywords_updated: 1,
            skipped: vec![SkippedRecord {
                job_record_id: 7,
                kind: "malformed_input".into(),
                reason: "too long".into(),
            }],
            ..Default::default()
        };
        assert_eq!(report.keywords_written(), 4);
        assert_eq!(report.records_skipped(), 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["keywordsInserted"], 3);
        assert_eq!(json["skipped"][0]["jobRecordId"], 7);
        assert!(json.get("schema").is_none());
    }
}
