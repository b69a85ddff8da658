//! Row types for job records and their normalized keywords.

use serde::{Deserialize, Serialize};

/// A legacy job description row, reduced to what the migration reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords_text: Option<String>,
}

/// A `job_keywords` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub job_record_id: i64,
    pub text: String,
    pub frequency: i64,
    pub importance_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: i64,
}

/// Values written for one keyword of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordValues<'a> {
    pub text: &'a str,
    pub frequency: i64,
    pub importance_score: f64,
    pub category: Option<&'a str>,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Store-level statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordStats {
    pub job_records: i64,
    pub records_with_keywords: i64,
    pub keyword_rows: i64,
    pub distinct_keywords: i64,
    pub total_frequency: i64,
    pub categorized_rows: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}
