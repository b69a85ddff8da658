//! Read-only analytics over `job_keywords`.
//!
//! Rankings break ties by keyword text (then id) ascending so results are
//! stable across runs. Keyword arguments are expected in normalized form.

use std::collections::BTreeSet;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

use crate::sqlite::{json_list_param, row_to_keyword};
use crate::types::Keyword;
use keyweave_core::{Error, Result};

/// Summed frequency of one keyword across records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordFrequency {
    pub text: String,
    pub total_frequency: i64,
    pub record_count: i64,
}

/// Importance of one keyword across a record subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordImportance {
    pub text: String,
    pub total_importance: f64,
    pub max_importance: f64,
    pub record_count: i64,
}

/// A record and how many of the requested keywords it carries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordMatch {
    pub job_record_id: i64,
    pub matched_keywords: i64,
    pub matched_importance: f64,
}

/// Unordered keyword pair, stored with `keyword_a < keyword_b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoOccurrence {
    pub keyword_a: String,
    pub keyword_b: String,
    pub record_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    /// `None` groups uncategorized keywords.
    pub category: Option<String>,
    pub distinct_keywords: i64,
    pub total_frequency: i64,
    pub record_count: i64,
}

/// Which records a query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope<'a> {
    All,
    Records(&'a [i64]),
}

impl RecordScope<'_> {
    fn is_empty_subset(&self) -> bool {
        matches!(self, RecordScope::Records(ids) if ids.is_empty())
    }

    /// `AND <column> IN (...)` clause. The ids travel as one JSON parameter
    /// appended to `values`, so subsets of any size bind.
    fn clause(&self, column: &str, values: &mut Vec<Value>) -> Result<String> {
        match self {
            RecordScope::All => Ok(String::new()),
            RecordScope::Records(ids) => {
                values.push(json_list_param(*ids)?);
                Ok(format!(
                    " AND {} IN (SELECT value FROM json_each(?{}))",
                    column,
                    values.len()
                ))
            }
        }
    }
}

/// Top-N keywords by summed frequency, optionally within one category.
pub fn top_keywords_by_frequency(
    conn: &Connection,
    limit: usize,
    category: Option<&str>,
) -> Result<Vec<KeywordFrequency>> {
    let mut values: Vec<Value> = Vec::new();
    let mut sql = String::from(
        "SELECT text, SUM(frequency) AS total, COUNT(*) AS records FROM job_keywords WHERE 1 = 1",
    );
    if let Some(category) = category {
        values.push(Value::Text(category.to_string()));
        sql.push_str(&format!(" AND category = ?{}", values.len()));
    }
    values.push(Value::Integer(limit as i64));
    sql.push_str(&format!(
        " GROUP BY text ORDER BY total DESC, text ASC LIMIT ?{}",
        values.len()
    ));

    let mut stmt = conn.prepare(&sql).map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(KeywordFrequency {
                text: row.get(0)?,
                total_frequency: row.get(1)?,
                record_count: row.get(2)?,
            })
        })
        .map_err(|e| Error::Database(e.to_string()))?;
    collect(rows)
}

/// Top-N keywords by summed importance over a record subset.
pub fn top_keywords_by_importance(
    conn: &Connection,
    scope: RecordScope<'_>,
    limit: usize,
) -> Result<Vec<KeywordImportance>> {
    if scope.is_empty_subset() {
        return Ok(Vec::new());
    }
    let mut values: Vec<Value> = Vec::new();
    let scope_sql = scope.clause("job_record_id", &mut values)?;
    values.push(Value::Integer(limit as i64));
    let sql = format!(
        "SELECT text, SUM(importance_score) AS total, MAX(importance_score), COUNT(*) \
         FROM job_keywords WHERE 1 = 1{} \
         GROUP BY text ORDER BY total DESC, text ASC LIMIT ?{}",
        scope_sql,
        values.len()
    );

    let mut stmt = conn.prepare(&sql).map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(KeywordImportance {
                text: row.get(0)?,
                total_importance: row.get(1)?,
                max_importance: row.get(2)?,
                record_count: row.get(3)?,
            })
        })
        .map_err(|e| Error::Database(e.to_string()))?;
    collect(rows)
}

/// Top-N keywords of one record by importance.
pub fn top_keywords_for_record(
    conn: &Connection,
    job_record_id: i64,
    limit: usize,
) -> Result<Vec<Keyword>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT * FROM job_keywords WHERE job_record_id = ?1 \
             ORDER BY importance_score DESC, text ASC LIMIT ?2",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params![job_record_id, limit as i64], row_to_keyword)
        .map_err(|e| Error::Database(e.to_string()))?;
    collect(rows)
}

/// Top-N keyword rows within one category by importance.
pub fn top_keywords_in_category(
    conn: &Connection,
    category: &str,
    limit: usize,
) -> Result<Vec<Keyword>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT * FROM job_keywords WHERE category = ?1 \
             ORDER BY importance_score DESC, text ASC, id ASC LIMIT ?2",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params![category, limit as i64], row_to_keyword)
        .map_err(|e| Error::Database(e.to_string()))?;
    collect(rows)
}

/// Records ranked by how many of `keywords` they contain.
///
/// Duplicate keywords in the input count once.
pub fn rank_records_by_keywords<S: AsRef<str>>(
    conn: &Connection,
    keywords: &[S],
    limit: usize,
) -> Result<Vec<RecordMatch>> {
    let wanted: BTreeSet<&str> = keywords
        .iter()
        .map(|k| k.as_ref())
        .filter(|k| !k.is_empty())
        .collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let wanted: Vec<&str> = wanted.into_iter().collect();
    let mut stmt = conn
        .prepare_cached(
            "SELECT job_record_id, COUNT(*) AS matched, SUM(importance_score) AS weight \
             FROM job_keywords WHERE text IN (SELECT value FROM json_each(?1)) \
             GROUP BY job_record_id \
             ORDER BY matched DESC, weight DESC, job_record_id ASC LIMIT ?2",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params![json_list_param(wanted.as_slice())?, limit as i64], |row| {
            Ok(RecordMatch {
                job_record_id: row.get(0)?,
                matched_keywords: row.get(1)?,
                matched_importance: row.get(2)?,
            })
        })
        .map_err(|e| Error::Database(e.to_string()))?;
    collect(rows)
}

/// Keyword pairs appearing on the same record, each unordered pair once.
pub fn keyword_co_occurrence(
    conn: &Connection,
    scope: RecordScope<'_>,
    min_count: i64,
    limit: usize,
) -> Result<Vec<CoOccurrence>> {
    if scope.is_empty_subset() {
        return Ok(Vec::new());
    }
    let mut values: Vec<Value> = Vec::new();
    let scope_sql = scope.clause("a.job_record_id", &mut values)?;
    values.push(Value::Integer(min_count));
    let min_param = values.len();
    values.push(Value::Integer(limit as i64));
    let sql = format!(
        "SELECT a.text, b.text, COUNT(*) AS together \
         FROM job_keywords a \
         JOIN job_keywords b ON a.job_record_id = b.job_record_id AND a.text < b.text \
         WHERE 1 = 1{} \
         GROUP BY a.text, b.text \
         HAVING COUNT(*) >= ?{} \
         ORDER BY together DESC, a.text ASC, b.text ASC LIMIT ?{}",
        scope_sql,
        min_param,
        values.len()
    );

    let mut stmt = conn.prepare(&sql).map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(CoOccurrence {
                keyword_a: row.get(0)?,
                keyword_b: row.get(1)?,
                record_count: row.get(2)?,
            })
        })
        .map_err(|e| Error::Database(e.to_string()))?;
    collect(rows)
}

/// Number of records carrying both keywords; argument order does not matter.
pub fn co_occurrence_count(conn: &Connection, first: &str, second: &str) -> Result<i64> {
    if first == second {
        return conn
            .query_row(
                "SELECT COUNT(*) FROM job_keywords WHERE text = ?1",
                params![first],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()));
    }
    let (a, b) = if first < second { (first, second) } else { (second, first) };
    conn.query_row(
        "SELECT COUNT(*) FROM job_keywords a \
         JOIN job_keywords b ON a.job_record_id = b.job_record_id \
         WHERE a.text = ?1 AND b.text = ?2",
        params![a, b],
        |row| row.get(0),
    )
    .map_err(|e| Error::Database(e.to_string()))
}

/// Per-category totals; uncategorized keywords last.
pub fn category_rollup(conn: &Connection) -> Result<Vec<CategorySummary>> {
    let mut stmt = conn
        .prepare(
            "SELECT category, COUNT(DISTINCT text), SUM(frequency), COUNT(DISTINCT job_record_id) \
             FROM job_keywords GROUP BY category \
             ORDER BY category IS NULL, category ASC",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CategorySummary {
                category: row.get(0)?,
                distinct_keywords: row.get(1)?,
                total_frequency: row.get(2)?,
                record_count: row.get(3)?,
            })
        })
        .map_err(|e| Error::Database(e.to_string()))?;
    collect(rows)
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{KEYWORD_TABLE_SQL, LEGACY_SCHEMA_SQL};
    use crate::sqlite::upsert_keyword;
    use crate::types::KeywordValues;
    use crate::KeywordStore;

    /// Three jobs:
    ///   1: rust(3), sql(1), docker(1)
    ///   2: rust(1), docker(2)
    ///   3: sql(1), leadership(1)
    fn fixture() -> KeywordStore {
        let store = KeywordStore::open_in_memory().unwrap();
        {
            let conn = store.session();
            conn.execute_batch(LEGACY_SCHEMA_SQL).unwrap();
            conn.execute_batch(KEYWORD_TABLE_SQL).unwrap();
        }
        let rows: &[&[(&str, i64, f64, Option<&str>)]] = &[
            &[
                ("rust", 3, 4.5, Some("technical_skill")),
                ("sql", 1, 1.3, Some("technical_skill")),
                ("docker", 1, 1.1, Some("tool")),
            ],
            &[("rust", 1, 1.5, Some("technical_skill")), ("docker", 2, 2.5, Some("tool"))],
            &[("sql", 1, 1.5, Some("technical_skill")), ("leadership", 1, 1.2, None)],
        ];
        for keywords in rows {
            let job = store.add_job_record(None, None).unwrap();
            let conn = store.session();
            for (text, frequency, score, category) in keywords.iter() {
                upsert_keyword(
                    &conn,
                    job,
                    &KeywordValues {
                        text,
                        frequency: *frequency,
                        importance_score: *score,
                        category: *category,
                    },
                    0,
                )
                .unwrap();
            }
        }
        store
    }

    #[test]
    fn test_frequency_ranking() {
        let store = fixture();
        let top = top_keywords_by_frequency(&store.session(), 10, None).unwrap();
        let names: Vec<(&str, i64)> = top.iter().map(|k| (k.text.as_str(), k.total_frequency)).collect();
        assert_eq!(names, vec![("rust", 4), ("docker", 3), ("sql", 2), ("leadership", 1)]);
        assert_eq!(top[0].record_count, 2);

        let tools = top_keywords_by_frequency(&store.session(), 10, Some("tool")).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].text, "docker");
    }

    #[test]
    fn test_importance_ranking_scoped() {
        let store = fixture();
        let conn = store.session();
        let scoped = top_keywords_by_importance(&conn, RecordScope::Records(&[2, 3]), 2).unwrap();
        assert_eq!(scoped[0].text, "docker");
        assert_eq!(scoped[1].text, "rust");
        assert!(top_keywords_by_importance(&conn, RecordScope::Records(&[]), 5)
            .unwrap()
            .is_empty());
        let all = top_keywords_by_importance(&conn, RecordScope::All, 1).unwrap();
        assert_eq!(all[0].text, "rust");
        assert!((all[0].total_importance - 6.0).abs() < 1e-9);
        assert!((all[0].max_importance - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_per_record_and_category_top_n() {
        let store = fixture();
        let conn = store.session();
        let top = top_keywords_for_record(&conn, 1, 2).unwrap();
        assert_eq!(top.iter().map(|k| k.text.as_str()).collect::<Vec<_>>(), vec!["rust", "sql"]);

        let skills = top_keywords_in_category(&conn, "technical_skill", 10).unwrap();
        assert_eq!(skills.len(), 4);
        assert_eq!(skills[0].text, "rust");
        assert!(skills.windows(2).all(|w| w[0].importance_score >= w[1].importance_score));
    }

    #[test]
    fn test_rank_records_by_keyword_set() {
        let store = fixture();
        let ranked = rank_records_by_keywords(
            &store.session(),
            &["rust", "docker", "sql", "rust"],
            10,
        )
        .unwrap();
        let ids: Vec<(i64, i64)> = ranked.iter().map(|r| (r.job_record_id, r.matched_keywords)).collect();
        assert_eq!(ids, vec![(1, 3), (2, 2), (3, 1)]);

        let none: &[&str] = &[];
        assert!(rank_records_by_keywords(&store.session(), none, 10).unwrap().is_empty());
    }

    #[test]
    fn test_co_occurrence_canonical_pairs() {
        let store = fixture();
        let conn = store.session();
        let pairs = keyword_co_occurrence(&conn, RecordScope::All, 1, 100).unwrap();
        assert!(pairs.iter().all(|p| p.keyword_a < p.keyword_b));
        assert_eq!(
            pairs[0],
            CoOccurrence {
                keyword_a: "docker".into(),
                keyword_b: "rust".into(),
                record_count: 2,
            }
        );
        // 3 pairs from job 1, 1 from job 2 (duplicate of docker/rust), 1 from job 3
        assert_eq!(pairs.len(), 4);

        assert_eq!(co_occurrence_count(&conn, "rust", "docker").unwrap(), 2);
        assert_eq!(co_occurrence_count(&conn, "docker", "rust").unwrap(), 2);
        assert_eq!(co_occurrence_count(&conn, "sql", "leadership").unwrap(), 1);

        let frequent = keyword_co_occurrence(&conn, RecordScope::All, 2, 100).unwrap();
        assert_eq!(frequent.len(), 1);

        let scoped = keyword_co_occurrence(&conn, RecordScope::Records(&[3]), 1, 100).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].keyword_a, "leadership");
    }

    #[test]
    fn test_large_subsets_bind_as_one_parameter() {
        let store = fixture();
        let conn = store.session();
        let ids: Vec<i64> = (1..=40_000).collect();

        let scoped = top_keywords_by_importance(&conn, RecordScope::Records(&ids), 5).unwrap();
        let all = top_keywords_by_importance(&conn, RecordScope::All, 5).unwrap();
        assert_eq!(scoped, all);
        let pairs = keyword_co_occurrence(&conn, RecordScope::Records(&ids), 1, 100).unwrap();
        assert_eq!(pairs.len(), 4);

        let mut keywords: Vec<String> = (0..40_000).map(|i| format!("unused{}", i)).collect();
        keywords.push("docker".into());
        let ranked = rank_records_by_keywords(&conn, keywords.as_slice(), 10).unwrap();
        assert_eq!(ranked.iter().map(|r| r.job_record_id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_category_rollup() {
        let store = fixture();
        let rollup = category_rollup(&store.session()).unwrap();
        let cats: Vec<Option<&str>> = rollup.iter().map(|c| c.category.as_deref()).collect();
        assert_eq!(cats, vec![Some("technical_skill"), Some("tool"), None]);
        assert_eq!(rollup[0].distinct_keywords, 2);
        assert_eq!(rollup[0].total_frequency, 6);
        assert_eq!(rollup[0].record_count, 3);
    }
}
