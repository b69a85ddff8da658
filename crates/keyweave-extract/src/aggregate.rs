//! Per-record keyword aggregation.
//!
//! Tokens are normalized (trim, collapse inner whitespace, lowercase) and
//! merged, keeping the occurrence count and the index where each keyword was
//! first seen. Storage is a `BTreeMap`, so iteration order never depends on
//! hashing.

use std::collections::BTreeMap;

use serde::Serialize;

/// Canonical form of a keyword: trimmed, single-spaced, lowercase.
pub fn normalize_keyword(token: &str) -> String {
    token
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Occurrence data for one normalized keyword within one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordTally {
    pub text: String,
    pub frequency: u32,
    /// Index (among non-empty tokens) of the first occurrence.
    pub first_position: usize,
}

/// All keywords of one record, keyed by normalized text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedKeywords {
    entries: BTreeMap<String, KeywordTally>,
    total_tokens: usize,
}

impl AggregatedKeywords {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: BTreeMap<String, KeywordTally> = BTreeMap::new();
        let mut position = 0usize;

        for token in tokens {
            let text = normalize_keyword(token.as_ref());
            if text.is_empty() {
                continue;
            }
            entries
                .entry(text)
                .and_modify(|tally| tally.frequency += 1)
                .or_insert_with_key(|key| KeywordTally {
                    text: key.clone(),
                    frequency: 1,
                    first_position: position,
                });
            position += 1;
        }

        Self {
            entries,
            total_tokens: position,
        }
    }

    /// Number of distinct keywords.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of non-empty tokens that went in.
    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    /// Sum of frequencies; always equals `total_tokens`.
    pub fn total_frequency(&self) -> u64 {
        self.entries.values().map(|t| u64::from(t.frequency)).sum()
    }

    pub fn get(&self, text: &str) -> Option<&KeywordTally> {
        self.entries.get(text)
    }

    /// Tallies in lexicographic order of normalized text.
    pub fn iter(&self) -> impl Iterator<Item = &KeywordTally> {
        self.entries.values()
    }

    /// Tallies in first-seen order.
    pub fn in_discovery_order(&self) -> Vec<&KeywordTally> {
        let mut tallies: Vec<&KeywordTally> = self.entries.values().collect();
        tallies.sort_by_key(|t| t.first_position);
        tallies
    }
}
