//! Configuration loaded from the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Which importance scoring rule the runner applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScorerKind {
    /// Frequency scaled by a first-position boost.
    #[default]
    FrequencyPosition,
    /// Frequency only.
    Frequency,
    /// Constant 1.0 for every keyword.
    Uniform,
}

impl FromStr for ScorerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frequency-position" | "frequency_position" => Ok(Self::FrequencyPosition),
            "frequency" => Ok(Self::Frequency),
            "uniform" => Ok(Self::Uniform),
            other => Err(Error::Config(format!("Unknown scorer: {}", other))),
        }
    }
}

impl std::fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FrequencyPosition => write!(f, "frequency-position"),
            Self::Frequency => write!(f, "frequency"),
            Self::Uniform => write!(f, "uniform"),
        }
    }
}

/// Top-level Keyweave configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyweaveConfig {
    /// SQLite database file holding `job_descriptions`.
    pub database_path: PathBuf,
    /// Legacy records loaded per page while streaming.
    pub batch_size: usize,
    /// Longest accepted keyword, in characters.
    pub max_keyword_len: usize,
    /// Importance scoring rule.
    pub scorer: ScorerKind,
    /// Position boost used by the frequency-position scorer.
    pub position_weight: f64,
    /// Delete stored keywords that a fresh parse no longer produces.
    pub prune_stale: bool,
    /// Skip records whose keyword text hash is unchanged since the last run.
    pub skip_unchanged: bool,
    /// Separator used when exporting keywords back to legacy text.
    pub export_separator: String,
}

impl Default for KeyweaveConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/keyweave.db"),
            batch_size: 500,
            max_keyword_len: 100,
            scorer: ScorerKind::default(),
            position_weight: 0.5,
            prune_stale: true,
            skip_unchanged: false,
            export_separator: ", ".to_string(),
        }
    }
}

impl KeyweaveConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            database_path: lookup("KEYWEAVE_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            batch_size: parse_var(&lookup, "KEYWEAVE_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            max_keyword_len: parse_var(&lookup, "KEYWEAVE_MAX_KEYWORD_LEN")?
                .unwrap_or(defaults.max_keyword_len),
            scorer: parse_var(&lookup, "KEYWEAVE_SCORER")?.unwrap_or(defaults.scorer),
            position_weight: parse_var(&lookup, "KEYWEAVE_POSITION_WEIGHT")?
                .unwrap_or(defaults.position_weight),
            prune_stale: parse_flag(&lookup, "KEYWEAVE_PRUNE_STALE")?
                .unwrap_or(defaults.prune_stale),
            skip_unchanged: parse_flag(&lookup, "KEYWEAVE_SKIP_UNCHANGED")?
                .unwrap_or(defaults.skip_unchanged),
            export_separator: lookup("KEYWEAVE_DELIMITER_JOIN")
                .unwrap_or(defaults.export_separator),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.max_keyword_len == 0 {
            return Err(Error::Config("max_keyword_len must be at least 1".into()));
        }
        if !self.position_weight.is_finite() || self.position_weight < 0.0 {
            return Err(Error::Config(format!(
                "position_weight must be a finite non-negative number, got {}",
                self.position_weight
            )));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{} is invalid ({}): {}", key, raw, e))),
        None => Ok(None),
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::Config(format!("{} must be a boolean, got {}", key, raw))),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = KeyweaveConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.max_keyword_len, 100);
        assert_eq!(config.scorer, ScorerKind::FrequencyPosition);
        assert!(config.prune_stale);
        assert!(!config.skip_unchanged);
        assert_eq!(config.export_separator, ", ");
    }

    #[test]
    fn test_overrides() {
        let config = KeyweaveConfig::from_lookup(lookup_from(&[
            ("KEYWEAVE_DB", "/tmp/jobs.db"),
            ("KEYWEAVE_BATCH_SIZE", "25"),
            ("KEYWEAVE_SCORER", "uniform"),
            ("KEYWEAVE_SKIP_UNCHANGED", "yes"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/jobs.db"));
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.scorer, ScorerKind::Uniform);
        assert!(config.skip_unchanged);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let result = KeyweaveConfig::from_lookup(lookup_from(&[("KEYWEAVE_BATCH_SIZE", "lots")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_batch_rejected() {
        let result = KeyweaveConfig::from_lookup(lookup_from(&[("KEYWEAVE_BATCH_SIZE", "0")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let result =
            KeyweaveConfig::from_lookup(lookup_from(&[("KEYWEAVE_POSITION_WEIGHT", "-1.5")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_scorer_round_trip_names() {
        for kind in [ScorerKind::FrequencyPosition, ScorerKind::Frequency, ScorerKind::Uniform] {
            assert_eq!(kind.to_string().parse::<ScorerKind>().unwrap(), kind);
        }
        assert!("tfidf".parse::<ScorerKind>().is_err());
    }
}
