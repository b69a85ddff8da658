//! Parser → Aggregator → Scorer for a single legacy value.

use serde::Serialize;

use keyweave_core::{KeyweaveConfig, Result};

use crate::aggregate::AggregatedKeywords;
use crate::categories::{classify_keyword, Category};
use crate::parser::{FormatHint, KeywordParser, SourceFormat};
use crate::scoring::{scorer_for, ImportanceScorer, ScoreSignal};

/// One normalized keyword, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredKeyword {
    pub text: String,
    pub frequency: u32,
    pub importance_score: f64,
    pub category: Option<Category>,
    pub first_position: usize,
}

/// Everything extracted from one record's keyword text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedKeywords {
    /// Keywords in first-seen order.
    pub keywords: Vec<ScoredKeyword>,
    pub token_count: usize,
    pub format: SourceFormat,
    pub fell_back: bool,
}

impl ExtractedKeywords {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

pub struct KeywordExtractor {
    parser: KeywordParser,
    scorer: Box<dyn ImportanceScorer>,
    hint: FormatHint,
}

impl KeywordExtractor {
    pub fn new(parser: KeywordParser, scorer: Box<dyn ImportanceScorer>) -> Self {
        Self {
            parser,
            scorer,
            hint: FormatHint::Auto,
        }
    }

    pub fn from_config(config: &KeyweaveConfig) -> Self {
        Self::new(
            KeywordParser::new(config.max_keyword_len),
            scorer_for(config.scorer, config.position_weight),
        )
    }

    /// Force a source format instead of detecting it per value.
    pub fn with_hint(mut self, hint: FormatHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    /// Settings that determine the extracted rows: scorer and its
    /// parameters, keyword length limit and format hint.
    pub fn fingerprint(&self) -> String {
        format!(
            "{};max_len={};hint={:?}",
            self.scorer.fingerprint(),
            self.parser.max_keyword_len(),
            self.hint
        )
    }

    pub fn extract(&self, raw: Option<&str>) -> Result<ExtractedKeywords> {
        let parsed = self.parser.parse(raw, self.hint)?;
        let aggregated = AggregatedKeywords::from_tokens(&parsed.tokens);
        let total_tokens = aggregated.total_tokens();

        let keywords = aggregated
            .in_discovery_order()
            .into_iter()
            .map(|tally| ScoredKeyword {
                text: tally.text.clone(),
                frequency: tally.frequency,
                importance_score: self
                    .scorer
                    .score(&ScoreSignal::from_tally(tally, total_tokens)),
                category: classify_keyword(&tally.text),
                first_position: tally.first_position,
            })
            .collect();

        Ok(ExtractedKeywords {
            keywords,
            token_count: total_tokens,
            format: parsed.format,
            fell_back: parsed.fell_back,
        })
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::from_config(&KeyweaveConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::UniformScorer;

    #[test]
    fn test_scenario_duplicate_python() {
        let extracted = KeywordExtractor::default()
            .extract(Some("Python, SQL, Docker, Python"))
            .unwrap();
        let summary: Vec<(&str, u32)> = extracted
            .keywords
            .iter()
            .map(|k| (k.text.as_str(), k.frequency))
            .collect();
        assert_eq!(summary, vec![("python", 2), ("sql", 1), ("docker", 1)]);
        assert_eq!(extracted.token_count, 4);
        assert_eq!(
            extracted.keywords.iter().map(|k| k.frequency).sum::<u32>(),
            4
        );
        assert_eq!(extracted.keywords[0].category, Some(Category::TechnicalSkill));
        assert_eq!(extracted.keywords[2].category, Some(Category::Tool));
        assert!(extracted.keywords[0].importance_score > extracted.keywords[1].importance_score);
    }

    #[test]
    fn test_empty_input() {
        let extracted = KeywordExtractor::default().extract(None).unwrap();
        assert!(extracted.is_empty());
        assert_eq!(extracted.token_count, 0);
    }

    #[test]
    fn test_custom_scorer() {
        let extractor = KeywordExtractor::new(KeywordParser::default(), Box::new(UniformScorer));
        let extracted = extractor.extract(Some("[\"a\", \"a\", \"b\"]")).unwrap();
        assert!(extracted.keywords.iter().all(|k| k.importance_score == 1.0));
        assert_eq!(extracted.format, SourceFormat::StructuredArray);
        assert_eq!(extractor.scorer_name(), "uniform");
    }

    #[test]
    fn test_fingerprint_changes_with_settings() {
        let base = KeywordExtractor::default().fingerprint();
        assert_eq!(base, KeywordExtractor::default().fingerprint());

        let uniform = KeywordExtractor::new(KeywordParser::default(), Box::new(UniformScorer));
        assert_ne!(uniform.fingerprint(), base);

        let short = KeywordExtractor::new(
            KeywordParser::new(10),
            scorer_for(keyweave_core::ScorerKind::FrequencyPosition, 0.5),
        );
        assert_ne!(short.fingerprint(), base);

        let hinted = KeywordExtractor::default().with_hint(FormatHint::Delimited);
        assert_ne!(hinted.fingerprint(), base);
    }
}
