//! Keyweave Extract: turns a legacy `keywords_text` value into scored keywords.
//!
//! Parser → Aggregator → Scorer, plus a lookup-based category classifier.
//! Everything here is pure; storage lives in `keyweave-store`.

pub mod aggregate;
pub mod categories;
pub mod parser;
pub mod pipeline;
pub mod scoring;

pub use aggregate::{normalize_keyword, AggregatedKeywords, KeywordTally};
pub use categories::{classify_keyword, Category};
pub use parser::{detect_format, FormatHint, KeywordParser, ParsedKeywords, SourceFormat};
pub use pipeline::{ExtractedKeywords, KeywordExtractor, ScoredKeyword};
pub use scoring::{
    scorer_for, FrequencyPositionScorer, FrequencyScorer, ImportanceScorer, ScoreSignal,
    UniformScorer, DEFAULT_IMPORTANCE,
};
