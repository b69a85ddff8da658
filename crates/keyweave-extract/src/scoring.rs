//! Importance scoring: pluggable, trait-based.
//!
//! Every scorer must be deterministic, non-decreasing in frequency, and return
//! a strictly positive finite value. [`ImportanceScorer::score`] enforces the
//! last part by falling back to [`DEFAULT_IMPORTANCE`].
//!
//! Default rule (`frequency-position`):
//!
//! ```text
//! score = frequency × (1 + w × (1 − p / n))
//! ```
//!
//! where `p` is the first-seen index, `n` the record's token count and `w`
//! the position weight. With `n = 0` the score is the frequency alone.

use keyweave_core::ScorerKind;

use crate::aggregate::KeywordTally;

/// Score used when no signal is available, and the column default.
pub const DEFAULT_IMPORTANCE: f64 = 1.0;

/// Inputs to a scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSignal {
    pub frequency: u32,
    pub first_position: usize,
    pub total_tokens: usize,
}

impl ScoreSignal {
    pub fn from_tally(tally: &KeywordTally, total_tokens: usize) -> Self {
        Self {
            frequency: tally.frequency,
            first_position: tally.first_position,
            total_tokens,
        }
    }
}

pub trait ImportanceScorer: Send + Sync {
    /// Stable identifier, logged with each run.
    fn name(&self) -> &'static str;

    /// Name plus any parameters that change scores. Two scorers with the
    /// same fingerprint score every signal identically.
    fn fingerprint(&self) -> String {
        self.name().to_string()
    }

    /// The rule itself. May return anything; callers use [`Self::score`].
    fn raw_score(&self, signal: &ScoreSignal) -> f64;

    /// Rule output clamped to the strictly-positive finite range.
    fn score(&self, signal: &ScoreSignal) -> f64 {
        let raw = self.raw_score(signal);
        if raw.is_finite() && raw > 0.0 {
            raw
        } else {
            DEFAULT_IMPORTANCE
        }
    }
}

/// Frequency scaled by a boost for early mentions.
#[derive(Debug, Clone, Copy)]
pub struct FrequencyPositionScorer {
    pub position_weight: f64,
}

impl Default for FrequencyPositionScorer {
    fn default() -> Self {
        Self {
            position_weight: 0.5,
        }
    }
}

impl ImportanceScorer for FrequencyPositionScorer {
    fn name(&self) -> &'static str {
        "frequency-position"
    }

    fn fingerprint(&self) -> String {
        format!("{}:{}", self.name(), self.position_weight)
    }

    fn raw_score(&self, signal: &ScoreSignal) -> f64 {
        let frequency = f64::from(signal.frequency.max(1));
        if signal.total_tokens == 0 {
            return frequency;
        }
        let position = signal.first_position.min(signal.total_tokens - 1) as f64;
        let relative = position / signal.total_tokens as f64;
        frequency * (1.0 + self.position_weight * (1.0 - relative))
    }
}

/// Frequency only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencyScorer;

impl ImportanceScorer for FrequencyScorer {
    fn name(&self) -> &'static str {
        "frequency"
    }

    fn raw_score(&self, signal: &ScoreSignal) -> f64 {
        f64::from(signal.frequency.max(1))
    }
}

/// Constant score; keeps rankings purely frequency-driven downstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformScorer;

impl ImportanceScorer for UniformScorer {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn raw_score(&self, _signal: &ScoreSignal) -> f64 {
        DEFAULT_IMPORTANCE
    }
}

/// Build the scorer a configuration asks for.
pub fn scorer_for(kind: ScorerKind, position_weight: f64) -> Box<dyn ImportanceScorer> {
    match kind {
        ScorerKind::FrequencyPosition => Box::new(FrequencyPositionScorer { position_weight }),
        ScorerKind::Frequency => Box::new(FrequencyScorer),
        ScorerKind::Uniform => Box::new(UniformScorer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(frequency: u32, first_position: usize, total_tokens: usize) -> ScoreSignal {
        ScoreSignal {
            frequency,
            first_position,
            total_tokens,
        }
    }

    #[test]
    fn test_default_formula() {
        let scorer = FrequencyPositionScorer::default();
        // First of four tokens, seen twice: 2 × (1 + 0.5 × 1)
        assert!((scorer.score(&signal(2, 0, 4)) - 3.0).abs() < 1e-12);
        // Third of four, once: 1 × (1 + 0.5 × 0.5)
        assert!((scorer.score(&signal(1, 2, 4)) - 1.25).abs() < 1e-12);
        // No signal
        assert!((scorer.score(&signal(1, 0, 0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_monotonic_in_frequency() {
        let scorer = FrequencyPositionScorer::default();
        for position in 0..10 {
            let mut previous = 0.0;
            for frequency in 1..20 {
                let s = scorer.score(&signal(frequency, position, 30));
                assert!(s >= previous);
                previous = s;
            }
        }
    }

    #[test]
    fn test_earlier_scores_at_least_as_high() {
        let scorer = FrequencyPositionScorer::default();
        for position in 0..9 {
            let earlier = scorer.score(&signal(2, position, 10));
            let later = scorer.score(&signal(2, position + 1, 10));
            assert!(earlier >= later);
        }
    }

    #[test]
    fn test_always_positive_and_finite() {
        let scorers: Vec<Box<dyn ImportanceScorer>> = vec![
            scorer_for(ScorerKind::FrequencyPosition, 0.0),
            scorer_for(ScorerKind::FrequencyPosition, 1e308),
            scorer_for(ScorerKind::Frequency, 0.5),
            scorer_for(ScorerKind::Uniform, 0.5),
        ];
        for scorer in &scorers {
            for s in [signal(0, 0, 0), signal(u32::MAX, 0, 1), signal(1, 99, 3)] {
                let value = scorer.score(&s);
                assert!(value.is_finite() && value > 0.0, "{} gave {}", scorer.name(), value);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let scorer = FrequencyPositionScorer::default();
        assert_eq!(scorer.score(&signal(3, 1, 7)), scorer.score(&signal(3, 1, 7)));
    }

    #[test]
    fn test_fingerprint_tracks_parameters() {
        let half = scorer_for(ScorerKind::FrequencyPosition, 0.5);
        let full = scorer_for(ScorerKind::FrequencyPosition, 1.0);
        assert_ne!(half.fingerprint(), full.fingerprint());
        assert_eq!(half.fingerprint(), FrequencyPositionScorer::default().fingerprint());
        assert_eq!(
            scorer_for(ScorerKind::Uniform, 0.5).fingerprint(),
            scorer_for(ScorerKind::Uniform, 1.0).fingerprint()
        );
        assert_ne!(
            scorer_for(ScorerKind::Uniform, 0.5).fingerprint(),
            scorer_for(ScorerKind::Frequency, 0.5).fingerprint()
        );
    }

    #[test]
    fn test_scorer_for_names() {
        assert_eq!(scorer_for(ScorerKind::Frequency, 0.5).name(), "frequency");
        assert_eq!(scorer_for(ScorerKind::Uniform, 0.5).name(), "uniform");
        assert_eq!(
            scorer_for(ScorerKind::FrequencyPosition, 0.5).name(),
            "frequency-position"
        );
    }
}
