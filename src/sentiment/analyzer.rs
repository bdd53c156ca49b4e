//! Per-record orchestration: blank policy, language routing, fallback.
//!
//! [`RecordAnalyzer::analyze`] never fails and never panics past its boundary;
//! the worst case is an `error-fallback` result the caller counts as an error.

use crate::config::{AnalyzerKind, RecalcConfig};
use crate::error::AnalysisError;
use crate::models::{AnalysisResult, FeedbackRecord, Method, SentimentLabel};
use crate::sentiment::blank::{round_score, BlankInputPolicy, UNKNOWN_LANGUAGE};
use crate::sentiment::enhanced::EnhancedScorer;
use crate::sentiment::language::{Language, LanguageRouter};
use crate::sentiment::scorer::{label_for, KeywordScorer, Score, Scorer};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RecordAnalyzer {
    router: LanguageRouter,
    fallback: Arc<dyn Scorer>,
    threshold: f64,
}

impl Default for RecordAnalyzer {
    fn default() -> Self {
        Self::from_config(&RecalcConfig::default())
    }
}

impl RecordAnalyzer {
    pub fn new(router: LanguageRouter, fallback: Arc<dyn Scorer>, threshold: f64) -> Self {
        Self {
            router,
            fallback,
            threshold,
        }
    }

    /// Keyword scorers for Indonesian and English, generic keywords as fallback.
    pub fn keywords(threshold: f64, max_chars: usize) -> Self {
        let router = LanguageRouter::new()
            .with_scorer(
                Language::Indonesian,
                Arc::new(KeywordScorer::indonesian().with_max_chars(max_chars)),
            )
            .with_scorer(
                Language::Other,
                Arc::new(KeywordScorer::english().with_max_chars(max_chars)),
            );
        Self::new(router, Arc::new(KeywordScorer::generic()), threshold)
    }

    /// Negation-aware scorers, generic keywords as fallback.
    pub fn enhanced(threshold: f64, max_chars: usize) -> Self {
        let router = LanguageRouter::new()
            .with_scorer(
                Language::Indonesian,
                Arc::new(EnhancedScorer::indonesian().with_max_chars(max_chars)),
            )
            .with_scorer(
                Language::Other,
                Arc::new(EnhancedScorer::english().with_max_chars(max_chars)),
            );
        Self::new(router, Arc::new(KeywordScorer::generic()), threshold)
    }

    pub fn from_config(config: &RecalcConfig) -> Self {
        match config.analyzer {
            AnalyzerKind::Keywords => Self::keywords(config.threshold, config.max_text_chars),
            AnalyzerKind::Enhanced => Self::enhanced(config.threshold, config.max_text_chars),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn analyze(&self, record: &FeedbackRecord) -> AnalysisResult {
        self.analyze_text(record.text.as_deref(), record.rating)
    }

    pub fn analyze_text(&self, text: Option<&str>, rating: Option<i32>) -> AnalysisResult {
        let text = match text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t,
            None => return BlankInputPolicy::classify(rating.map(f64::from)),
        };

        let language = self.router.detect(text);
        let primary = match self.router.scorer_for(language) {
            Some(scorer) => run_guarded(scorer.as_ref(), text, self.threshold)
                .map(|score| (score, scorer.method())),
            None => Err(AnalysisError::NoScorer(language.code().to_string())),
        };

        match primary {
            Ok((score, method)) => normalize(score, language.code(), method),
            Err(err) => {
                warn!("⚠️ Primary scorer failed ({}), falling back to generic keywords", err);
                match run_guarded(self.fallback.as_ref(), text, self.threshold) {
                    Ok(score) => normalize(score, language.code(), self.fallback.method()),
                    Err(err) => {
                        warn!("🔥 Fallback scorer failed too: {}", err);
                        AnalysisResult::neutral(UNKNOWN_LANGUAGE, Method::ErrorFallback)
                    }
                }
            }
        }
    }
}

/// Run a scorer, turning panics and non-finite scores into errors.
fn run_guarded(scorer: &dyn Scorer, text: &str, threshold: f64) -> Result<Score, AnalysisError> {
    let score = panic::catch_unwind(AssertUnwindSafe(|| scorer.score(text, threshold)))
        .unwrap_or_else(|_| Err(AnalysisError::Internal(format!("{} panicked", scorer.method()))))?;
    if !score.score.is_finite() {
        return Err(AnalysisError::Internal(format!(
            "{} produced a non-finite score",
            scorer.method()
        )));
    }
    Ok(score)
}

/// Clamp into [-1, 1] and make label and sign agree; neutral carries exactly 0.
fn normalize(score: Score, language: &str, method: Method) -> AnalysisResult {
    let mut value = round_score(score.score.clamp(-1.0, 1.0));
    let mut label = score.label;

    let disagrees = match label {
        SentimentLabel::Positive => value <= 0.0,
        SentimentLabel::Negative => value >= 0.0,
        SentimentLabel::Neutral => false,
    };
    if disagrees {
        label = label_for(value, 0.0);
    }
    if label == SentimentLabel::Neutral {
        value = 0.0;
    }

    AnalysisResult {
        label,
        score: value,
        language: language.to_string(),
        method,
    }
}
