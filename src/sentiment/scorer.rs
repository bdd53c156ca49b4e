//! Scoring strategies and the threshold rule that turns a score into a label.

use crate::error::AnalysisError;
use crate::models::{Method, SentimentLabel};
use crate::sentiment::keywords::{KeywordTable, ENGLISH, GENERIC, INDONESIAN};
use std::fmt;

/// Raw output of a scorer, before the analyzer normalizes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub label: SentimentLabel,
    pub score: f64,
}

/// A text scoring strategy. Implementations are swapped per language and per
/// fidelity level behind this one operation.
pub trait Scorer: Send + Sync {
    /// Tag recorded on results this scorer produces.
    fn method(&self) -> Method;

    fn score(&self, text: &str, threshold: f64) -> Result<Score, AnalysisError>;
}

impl fmt::Debug for dyn Scorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scorer({})", self.method())
    }
}

/// `score > threshold` is positive, `score < -threshold` negative, anything in between neutral.
pub fn label_for(score: f64, threshold: f64) -> SentimentLabel {
    if score > threshold {
        SentimentLabel::Positive
    } else if score < -threshold {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Keyword-count scorer: `(pos - neg) / (pos + neg + neu)`.
#[derive(Debug, Clone)]
pub struct KeywordScorer {
    table: &'static KeywordTable,
    method: Method,
    max_chars: Option<usize>,
}

impl KeywordScorer {
    pub fn new(table: &'static KeywordTable, method: Method) -> Self {
        Self {
            table,
            method,
            max_chars: None,
        }
    }

    pub fn indonesian() -> Self {
        Self::new(&INDONESIAN, Method::IndonesianKeywords)
    }

    pub fn english() -> Self {
        Self::new(&ENGLISH, Method::EnglishKeywords)
    }

    /// Lower-fidelity cross-language scorer used as the analyzer's fallback. No length limit.
    pub fn generic() -> Self {
        Self::new(&GENERIC, Method::FallbackKeywords)
    }

    /// Reject texts longer than `max` characters.
    pub fn with_max_chars(mut self, max: usize) -> Self {
        self.max_chars = Some(max);
        self
    }
}

impl Scorer for KeywordScorer {
    fn method(&self) -> Method {
        self.method
    }

    fn score(&self, text: &str, threshold: f64) -> Result<Score, AnalysisError> {
        if let Some(max) = self.max_chars {
            let len = text.chars().count();
            if len > max {
                return Err(AnalysisError::TextTooLong { len, max });
            }
        }

        let counts = self.table.count(&text.to_lowercase());
        let total = counts.total();
        let score = if total > 0 {
            (counts.positive as f64 - counts.negative as f64) / total as f64
        } else {
            0.0
        };

        Ok(Score {
            label: label_for(score, threshold),
            score,
        })
    }
}
