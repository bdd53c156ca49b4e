//! Feedback records and the per-record analysis result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Sentiment polarity persisted on a feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }

    /// Parse a stored label. Unknown values (including `neutral-pending`) yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(SentimentLabel::Positive),
            "neutral" => Some(SentimentLabel::Neutral),
            "negative" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which strategy produced an [`AnalysisResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Method {
    #[serde(rename = "indonesian-keywords")]
    IndonesianKeywords,
    #[serde(rename = "english-keywords")]
    EnglishKeywords,
    #[serde(rename = "indonesian-enhanced")]
    IndonesianEnhanced,
    #[serde(rename = "english-enhanced")]
    EnglishEnhanced,
    #[serde(rename = "FallbackKeywords")]
    FallbackKeywords,
    #[serde(rename = "rating-proxy")]
    RatingProxy,
    #[serde(rename = "default-neutral")]
    DefaultNeutral,
    #[serde(rename = "error-fallback")]
    ErrorFallback,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::IndonesianKeywords => "indonesian-keywords",
            Method::EnglishKeywords => "english-keywords",
            Method::IndonesianEnhanced => "indonesian-enhanced",
            Method::EnglishEnhanced => "english-enhanced",
            Method::FallbackKeywords => "FallbackKeywords",
            Method::RatingProxy => "rating-proxy",
            Method::DefaultNeutral => "default-neutral",
            Method::ErrorFallback => "error-fallback",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feedback row as the engine sees it. Only the sentiment fields are ever written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackRecord {
    pub id: String,
    pub text: Option<String>,
    /// Star rating, nominally 1-5.
    pub rating: Option<i32>,
    /// Raw stored label. `None` or `neutral-pending` means the record still needs analysis.
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
    pub last_analyzed_at: Option<DateTime<Utc>>,
}

impl FeedbackRecord {
    /// Null, empty, or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

/// Transient output of the record analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResult {
    pub label: SentimentLabel,
    /// Always in [-1, 1]; neutral results carry exactly 0.
    pub score: f64,
    /// `id`, `other`, or `unknown` for records that were never language-routed.
    pub language: String,
    pub method: Method,
}

impl AnalysisResult {
    pub fn neutral(language: &str, method: Method) -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
            language: language.to_string(),
            method,
        }
    }

    /// True when the analyzer could not classify the record at all.
    pub fn is_error(&self) -> bool {
        self.method == Method::ErrorFallback
    }

    pub fn to_update(&self, analyzed_at: DateTime<Utc>) -> SentimentUpdate {
        SentimentUpdate {
            label: self.label,
            score: self.score,
            analyzed_at,
        }
    }
}

/// Fields written back to the store for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentUpdate {
    pub label: SentimentLabel,
    pub score: f64,
    pub analyzed_at: DateTime<Utc>,
}
