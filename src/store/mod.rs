//! Feedback store abstraction.
//!
//! The engine only reads records through filtered, id-ordered pages and writes
//! the sentiment fields back one record at a time.

use crate::config::RecalcScope;
use crate::error::StoreError;
use crate::models::{FeedbackRecord, SentimentUpdate};
use async_trait::async_trait;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgFeedbackStore;

/// Label value that marks a record as queued for re-analysis.
pub const PENDING_LABEL: &str = "neutral-pending";

/// One page of the main pass: records with `id > after` in ascending id order,
/// skipping the first `skip` of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub after: Option<String>,
    pub skip: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            after: None,
            skip: 0,
            limit,
        }
    }
}

/// Main-pass predicate: non-blank text, and for `Pending` an unset or pending label.
pub fn needs_analysis(record: &FeedbackRecord, scope: RecalcScope) -> bool {
    if record.is_blank() {
        return false;
    }
    match scope {
        RecalcScope::All => true,
        RecalcScope::Pending => record
            .sentiment_label
            .as_deref()
            .map_or(true, |label| label == PENDING_LABEL),
    }
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Every record whose text is null, empty, or whitespace-only.
    async fn fetch_blank(&self) -> Result<Vec<FeedbackRecord>, StoreError>;

    /// Number of records matching [`needs_analysis`] for `scope`.
    async fn count_pending(&self, scope: RecalcScope) -> Result<u64, StoreError>;

    async fn fetch_page(
        &self,
        scope: RecalcScope,
        page: &PageRequest,
    ) -> Result<Vec<FeedbackRecord>, StoreError>;

    async fn update_sentiment(&self, id: &str, update: &SentimentUpdate) -> Result<(), StoreError>;

    /// Write `update` to every blank record without a rating in one statement.
    /// Returns the number of affected records.
    async fn update_blank_unrated(&self, _update: &SentimentUpdate) -> Result<u64, StoreError> {
        Err(StoreError::Unsupported("update_blank_unrated"))
    }

    /// Store-side full recompute. Returns the number of affected records.
    async fn recompute_all(&self) -> Result<u64, StoreError> {
        Err(StoreError::Unsupported("recompute_all"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: Option<&str>, label: Option<&str>) -> FeedbackRecord {
        FeedbackRecord {
            id: "fb-1".to_string(),
            text: text.map(str::to_string),
            rating: None,
            sentiment_label: label.map(str::to_string),
            sentiment_score: None,
            last_analyzed_at: None,
        }
    }

    #[test]
    fn test_needs_analysis_pending_scope() {
        assert!(needs_analysis(&record(Some("ok"), None), RecalcScope::Pending));
        assert!(needs_analysis(&record(Some("ok"), Some(PENDING_LABEL)), RecalcScope::Pending));
        assert!(!needs_analysis(&record(Some("ok"), Some("neutral")), RecalcScope::Pending));
        assert!(!needs_analysis(&record(Some("  "), None), RecalcScope::Pending));
    }

    #[test]
    fn test_needs_analysis_all_scope() {
        assert!(needs_analysis(&record(Some("ok"), Some("positive")), RecalcScope::All));
        assert!(!needs_analysis(&record(None, None), RecalcScope::All));
    }
}
