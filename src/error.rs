//! Error types shared across the engine.

use thiserror::Error;

/// Failures reported by a feedback store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transient or injected failure (connection reset, timeout, ...)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// The store does not implement an optional primitive
    #[error("Operation not supported by this store: {0}")]
    Unsupported(&'static str),
}

/// Failures inside a scorer. Always recovered by the record analyzer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("No scorer registered for language '{0}'")]
    NoScorer(String),

    #[error("Text too long for scorer: {len} chars (max {max})")]
    TextTooLong { len: usize, max: usize },

    #[error("Scorer failure: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}
