//! Bulk sentiment recalculation for feedback records.
//!
//! [`recalc::Engine`] pages through a [`store::FeedbackStore`], scores each
//! record with a language-routed [`sentiment::RecordAnalyzer`] and publishes
//! progress through a watch channel that the HTTP layer in [`api`] exposes.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod recalc;
pub mod sentiment;
pub mod stats;
pub mod store;

pub use config::RecalcConfig;
pub use error::{AnalysisError, ConfigError, StoreError};
pub use models::{AnalysisResult, FeedbackRecord, Method, SentimentLabel};
pub use recalc::{Engine, RunSnapshot, RunState, StartOutcome};
pub use stats::RunStats;
