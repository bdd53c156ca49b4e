//! Language-aware sentiment scoring for feedback text.
//!
//! Keyword tables are static data per language; the [`LanguageRouter`] picks a
//! [`Scorer`] for the detected language and [`RecordAnalyzer`] wraps the whole
//! thing with the blank-text rating policy and the fallback chain.

pub mod analyzer;
pub mod blank;
pub mod enhanced;
pub mod keywords;
pub mod language;
pub mod scorer;

pub use analyzer::RecordAnalyzer;
pub use blank::BlankInputPolicy;
pub use enhanced::EnhancedScorer;
pub use language::{Language, LanguageRouter};
pub use scorer::{KeywordScorer, Score, Scorer};
