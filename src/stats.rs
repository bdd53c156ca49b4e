//! Run statistics and their merge.

use crate::models::AnalysisResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Totals for one recalculation run.
///
/// Batches are built with the same type and folded in with [`RunStats::merge`];
/// the merge is a plain sum so the fold order never changes the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunStats {
    /// Records scored and written, blanks included
    pub processed: u64,
    /// Records that failed to analyze or update, plus estimates for abandoned pages
    pub errors: u64,
    /// Subset of `processed` whose text was blank
    pub blank_processed: u64,
    pub by_language: BTreeMap<String, u64>,
    pub by_method: BTreeMap<String, u64>,
}

impl RunStats {
    /// A batch holding only an error count.
    pub fn errors(count: u64) -> Self {
        Self {
            errors: count,
            ..Self::default()
        }
    }

    /// Count one successfully written result.
    pub fn record(&mut self, result: &AnalysisResult, blank: bool) {
        self.record_many(result, 1, blank);
    }

    /// Count `n` records written with the same result, e.g. by a bulk update.
    pub fn record_many(&mut self, result: &AnalysisResult, n: u64, blank: bool) {
        if n == 0 {
            return;
        }
        self.processed += n;
        if blank {
            self.blank_processed += n;
        }
        *self.by_language.entry(result.language.clone()).or_insert(0) += n;
        *self.by_method.entry(result.method.as_str().to_string()).or_insert(0) += n;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Pure merge of two partial totals.
    pub fn merge(&self, batch: &RunStats) -> RunStats {
        let mut merged = self.clone();
        merged.merge_from(batch);
        merged
    }

    pub fn merge_from(&mut self, batch: &RunStats) {
        self.processed += batch.processed;
        self.errors += batch.errors;
        self.blank_processed += batch.blank_processed;
        for (k, v) in &batch.by_language {
            *self.by_language.entry(k.clone()).or_insert(0) += v;
        }
        for (k, v) in &batch.by_method {
            *self.by_method.entry(k.clone()).or_insert(0) += v;
        }
    }

    /// "processed 3 (2 blank), 0 errors; languages: id=1, unknown=2; methods: ..."
    pub fn display_string(&self) -> String {
        format!(
            "processed {} ({} blank), {} errors; languages: {}; methods: {}",
            self.processed,
            self.blank_processed,
            self.errors,
            breakdown(&self.by_language),
            breakdown(&self.by_method)
        )
    }
}

fn breakdown(map: &BTreeMap<String, u64>) -> String {
    if map.is_empty() {
        return "none".to_string();
    }
    map.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
