//! In-process feedback store with fault injection, used by tests and the offline demo.

use crate::config::RecalcScope;
use crate::error::StoreError;
use crate::models::{FeedbackRecord, SentimentUpdate};
use crate::sentiment::RecordAnalyzer;
use crate::store::{needs_analysis, FeedbackStore, PageRequest};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Faults {
    /// Zero-based `fetch_page` call indices that fail
    failing_fetch_calls: HashSet<usize>,
    failing_updates: HashSet<String>,
    fail_count: bool,
    fail_blank_fetch: bool,
    bulk_unsupported: bool,
    panic_on_fetch: bool,
}

/// Records keyed (and therefore ordered) by id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, FeedbackRecord>>,
    faults: Mutex<Faults>,
    fetch_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = FeedbackRecord>,
    {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&self, record: FeedbackRecord) {
        lock(&self.records).insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<FeedbackRecord> {
        lock(&self.records).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Make the given zero-based `fetch_page` calls fail.
    pub fn fail_fetch_calls<I: IntoIterator<Item = usize>>(&self, calls: I) {
        lock(&self.faults).failing_fetch_calls.extend(calls);
    }

    pub fn fail_updates_for<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.faults)
            .failing_updates
            .extend(ids.into_iter().map(Into::into));
    }

    pub fn fail_count(&self) {
        lock(&self.faults).fail_count = true;
    }

    pub fn fail_blank_fetch(&self) {
        lock(&self.faults).fail_blank_fetch = true;
    }

    /// Behave like a store without a bulk update primitive.
    pub fn without_bulk_update(&self) {
        lock(&self.faults).bulk_unsupported = true;
    }

    pub fn panic_on_fetch(&self) {
        lock(&self.faults).panic_on_fetch = true;
    }

    fn apply(record: &mut FeedbackRecord, update: &SentimentUpdate) {
        record.sentiment_label = Some(update.label.as_str().to_string());
        record.sentiment_score = Some(update.score);
        record.last_analyzed_at = Some(update.analyzed_at);
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn fetch_blank(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        if lock(&self.faults).fail_blank_fetch {
            return Err(StoreError::Unavailable("blank fetch failed".to_string()));
        }
        Ok(lock(&self.records)
            .values()
            .filter(|r| r.is_blank())
            .cloned()
            .collect())
    }

    async fn count_pending(&self, scope: RecalcScope) -> Result<u64, StoreError> {
        if lock(&self.faults).fail_count {
            return Err(StoreError::Unavailable("count query timed out".to_string()));
        }
        Ok(lock(&self.records)
            .values()
            .filter(|r| needs_analysis(r, scope))
            .count() as u64)
    }

    async fn fetch_page(
        &self,
        scope: RecalcScope,
        page: &PageRequest,
    ) -> Result<Vec<FeedbackRecord>, StoreError> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        {
            let faults = lock(&self.faults);
            if faults.panic_on_fetch {
                panic!("memory store: injected panic on fetch_page");
            }
            if faults.failing_fetch_calls.contains(&call) {
                return Err(StoreError::Unavailable(format!(
                    "injected failure on fetch call {}",
                    call
                )));
            }
        }

        let records = lock(&self.records);
        let iter = match &page.after {
            Some(after) => records.range::<String, _>((
                std::ops::Bound::Excluded(after.clone()),
                std::ops::Bound::Unbounded,
            )),
            None => records.range::<String, _>(..),
        };
        Ok(iter
            .map(|(_, r)| r)
            .filter(|r| needs_analysis(r, scope))
            .skip(page.skip)
            .take(page.limit)
            .cloned()
            .collect())
    }

    async fn update_sentiment(&self, id: &str, update: &SentimentUpdate) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if lock(&self.faults).failing_updates.contains(id) {
            return Err(StoreError::Unavailable(format!("write rejected for {}", id)));
        }
        let mut records = lock(&self.records);
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Self::apply(record, update);
        Ok(())
    }

    async fn update_blank_unrated(&self, update: &SentimentUpdate) -> Result<u64, StoreError> {
        if lock(&self.faults).bulk_unsupported {
            return Err(StoreError::Unsupported("update_blank_unrated"));
        }
        let mut records = lock(&self.records);
        let mut affected = 0;
        for record in records
            .values_mut()
            .filter(|r| r.is_blank() && r.rating.is_none())
        {
            Self::apply(record, update);
            affected += 1;
        }
        Ok(affected)
    }

    /// Re-score every record in place with the default analyzer.
    async fn recompute_all(&self) -> Result<u64, StoreError> {
        let analyzer = RecordAnalyzer::default();
        let now = Utc::now();
        let mut records = lock(&self.records);
        for record in records.values_mut() {
            let update = analyzer.analyze(record).to_update(now);
            Self::apply(record, &update);
        }
        Ok(records.len() as u64)
    }
}
