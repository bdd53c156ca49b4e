//! Bulk sentiment recalculation run.
//!
//! One [`Engine`] owns one run slot. `start()` checks-then-sets the run state
//! under the watch channel's lock, so a second caller sees `Running` and gets
//! [`StartOutcome::AlreadyRunning`] without touching progress or stats.
//!
//! A run:
//! 1. scores blank records (rating proxy individually, unrated ones in bulk),
//! 2. counts records still needing analysis (failure here is fatal),
//! 3. walks them in id-ordered pages with a cursor, retrying fetches with
//!    linear backoff and abandoning a page after the last attempt,
//! 4. writes every result individually and folds the batch into the stats.

use crate::config::RecalcConfig;
use crate::error::StoreError;
use crate::models::{AnalysisResult, FeedbackRecord, Method};
use crate::sentiment::blank::UNKNOWN_LANGUAGE;
use crate::sentiment::RecordAnalyzer;
use crate::stats::RunStats;
use crate::store::{FeedbackStore, PageRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Caller-facing view of the current (or last) run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunSnapshot {
    pub run_id: Option<Uuid>,
    pub state: RunState,
    /// 0-100
    pub progress: u8,
    pub stats: RunStats,
    pub last_message: Option<String>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSnapshot {
    fn idle() -> Self {
        Self {
            run_id: None,
            state: RunState::Idle,
            progress: 0,
            stats: RunStats::default(),
            last_message: None,
            last_error: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn running(run_id: Uuid, message: &str) -> Self {
        Self {
            run_id: Some(run_id),
            state: RunState::Running,
            started_at: Some(Utc::now()),
            last_message: Some(message.to_string()),
            ..Self::idle()
        }
    }
}

#[derive(Debug)]
pub enum StartOutcome {
    /// The run was spawned; the handle resolves to its terminal state.
    Started(JoinHandle<RunState>),
    /// Another run is in progress; nothing was changed.
    AlreadyRunning,
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }
}

#[derive(Debug, Clone, Copy)]
enum RunKind {
    Incremental,
    StoreSide,
}

struct Inner {
    store: Arc<dyn FeedbackStore>,
    analyzer: RecordAnalyzer,
    config: RecalcConfig,
    state: watch::Sender<RunSnapshot>,
}

/// Owner of the run slot. Cheap to clone; clones share the slot.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("state", &self.inner.state.borrow().state)
            .finish()
    }
}

impl Engine {
    /// `page_size` and `fetch_attempts` below 1 are raised to 1.
    pub fn new(store: Arc<dyn FeedbackStore>, analyzer: RecordAnalyzer, mut config: RecalcConfig) -> Self {
        if config.page_size == 0 {
            warn!("⚠️ page_size of 0 raised to 1");
            config.page_size = 1;
        }
        config.fetch_attempts = config.fetch_attempts.max(1);
        let (state, _) = watch::channel(RunSnapshot::idle());
        Self {
            inner: Arc::new(Inner {
                store,
                analyzer,
                config,
                state,
            }),
        }
    }

    /// Engine with the analyzer the config selects.
    pub fn from_config(store: Arc<dyn FeedbackStore>, config: RecalcConfig) -> Self {
        let analyzer = RecordAnalyzer::from_config(&config);
        Self::new(store, analyzer, config)
    }

    pub fn analyzer(&self) -> &RecordAnalyzer {
        &self.inner.analyzer
    }

    pub fn config(&self) -> &RecalcConfig {
        &self.inner.config
    }

    /// Start an incremental recalculation in the background.
    pub fn start(&self) -> StartOutcome {
        self.spawn(RunKind::Incremental)
    }

    /// Delegate the whole recompute to the store, under the same run slot.
    pub fn start_store_side(&self) -> StartOutcome {
        self.spawn(RunKind::StoreSide)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> RunState {
        self.inner.state.borrow().state
    }

    pub fn progress(&self) -> u8 {
        self.inner.state.borrow().progress
    }

    pub fn stats(&self) -> RunStats {
        self.inner.state.borrow().stats.clone()
    }

    pub fn last_message(&self) -> Option<String> {
        self.inner.state.borrow().last_message.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.state.borrow().last_error.clone()
    }

    fn spawn(&self, kind: RunKind) -> StartOutcome {
        let run_id = Uuid::new_v4();
        let claimed = self.inner.state.send_if_modified(|snap| {
            if snap.state == RunState::Running {
                return false;
            }
            *snap = RunSnapshot::running(run_id, "Starting sentiment recalculation");
            true
        });

        if !claimed {
            info!("⏳ Sentiment recalculation already running, ignoring start request");
            return StartOutcome::AlreadyRunning;
        }

        info!("🧠 Sentiment recalculation {} started ({:?})", run_id, kind);
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let guard = RunGuard {
                inner: inner.clone(),
                armed: true,
            };
            let outcome = match kind {
                RunKind::Incremental => inner.run_incremental().await,
                RunKind::StoreSide => inner.run_store_side().await,
            };
            guard.finish(outcome)
        });
        StartOutcome::Started(handle)
    }
}

/// Moves the slot out of `Running` on every exit path, including unwinding and task abort.
struct RunGuard {
    inner: Arc<Inner>,
    armed: bool,
}

impl RunGuard {
    fn finish(mut self, outcome: Result<String, StoreError>) -> RunState {
        self.armed = false;
        match outcome {
            Ok(message) => {
                info!("✅ {}", message);
                self.inner.state.send_modify(|snap| {
                    snap.state = RunState::Completed;
                    snap.progress = 100;
                    snap.last_message = Some(message);
                    snap.finished_at = Some(Utc::now());
                });
                RunState::Completed
            }
            Err(err) => {
                error!("❌ Sentiment recalculation failed: {}", err);
                self.inner.state.send_modify(|snap| {
                    snap.state = RunState::Failed;
                    snap.last_message = Some(format!("Recalculation failed: {}", err));
                    snap.last_error = Some(err.to_string());
                    snap.finished_at = Some(Utc::now());
                });
                RunState::Failed
            }
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        error!("🔥 Sentiment recalculation aborted before completion");
        self.inner.state.send_modify(|snap| {
            if snap.state == RunState::Running {
                snap.state = RunState::Failed;
                snap.last_error = Some("run aborted before completion".to_string());
                snap.last_message = Some("Recalculation aborted".to_string());
                snap.finished_at = Some(Utc::now());
            }
        });
    }
}

impl Inner {
    fn merge_stats(&self, batch: &RunStats) {
        self.state.send_modify(|snap| snap.stats.merge_from(batch));
    }

    fn set_message(&self, message: String) {
        self.state.send_modify(|snap| snap.last_message = Some(message));
    }

    fn set_progress(&self, accounted: u64, total: u64) {
        let progress = if total == 0 {
            100
        } else {
            ((accounted as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        self.state.send_modify(|snap| snap.progress = progress);
    }

    async fn pause(&self) {
        if !self.config.batch_delay.is_zero() {
            sleep(self.config.batch_delay).await;
        }
    }

    async fn run_store_side(&self) -> Result<String, StoreError> {
        self.set_message("Running store-side recompute".to_string());
        let affected = self.store.recompute_all().await?;
        self.state.send_modify(|snap| snap.stats.processed += affected);
        Ok(format!("Store-side recompute updated {} records", affected))
    }

    async fn run_incremental(&self) -> Result<String, StoreError> {
        let mut blank = RunStats::default();
        let blank_outcome = self.blank_pass(&mut blank).await;
        self.merge_stats(&blank);
        match blank_outcome {
            Ok(()) => info!(
                "🧹 Blank pre-pass: {} records updated, {} errors",
                blank.blank_processed, blank.errors
            ),
            Err(err) => warn!(
                "⚠️ Blank pre-pass incomplete after {} records: {}",
                blank.blank_processed, err
            ),
        }

        let total = self.store.count_pending(self.config.scope).await?;
        if total == 0 {
            return Ok(format!(
                "Nothing to do: no feedback pending analysis ({} blank records updated)",
                blank.blank_processed
            ));
        }
        info!("📊 {} feedback records pending analysis", total);
        self.set_message(format!("Analyzing {} feedback records", total));

        let budget_hit = self.main_pass(total).await;

        let stats = self.state.borrow().stats.clone();
        let mut message = format!("Sentiment recalculation complete: {}", stats.display_string());
        if budget_hit {
            message.push_str(" (stopped early: page budget exhausted)");
        }
        Ok(message)
    }

    /// Score blank records. Partial results stay in `batch` even on error.
    async fn blank_pass(&self, batch: &mut RunStats) -> Result<(), StoreError> {
        let blanks = self.store.fetch_blank().await?;
        if blanks.is_empty() {
            return Ok(());
        }

        let (rated, unrated): (Vec<FeedbackRecord>, Vec<FeedbackRecord>) =
            blanks.into_iter().partition(|r| r.rating.is_some());

        for record in &rated {
            let result = self.analyzer.analyze(record);
            self.write_one(record, &result, true, batch).await;
        }

        if unrated.is_empty() {
            return Ok(());
        }

        let result = AnalysisResult::neutral(UNKNOWN_LANGUAGE, Method::DefaultNeutral);
        match self.store.update_blank_unrated(&result.to_update(Utc::now())).await {
            Ok(affected) => {
                batch.record_many(&result, affected, true);
                Ok(())
            }
            Err(StoreError::Unsupported(_)) => {
                debug!("Store has no bulk update, writing {} blank records one by one", unrated.len());
                for record in &unrated {
                    self.write_one(record, &result, true, batch).await;
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Returns true when the page budget ran out before the counted total was reached.
    async fn main_pass(&self, total: u64) -> bool {
        let page_size = self.config.page_size;
        let budget = self
            .config
            .max_pages
            .unwrap_or_else(|| ((total as usize) + page_size - 1) / page_size + 1);

        let mut page = PageRequest::first(page_size);
        let mut accounted: u64 = 0;
        let mut pages = 0usize;

        loop {
            if pages >= budget {
                warn!("🛑 Page budget of {} exhausted with {}/{} records accounted for", budget, accounted, total);
                return true;
            }
            pages += 1;

            let records = match self.fetch_with_retry(&page).await {
                Ok(records) => records,
                Err(err) => {
                    let estimate = (page_size as u64).min(total.saturating_sub(accounted));
                    error!(
                        "❌ Abandoning page {} (after={:?}, skip={}): {}; counting {} errors",
                        pages, page.after, page.skip, err, estimate
                    );
                    accounted += estimate;
                    page.skip += page_size;
                    self.merge_stats(&RunStats::errors(estimate));
                    self.set_progress(accounted, total);
                    if accounted >= total {
                        return false;
                    }
                    self.pause().await;
                    continue;
                }
            };

            if records.is_empty() {
                debug!("Empty page, main pass done");
                return false;
            }

            let mut batch = RunStats::default();
            for record in &records {
                let result = self.analyzer.analyze(record);
                if result.is_error() {
                    batch.record_error();
                    continue;
                }
                self.write_one(record, &result, false, &mut batch).await;
            }

            accounted += records.len() as u64;
            page.after = records.last().map(|r| r.id.clone());
            page.skip = 0;

            debug!(
                "Page {}: {} records, {} processed, {} errors",
                pages,
                records.len(),
                batch.processed,
                batch.errors
            );
            self.merge_stats(&batch);
            self.set_progress(accounted, total);

            if records.len() < page_size || accounted >= total {
                return false;
            }
            self.pause().await;
        }
    }

    /// Up to `fetch_attempts` tries; after the n-th failure waits `n * retry_base_delay`.
    async fn fetch_with_retry(&self, page: &PageRequest) -> Result<Vec<FeedbackRecord>, StoreError> {
        let attempts = self.config.fetch_attempts;
        let mut attempt = 1;
        loop {
            match self.store.fetch_page(self.config.scope, page).await {
                Ok(records) => return Ok(records),
                Err(err) if attempt < attempts => {
                    let wait = self.config.retry_base_delay * attempt;
                    warn!(
                        "⚠️ Page fetch attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, attempts, err, wait
                    );
                    if !wait.is_zero() {
                        sleep(wait).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn write_one(
        &self,
        record: &FeedbackRecord,
        result: &AnalysisResult,
        blank: bool,
        batch: &mut RunStats,
    ) {
        match self
            .store
            .update_sentiment(&record.id, &result.to_update(Utc::now()))
            .await
        {
            Ok(()) => batch.record(result, blank),
            Err(err) => {
                warn!("⚠️ Failed to save sentiment for {}: {}", record.id, err);
                batch.record_error();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecalcScope;
    use crate::models::SentimentLabel;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn fast_config(page_size: usize) -> RecalcConfig {
        RecalcConfig {
            page_size,
            retry_base_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
            ..RecalcConfig::default()
        }
    }

    fn record(id: &str, text: Option<&str>, rating: Option<i32>) -> FeedbackRecord {
        FeedbackRecord {
            id: id.to_string(),
            text: text.map(str::to_string),
            rating,
            sentiment_label: None,
            sentiment_score: None,
            last_analyzed_at: None,
        }
    }

    fn numbered(n: usize) -> Vec<FeedbackRecord> {
        (1..=n)
            .map(|i| {
                let text = if i % 2 == 0 { "great app, love it" } else { "aplikasi ini lemot banget" };
                record(&format!("fb-{:05}", i), Some(text), None)
            })
            .collect()
    }

    fn engine(store: Arc<MemoryStore>, config: RecalcConfig) -> Engine {
        Engine::from_config(store, config)
    }

    async fn run(engine: &Engine) -> RunState {
        match engine.start() {
            StartOutcome::Started(handle) => handle.await.unwrap(),
            StartOutcome::AlreadyRunning => panic!("expected a fresh run"),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_three_records() {
        let store = Arc::new(MemoryStore::with_records(vec![
            record("fb-1", Some(""), Some(5)),
            record("fb-2", Some("aplikasi ini lemot banget"), Some(2)),
            record("fb-3", None, None),
        ]));
        let engine = engine(store.clone(), fast_config(50));

        assert_eq!(run(&engine).await, RunState::Completed);

        let stats = engine.stats();
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.blank_processed, 2);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.by_method["rating-proxy"], 1);
        assert_eq!(stats.by_method["default-neutral"], 1);
        assert_eq!(stats.by_method["indonesian-keywords"], 1);
        assert_eq!(stats.by_language["id"], 1);
        assert_eq!(engine.progress(), 100);

        let r1 = store.get("fb-1").unwrap();
        assert_eq!(r1.sentiment_label.as_deref(), Some("positive"));
        assert_eq!(r1.sentiment_score, Some(0.7));
        let r2 = store.get("fb-2").unwrap();
        assert_eq!(r2.sentiment_label.as_deref(), Some("negative"));
        assert!(r2.sentiment_score.unwrap() < 0.0);
        let r3 = store.get("fb-3").unwrap();
        assert_eq!(r3.sentiment_label.as_deref(), Some("neutral"));
        assert_eq!(r3.sentiment_score, Some(0.0));
        assert!(r3.last_analyzed_at.is_some());

        let message = engine.last_message().unwrap();
        assert!(message.contains("processed 3 (2 blank), 0 errors"), "{}", message);
        assert!(engine.last_error().is_none());
    }

    #[tokio::test]
    async fn test_page_fetch_count_is_ceil_n_over_p() {
        for (n, p, expected) in [(120, 50, 3), (100, 50, 2), (7, 50, 1), (51, 10, 6)] {
            let store = Arc::new(MemoryStore::with_records(numbered(n)));
            let engine = engine(store.clone(), fast_config(p));
            assert_eq!(run(&engine).await, RunState::Completed);
            assert_eq!(store.fetch_calls(), expected, "n={} p={}", n, p);

            let stats = engine.stats();
            assert_eq!(stats.processed + stats.errors, n as u64);
            assert_eq!(stats.errors, 0);
        }
    }

    #[tokio::test]
    async fn test_cursor_paging_reaches_every_record_while_set_shrinks() {
        // Offset paging against the shrinking pending set would skip every other page here.
        let store = Arc::new(MemoryStore::with_records(numbered(95)));
        let engine = engine(store.clone(), fast_config(10));
        assert_eq!(run(&engine).await, RunState::Completed);
        assert_eq!(engine.stats().processed, 95);
        for i in 1..=95 {
            let r = store.get(&format!("fb-{:05}", i)).unwrap();
            assert!(r.sentiment_label.is_some(), "record {} was skipped", i);
        }
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped_and_counted() {
        let store = Arc::new(MemoryStore::with_records(numbered(150)));
        // Call 0 serves page 1; calls 1-3 are every attempt at page 2.
        store.fail_fetch_calls([1, 2, 3]);
        let engine = engine(store.clone(), fast_config(50));

        assert_eq!(run(&engine).await, RunState::Completed);

        let stats = engine.stats();
        assert_eq!(stats.errors, 50);
        assert_eq!(stats.processed, 100);
        assert_eq!(store.fetch_calls(), 5);
        assert!(store.get("fb-00051").unwrap().sentiment_label.is_none());
        assert!(store.get("fb-00100").unwrap().sentiment_label.is_none());
        assert!(store.get("fb-00101").unwrap().sentiment_label.is_some());
        assert_eq!(engine.progress(), 100);
    }

    #[tokio::test]
    async fn test_transient_fetch_failure_is_retried() {
        let store = Arc::new(MemoryStore::with_records(numbered(20)));
        store.fail_fetch_calls([0, 1]);
        let engine = engine(store.clone(), fast_config(50));

        assert_eq!(run(&engine).await, RunState::Completed);
        assert_eq!(engine.stats().processed, 20);
        assert_eq!(engine.stats().errors, 0);
        assert_eq!(store.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn test_abandoned_last_page_estimate_is_capped() {
        let store = Arc::new(MemoryStore::with_records(numbered(60)));
        store.fail_fetch_calls([1, 2, 3]);
        let engine = engine(store.clone(), fast_config(50));

        assert_eq!(run(&engine).await, RunState::Completed);
        let stats = engine.stats();
        assert_eq!(stats.processed, 50);
        assert_eq!(stats.errors, 10);
    }

    #[tokio::test]
    async fn test_failed_write_counts_error_and_leaves_record() {
        let store = Arc::new(MemoryStore::with_records(numbered(10)));
        store.fail_updates_for(["fb-00004"]);
        let engine = engine(store.clone(), fast_config(50));

        assert_eq!(run(&engine).await, RunState::Completed);
        let stats = engine.stats();
        assert_eq!(stats.processed, 9);
        assert_eq!(stats.errors, 1);
        assert!(store.get("fb-00004").unwrap().sentiment_label.is_none());
        assert_eq!(store.update_calls(), 10);

        // Still pending, so the next run picks it up once the store accepts writes again.
        let store2 = Arc::new(MemoryStore::with_records(vec![store.get("fb-00004").unwrap()]));
        let engine2 = self::engine(store2.clone(), fast_config(50));
        assert_eq!(run(&engine2).await, RunState::Completed);
        assert_eq!(engine2.stats().processed, 1);
    }

    #[tokio::test]
    async fn test_count_failure_is_fatal_but_keeps_partial_stats() {
        let store = Arc::new(MemoryStore::with_records(vec![
            record("fb-1", None, Some(1)),
            record("fb-2", Some("good"), None),
        ]));
        store.fail_count();
        let engine = engine(store.clone(), fast_config(50));

        assert_eq!(run(&engine).await, RunState::Failed);
        assert_eq!(engine.state(), RunState::Failed);
        let err = engine.last_error().unwrap();
        assert!(err.contains("count query timed out"), "{}", err);
        assert_eq!(engine.stats().blank_processed, 1);
        assert_eq!(engine.stats().processed, 1);
        assert_eq!(store.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_fetch_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore::with_records(numbered(3)));
        store.fail_blank_fetch();
        let engine = engine(store.clone(), fast_config(50));

        assert_eq!(run(&engine).await, RunState::Completed);
        assert_eq!(engine.stats().processed, 3);
        assert_eq!(engine.stats().blank_processed, 0);
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let store = Arc::new(MemoryStore::with_records(vec![record("fb-1", Some("  "), None)]));
        let engine = engine(store.clone(), fast_config(50));

        assert_eq!(run(&engine).await, RunState::Completed);
        let message = engine.last_message().unwrap();
        assert!(message.starts_with("Nothing to do"), "{}", message);
        assert!(message.contains("1 blank records updated"));
        assert_eq!(store.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_records_without_bulk_primitive() {
        let store = Arc::new(MemoryStore::with_records(vec![
            record("fb-1", None, None),
            record("fb-2", Some(""), None),
            record("fb-3", Some(" "), Some(3)),
        ]));
        store.without_bulk_update();
        let engine = engine(store.clone(), fast_config(50));

        assert_eq!(run(&engine).await, RunState::Completed);
        let stats = engine.stats();
        assert_eq!(stats.blank_processed, 3);
        assert_eq!(stats.by_method["default-neutral"], 2);
        assert_eq!(stats.by_method["rating-proxy"], 1);
        assert_eq!(stats.by_language["unknown"], 3);
        assert_eq!(store.update_calls(), 3);
    }

    #[tokio::test]
    async fn test_second_start_while_running_is_a_noop() {
        let store = Arc::new(MemoryStore::with_records(numbered(100)));
        let config = RecalcConfig {
            batch_delay: Duration::from_millis(300),
            ..fast_config(50)
        };
        let engine = engine(store.clone(), config);

        let handle = match engine.start() {
            StartOutcome::Started(handle) => handle,
            StartOutcome::AlreadyRunning => panic!("first start must run"),
        };

        // Wait until the first page is in, then poke the engine again mid-run.
        let mut rx = engine.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while rx.borrow_and_update().stats.processed < 50 {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        let run_id = engine.snapshot().run_id;
        assert!(!engine.start().is_started());
        assert!(!engine.start_store_side().is_started());
        let snap = engine.snapshot();
        assert_eq!(snap.state, RunState::Running);
        assert_eq!(snap.run_id, run_id);
        assert_eq!(snap.stats.processed, 50);
        assert_eq!(snap.progress, 50);

        assert_eq!(handle.await.unwrap(), RunState::Completed);
        assert_eq!(engine.stats().processed, 100);
    }

    #[tokio::test]
    async fn test_restart_after_completion_resets_stats() {
        let store = Arc::new(MemoryStore::with_records(numbered(5)));
        let config = RecalcConfig {
            scope: RecalcScope::All,
            ..fast_config(50)
        };
        let engine = engine(store.clone(), config);

        assert_eq!(run(&engine).await, RunState::Completed);
        let first = engine.snapshot();
        assert_eq!(run(&engine).await, RunState::Completed);
        let second = engine.snapshot();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(second.stats.processed, 5);
    }

    #[tokio::test]
    async fn test_panicking_store_leaves_run_failed() {
        let store = Arc::new(MemoryStore::with_records(numbered(3)));
        store.panic_on_fetch();
        let engine = engine(store.clone(), fast_config(50));

        let handle = match engine.start() {
            StartOutcome::Started(handle) => handle,
            StartOutcome::AlreadyRunning => panic!("expected a fresh run"),
        };
        assert!(handle.await.is_err());
        assert_eq!(engine.state(), RunState::Failed);
        assert_eq!(engine.last_error().as_deref(), Some("run aborted before completion"));

        // The slot is free again.
        assert!(engine.start().is_started());
    }

    #[tokio::test]
    async fn test_page_budget_stops_run() {
        let store = Arc::new(MemoryStore::with_records(numbered(30)));
        let config = RecalcConfig {
            max_pages: Some(2),
            ..fast_config(10)
        };
        let engine = engine(store.clone(), config);

        assert_eq!(run(&engine).await, RunState::Completed);
        assert_eq!(engine.stats().processed, 20);
        assert_eq!(store.fetch_calls(), 2);
        assert!(engine.last_message().unwrap().contains("page budget exhausted"));
    }

    #[tokio::test]
    async fn test_store_side_recompute() {
        let store = Arc::new(MemoryStore::with_records(vec![
            record("fb-1", Some("mantap, bagus banget"), None),
            record("fb-2", None, Some(1)),
        ]));
        let engine = engine(store.clone(), fast_config(50));

        let state = match engine.start_store_side() {
            StartOutcome::Started(handle) => handle.await.unwrap(),
            StartOutcome::AlreadyRunning => panic!("expected a fresh run"),
        };
        assert_eq!(state, RunState::Completed);
        assert_eq!(engine.stats().processed, 2);
        assert_eq!(
            store.get("fb-1").unwrap().sentiment_label.as_deref(),
            Some(SentimentLabel::Positive.as_str())
        );
        assert_eq!(store.get("fb-2").unwrap().sentiment_score, Some(-0.7));
    }

    #[tokio::test]
    async fn test_independent_engines_do_not_share_state() {
        let a = engine(Arc::new(MemoryStore::with_records(numbered(2))), fast_config(50));
        let b = engine(Arc::new(MemoryStore::with_records(numbered(4))), fast_config(50));
        assert_eq!(run(&a).await, RunState::Completed);
        assert_eq!(b.state(), RunState::Idle);
        assert_eq!(run(&b).await, RunState::Completed);
        assert_eq!(a.stats().processed, 2);
        assert_eq!(b.stats().processed, 4);
    }

    #[tokio::test]
    async fn test_zero_page_size_is_raised_to_one() {
        let store = Arc::new(MemoryStore::with_records(numbered(3)));
        let engine = engine(store.clone(), fast_config(0));
        assert_eq!(engine.config().page_size, 1);

        assert_eq!(run(&engine).await, RunState::Completed);
        let stats = engine.stats();
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.errors, 0);
        assert_eq!(store.fetch_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_backoff_is_linear() {
        let store = Arc::new(MemoryStore::with_records(numbered(3)));
        store.fail_fetch_calls([0, 1]);
        let base = Duration::from_millis(100);
        let config = RecalcConfig {
            retry_base_delay: base,
            ..fast_config(50)
        };
        let engine = engine(store.clone(), config);

        let started = tokio::time::Instant::now();
        assert_eq!(run(&engine).await, RunState::Completed);
        let elapsed = started.elapsed();

        // 1x after the first failure, 2x after the second
        assert!(elapsed >= base * 3, "elapsed {:?}", elapsed);
        assert!(elapsed < base * 4, "elapsed {:?}", elapsed);
        assert_eq!(store.fetch_calls(), 3);
        assert_eq!(engine.stats().processed, 3);
        assert_eq!(engine.stats().errors, 0);
    }
}
