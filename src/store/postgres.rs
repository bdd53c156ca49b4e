//! Postgres (Supabase) implementation of [`FeedbackStore`].

use crate::config::RecalcScope;
use crate::error::StoreError;
use crate::models::{FeedbackRecord, SentimentUpdate};
use crate::store::{FeedbackStore, PageRequest, PENDING_LABEL};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Row};
use std::str::FromStr;

const BLANK_TEXT: &str = r"(text IS NULL OR text ~ '^\s*$')";

const COLUMNS: &str = "id, text, rating, sentiment_label, sentiment_score, last_analyzed_at";

/// Connect with the Supabase pooler workarounds: no statement cache and a
/// `DEALLOCATE ALL` on every new connection to avoid "prepared statement already exists".
pub async fn connect(db_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let opts = PgConnectOptions::from_str(db_url)?.statement_cache_capacity(0);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move { conn.execute("DEALLOCATE ALL").await.map(|_| ()) })
        })
        .connect_with(opts)
        .await
}

/// Create the feedback table if missing and add sentiment columns to older schemas.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id VARCHAR PRIMARY KEY,
            text TEXT,
            rating INTEGER,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Columns added after the first release; each one separately so partial migrations still converge
    sqlx::query("ALTER TABLE feedback ADD COLUMN IF NOT EXISTS sentiment_label VARCHAR(32);")
        .execute(pool)
        .await?;
    sqlx::query("ALTER TABLE feedback ADD COLUMN IF NOT EXISTS sentiment_score DOUBLE PRECISION;")
        .execute(pool)
        .await?;
    sqlx::query("ALTER TABLE feedback ADD COLUMN IF NOT EXISTS last_analyzed_at TIMESTAMPTZ;")
        .execute(pool)
        .await?;

    Ok(())
}

fn scope_filter(scope: RecalcScope) -> String {
    match scope {
        RecalcScope::Pending => format!(
            "NOT {} AND (sentiment_label IS NULL OR sentiment_label = '{}')",
            BLANK_TEXT, PENDING_LABEL
        ),
        RecalcScope::All => format!("NOT {}", BLANK_TEXT),
    }
}

fn map_record(row: &PgRow) -> Result<FeedbackRecord, sqlx::Error> {
    Ok(FeedbackRecord {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        rating: row.try_get("rating")?,
        sentiment_label: row.try_get("sentiment_label")?,
        sentiment_score: row.try_get("sentiment_score")?,
        last_analyzed_at: row.try_get("last_analyzed_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct PgFeedbackStore {
    pool: PgPool,
}

impl PgFeedbackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FeedbackStore for PgFeedbackStore {
    async fn fetch_blank(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        let sql = format!("SELECT {} FROM feedback WHERE {} ORDER BY id ASC", COLUMNS, BLANK_TEXT);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(map_record).collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    async fn count_pending(&self, scope: RecalcScope) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) AS pending FROM feedback WHERE {}", scope_filter(scope));
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        let pending: i64 = row.try_get("pending")?;
        Ok(pending.max(0) as u64)
    }

    async fn fetch_page(
        &self,
        scope: RecalcScope,
        page: &PageRequest,
    ) -> Result<Vec<FeedbackRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM feedback WHERE {} AND ($1::VARCHAR IS NULL OR id > $1) \
             ORDER BY id ASC LIMIT $2 OFFSET $3",
            COLUMNS,
            scope_filter(scope)
        );
        let rows = sqlx::query(&sql)
            .bind(&page.after)
            .bind(page.limit as i64)
            .bind(page.skip as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(map_record).collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    async fn update_sentiment(&self, id: &str, update: &SentimentUpdate) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE feedback SET sentiment_label = $2, sentiment_score = $3, last_analyzed_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(update.label.as_str())
        .bind(update.score)
        .bind(update.analyzed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn update_blank_unrated(&self, update: &SentimentUpdate) -> Result<u64, StoreError> {
        let sql = format!(
            "UPDATE feedback SET sentiment_label = $1, sentiment_score = $2, last_analyzed_at = $3 \
             WHERE {} AND rating IS NULL",
            BLANK_TEXT
        );
        let result = sqlx::query(&sql)
            .bind(update.label.as_str())
            .bind(update.score)
            .bind(update.analyzed_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Calls the `recalculate_all_sentiment()` database function.
    async fn recompute_all(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT recalculate_all_sentiment()::BIGINT AS affected")
            .fetch_one(&self.pool)
            .await?;
        let affected: i64 = row.try_get("affected")?;
        Ok(affected.max(0) as u64)
    }
}
