//! services/reader/src/adapters/store.rs
//!
//! This module contains the device-store adapter, the concrete
//! implementation of the `PageStore` and `QuizQueue` ports from the `core`
//! crate. It handles all interactions with the local SQLite database using
//! `sqlx`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, SqlitePool};
use story_reader_core::domain::QuizResult;
use story_reader_core::ports::{PageStore, PortError, PortResult, QuizQueue};
use uuid::Uuid;

/// Bound on persistent cache growth: oldest entries beyond this many rows
/// per document are deleted on insert.
const MAX_CACHED_PAGES_PER_DOCUMENT: i64 = 400;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A device-store adapter that implements the `PageStore` and `QuizQueue`
/// ports over one SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a new `SqliteStore` around an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (or creates) the store at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run store migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// The well-known persistent cache key for one page of one document.
fn cache_key(document_id: Uuid, page: usize) -> String {
    format!("story_{document_id}_page_{page}")
}

fn document_key_pattern(document_id: Uuid) -> String {
    format!("story_{document_id}_page_%")
}

fn to_port_error(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Store Record Structs
//=========================================================================================

#[derive(FromRow)]
struct QuizQueueRecord {
    document_id: String,
    score: i64,
    total: i64,
    recorded_at: DateTime<Utc>,
}

impl QuizQueueRecord {
    fn to_domain(self) -> PortResult<QuizResult> {
        let document_id = Uuid::parse_str(&self.document_id)
            .map_err(|e| PortError::Unexpected(format!("corrupt queued document id: {e}")))?;
        Ok(QuizResult {
            document_id,
            score: self.score as u32,
            total: self.total as u32,
            recorded_at: self.recorded_at,
        })
    }
}

//=========================================================================================
// `PageStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PageStore for SqliteStore {
    async fn load(
        &self,
        document_id: Uuid,
        page: usize,
        scale_tag: u16,
    ) -> PortResult<Option<Bytes>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT bytes FROM page_cache WHERE cache_key = ? AND scale_tag = ?")
                .bind(cache_key(document_id, page))
                .bind(scale_tag as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(to_port_error)?;
        Ok(row.map(|(bytes,)| Bytes::from(bytes)))
    }

    async fn store(
        &self,
        document_id: Uuid,
        page: usize,
        scale_tag: u16,
        bytes: Bytes,
    ) -> PortResult<()> {
        // Last write wins; page bytes for a given key are deterministic, so
        // concurrent writers converge.
        sqlx::query(
            "INSERT INTO page_cache (cache_key, scale_tag, bytes, created_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(cache_key) DO UPDATE SET \
                scale_tag = excluded.scale_tag, \
                bytes = excluded.bytes, \
                created_at = excluded.created_at",
        )
        .bind(cache_key(document_id, page))
        .bind(scale_tag as i64)
        .bind(bytes.to_vec())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(to_port_error)?;

        // Keep per-document growth bounded: drop the oldest rows beyond the
        // cap.
        sqlx::query(
            "DELETE FROM page_cache WHERE cache_key LIKE ? AND cache_key NOT IN ( \
                SELECT cache_key FROM page_cache WHERE cache_key LIKE ? \
                ORDER BY created_at DESC LIMIT ?)",
        )
        .bind(document_key_pattern(document_id))
        .bind(document_key_pattern(document_id))
        .bind(MAX_CACHED_PAGES_PER_DOCUMENT)
        .execute(&self.pool)
        .await
        .map_err(to_port_error)?;

        Ok(())
    }
}

//=========================================================================================
// `QuizQueue` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuizQueue for SqliteStore {
    async fn enqueue(&self, result: &QuizResult) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO quiz_queue (document_id, score, total, recorded_at) VALUES (?, ?, ?, ?)",
        )
        .bind(result.document_id.to_string())
        .bind(result.score as i64)
        .bind(result.total as i64)
        .bind(result.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(to_port_error)?;
        Ok(())
    }

    async fn take_pending(&self) -> PortResult<Vec<QuizResult>> {
        // Select and delete inside one transaction so two concurrent
        // flushes cannot both observe the same results.
        let mut tx = self.pool.begin().await.map_err(to_port_error)?;

        let records: Vec<QuizQueueRecord> = sqlx::query_as(
            "SELECT document_id, score, total, recorded_at FROM quiz_queue ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(to_port_error)?;

        sqlx::query("DELETE FROM quiz_queue")
            .execute(&mut *tx)
            .await
            .map_err(to_port_error)?;

        tx.commit().await.map_err(to_port_error)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}
