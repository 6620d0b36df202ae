// SQLite document store for fact documents.
// One flat row per document; the newest timestamp doubles as the resume checkpoint.

mod row;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

use crate::error::StoreError;
use crate::models::{Checkpoint, FactDocument};

const SCHEMA_VERSION: i64 = 1;

/// Persistence used by the scheduler.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Create tables/indexes if absent. Idempotent.
    async fn ensure_schema_ready(&self) -> Result<(), StoreError>;

    /// Timestamp of the newest stored document, or None when empty.
    async fn find_latest_checkpoint(&self) -> Result<Option<Checkpoint>, StoreError>;

    /// Write all documents as one batch. Empty input is a no-op.
    async fn bulk_write(&self, docs: &[FactDocument]) -> Result<(), StoreError>;
}

pub struct SqliteFactStore {
    pool: SqlitePool,
}

impl SqliteFactStore {
    /// Connect to SQLite at `path`, create parent dir and DB if missing, enable WAL + pragmas.
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    /// Most recent documents, oldest first (inspection/debug).
    pub async fn recent_documents(&self, limit: u32) -> Result<Vec<FactDocument>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM fact_documents ORDER BY timestamp DESC, id DESC LIMIT $1",
            row::SELECT_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(row::parse_document(&r)?);
        }
        out.reverse();
        Ok(out)
    }

    pub async fn count_documents(&self) -> Result<u64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM fact_documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }

    /// Delete documents with timestamp < cutoff. Returns rows removed.
    #[instrument(skip(self), fields(repo = "facts", operation = "prune_older_than"))]
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let r = sqlx::query("DELETE FROM fact_documents WHERE timestamp < $1")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Reclaim space after large prunes.
    #[instrument(skip(self), fields(repo = "facts", operation = "vacuum"))]
    pub async fn vacuum(&self) -> Result<(), StoreError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl FactStore for SqliteFactStore {
    #[instrument(skip(self), fields(repo = "facts", operation = "ensure_schema_ready"))]
    async fn ensure_schema_ready(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fact_documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                data_type TEXT NOT NULL,
                data_key TEXT NOT NULL,
                zone_id TEXT NOT NULL,
                zone_name TEXT,
                timestamp INTEGER NOT NULL,
                uniques INTEGER NOT NULL DEFAULT 0,
                bytes INTEGER NOT NULL DEFAULT 0,
                cached_bytes INTEGER NOT NULL DEFAULT 0,
                cached_requests INTEGER NOT NULL DEFAULT 0,
                encrypted_bytes INTEGER NOT NULL DEFAULT 0,
                encrypted_requests INTEGER NOT NULL DEFAULT 0,
                page_views INTEGER NOT NULL DEFAULT 0,
                requests INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_facts_timestamp ON fact_documents(timestamp)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_facts_zone_type ON fact_documents(zone_id, data_type, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO schema_version (key, value) VALUES ('fact_documents', $1)")
            .bind(SCHEMA_VERSION)
            .execute(&self.pool)
            .await?;

        let version = sqlx::query_scalar::<_, i64>(
            "SELECT value FROM schema_version WHERE key = 'fact_documents'",
        )
        .fetch_one(&self.pool)
        .await?;
        if version != SCHEMA_VERSION {
            return Err(StoreError::Schema(format!(
                "fact_documents schema version {version}, expected {SCHEMA_VERSION}"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "facts", operation = "find_latest_checkpoint"))]
    async fn find_latest_checkpoint(&self) -> Result<Option<Checkpoint>, StoreError> {
        let latest = sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(timestamp) FROM fact_documents")
            .fetch_one(&self.pool)
            .await?;
        latest
            .map(|secs| row::timestamp_from_secs(secs).map(Checkpoint::new))
            .transpose()
    }

    #[instrument(skip(self, docs), fields(repo = "facts", operation = "bulk_write", docs_count = docs.len()))]
    async fn bulk_write(&self, docs: &[FactDocument]) -> Result<(), StoreError> {
        if docs.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for d in docs {
            sqlx::query(
                "INSERT INTO fact_documents (data_type, data_key, zone_id, zone_name, timestamp, uniques, bytes, cached_bytes, cached_requests, encrypted_bytes, encrypted_requests, page_views, requests) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(d.data_type.as_str())
            .bind(&d.data_key)
            .bind(&d.zone_id)
            .bind(&d.zone_name)
            .bind(d.timestamp.timestamp())
            .bind(row::to_db(d.uniques))
            .bind(row::to_db(d.bytes))
            .bind(row::to_db(d.cached_bytes))
            .bind(row::to_db(d.cached_requests))
            .bind(row::to_db(d.encrypted_bytes))
            .bind(row::to_db(d.encrypted_requests))
            .bind(row::to_db(d.page_views))
            .bind(row::to_db(d.requests))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
