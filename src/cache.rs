//! Persisted cache of ingested documents.
//!
//! The [`DocumentCache`] trait is the manager's only view of persistence:
//! look a snapshot up by source key, or store one. Implementations must be
//! `Send + Sync`; the manager treats every cache error as a miss and logs
//! it rather than failing the load.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use taxlaw_context_core::document::DocumentSnapshot;

use crate::{db, migrate};

#[async_trait]
pub trait DocumentCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<DocumentSnapshot>>;

    async fn set(&self, key: &str, snapshot: &DocumentSnapshot) -> Result<()>;
}

/// Process-local cache, mainly for tests.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, DocumentSnapshot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<DocumentSnapshot>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, snapshot: &DocumentSnapshot) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), snapshot.clone());
        Ok(())
    }
}

/// SQLite-backed cache; one JSON snapshot per source key.
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open (creating if needed) the cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DocumentCache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<DocumentSnapshot>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT snapshot_json FROM documents WHERE source_key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        json.map(|j| {
            serde_json::from_str(&j)
                .with_context(|| format!("Corrupt cached snapshot for {}", key))
        })
        .transpose()
    }

    async fn set(&self, key: &str, snapshot: &DocumentSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        sqlx::query(
            r#"
            INSERT INTO documents (source_key, ingestion_id, ingested_at, page_count, chunk_count, snapshot_json)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_key) DO UPDATE SET
                ingestion_id = excluded.ingestion_id,
                ingested_at = excluded.ingested_at,
                page_count = excluded.page_count,
                chunk_count = excluded.chunk_count,
                snapshot_json = excluded.snapshot_json
            "#,
        )
        .bind(key)
        .bind(snapshot.ingestion_id.to_string())
        .bind(snapshot.ingested_at.timestamp())
        .bind(snapshot.pages.len() as i64)
        .bind(snapshot.chunks.len() as i64)
        .bind(&json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
