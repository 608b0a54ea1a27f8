use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

use crate::db;

pub async fn run_migrations(db_path: &Path) -> Result<()> {
    let pool = db::connect(db_path).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation on an open pool.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // One row per source key; the snapshot is stored as JSON
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            source_key TEXT PRIMARY KEY,
            ingestion_id TEXT NOT NULL,
            ingested_at INTEGER NOT NULL,
            page_count INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL,
            snapshot_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_ingested_at ON documents(ingested_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
