//! Document manager lifecycle tests against real PDFs.

mod common;

use std::sync::Arc;

use taxlaw_context::cache::{DocumentCache, MemoryCache, SqliteCache};
use taxlaw_context::config::Config;
use taxlaw_context::error::IngestError;
use taxlaw_context::manager::{DocumentManager, DocumentStatus, LoadOptions};
use taxlaw_context::source::Source;
use taxlaw_context_core::models::ElementKind;
use taxlaw_context_core::search::QueryOptions;

fn tax_act() -> Source {
    Source::bytes("tax-act.pdf", common::tax_act_pdf())
}

fn forced() -> LoadOptions {
    LoadOptions {
        force_reingest: true,
    }
}

#[tokio::test]
async fn test_pipeline_over_real_pdf() {
    let manager = DocumentManager::new(Config::minimal(), None);
    let doc = manager.load(&tax_act(), LoadOptions::default()).await.unwrap();

    assert_eq!(doc.pages.len(), 3);
    assert!(!doc.chunks.is_empty());
    assert_eq!(doc.index.len(), doc.chunks.len());

    // running footer is stripped from every page
    for page in &doc.normalized_pages {
        assert!(!page.text.contains("of 3"), "footer left on page {}", page.page_number);
    }

    let headings: Vec<&str> = doc
        .elements
        .iter()
        .filter(|e| e.kind == ElementKind::Heading)
        .map(|e| e.text.as_str())
        .collect();
    assert!(headings.contains(&"PART III VALUE ADDED TAX"), "{:?}", headings);

    let all: String = doc.chunks.iter().map(|c| c.content.as_str()).collect();
    assert!(all.contains("seven and a half percent"));
}

#[tokio::test]
async fn test_load_is_idempotent() {
    let manager = DocumentManager::new(Config::minimal(), None);
    let first = manager.load(&tax_act(), LoadOptions::default()).await.unwrap();
    let second = manager.load(&tax_act(), LoadOptions::default()).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        manager.status(&first.source_id).await,
        DocumentStatus::Ingested
    );
}

#[tokio::test]
async fn test_concurrent_loads_share_one_run() {
    let manager = DocumentManager::new(Config::minimal(), None);
    let source = tax_act();
    let (a, b, c) = tokio::join!(
        manager.load(&source, LoadOptions::default()),
        manager.load(&source, LoadOptions::default()),
        manager.load(&source, LoadOptions::default()),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));
}

#[tokio::test]
async fn test_force_reingest_replaces_document() {
    let manager = DocumentManager::new(Config::minimal(), None);
    let first = manager.load(&tax_act(), LoadOptions::default()).await.unwrap();
    let second = manager.load(&tax_act(), forced()).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.ingestion_id, second.ingestion_id);
    assert_eq!(first.source_id, second.source_id);

    let current = manager.document(&first.source_id).await.unwrap();
    assert!(Arc::ptr_eq(&current, &second));
}

#[tokio::test]
async fn test_force_reingest_supersedes_in_flight_run() {
    let manager = DocumentManager::new(Config::minimal(), None);
    let source = tax_act();
    // the first load is still waiting when the forced one starts, so it
    // must re-join the newer run and see the same document
    let (waiter, forcer) = tokio::join!(
        manager.load(&source, LoadOptions::default()),
        manager.load(&source, forced()),
    );
    let (waiter, forcer) = (waiter.unwrap(), forcer.unwrap());
    assert!(Arc::ptr_eq(&waiter, &forcer));
}

#[tokio::test]
async fn test_query_before_and_after_ingestion() {
    let manager = DocumentManager::new(Config::minimal(), None);
    let source = tax_act();
    let key = source.key().unwrap();
    let opts = QueryOptions::from_config(&manager.config().retrieval);

    let err = manager.query(&key, "value added tax", opts).await.unwrap_err();
    assert!(matches!(err, IngestError::IndexUnavailable(_)));
    assert!(err.is_retryable());

    manager.load(&source, LoadOptions::default()).await.unwrap();
    let response = manager.query(&key, "value added tax", opts).await.unwrap();
    assert!(!response.results.is_empty());
    assert!((response.results[0].score - 1.0).abs() < 1e-9);

    let context = manager.context_for(&key, "value added tax", 2000).await.unwrap();
    assert!(context.starts_with('['));
    assert!(context.contains("Page"));
}

#[tokio::test]
async fn test_cache_restores_without_reingesting() {
    let cache = Arc::new(MemoryCache::new());
    let first = DocumentManager::new(Config::minimal(), Some(cache.clone()));
    let original = first.load(&tax_act(), LoadOptions::default()).await.unwrap();
    assert_eq!(cache.len().await, 1);

    let second = DocumentManager::new(Config::minimal(), Some(cache.clone()));
    let restored = second.load(&tax_act(), LoadOptions::default()).await.unwrap();
    assert_eq!(restored.ingestion_id, original.ingestion_id);
    assert_eq!(restored.chunks, original.chunks);
    assert_eq!(restored.index.len(), original.index.len());

    // forcing bypasses the cache and overwrites it
    let fresh = second.load(&tax_act(), forced()).await.unwrap();
    assert_ne!(fresh.ingestion_id, original.ingestion_id);
    let cached = cache.get(&fresh.source_id).await.unwrap().unwrap();
    assert_eq!(cached.ingestion_id, fresh.ingestion_id);
}

#[tokio::test]
async fn test_sqlite_cache_across_managers() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cache.sqlite");

    let cache = Arc::new(SqliteCache::open(&path).await.unwrap());
    let manager = DocumentManager::new(Config::minimal(), Some(cache));
    let original = manager.load(&tax_act(), LoadOptions::default()).await.unwrap();

    let cache = Arc::new(SqliteCache::open(&path).await.unwrap());
    let manager = DocumentManager::new(Config::minimal(), Some(cache));
    let restored = manager.load(&tax_act(), LoadOptions::default()).await.unwrap();
    assert_eq!(restored.ingestion_id, original.ingestion_id);
    assert_eq!(restored.outline, original.outline);
}

#[tokio::test]
async fn test_path_and_bytes_share_a_key() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("tax-act.pdf");
    std::fs::write(&path, common::tax_act_pdf()).unwrap();

    let manager = DocumentManager::new(Config::minimal(), None);
    let from_path = manager
        .load(&Source::Path(path), LoadOptions::default())
        .await
        .unwrap();
    let from_bytes = manager.load(&tax_act(), LoadOptions::default()).await.unwrap();
    assert!(Arc::ptr_eq(&from_path, &from_bytes));
}

#[tokio::test]
async fn test_textless_pdf_fails_and_clears_slot() {
    let manager = DocumentManager::new(Config::minimal(), None);
    let source = Source::bytes("blank.pdf", common::blank_pdf());
    let key = source.key().unwrap();

    let err = manager.load(&source, LoadOptions::default()).await.unwrap_err();
    assert!(matches!(err, IngestError::Extraction(_)), "{:?}", err);
    assert!(!err.is_retryable());
    assert_eq!(manager.status(&key).await, DocumentStatus::NotLoaded);
}
