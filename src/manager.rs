//! Document lifecycle management.
//!
//! A [`DocumentManager`] owns every document it has been asked to load,
//! keyed by [source key](crate::source::Source::key). Each key moves
//! through `NotLoaded → Ingesting → Ingested`; only an explicit
//! `force_reingest` sends an ingested key back to `Ingesting`.
//!
//! Concurrent loads of one key share a single pipeline run: the first caller
//! spawns it and everyone else waits on its `watch` channel. A forced
//! reingest cancels the in-flight run, and callers that were waiting on the
//! cancelled run re-join the new one. A failed run leaves no slot behind, so
//! the next load retries from scratch, except that a failed forced reingest
//! restores the document it was replacing.
//!
//! The manager is cheap to clone; clones share state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use taxlaw_context_core::document::IngestedDocument;
use taxlaw_context_core::models::QueryResponse;
use taxlaw_context_core::search::{context_for, query_document, QueryOptions};

use crate::cache::DocumentCache;
use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::ingest::{run_pipeline, CancelToken};
use crate::source::{content_key, load_bytes, Source};

/// Published once per run; `None` until the run finishes.
type Outcome = Option<Result<Arc<IngestedDocument>>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Ignore cached results and cancel any in-flight run for the source.
    pub force_reingest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    NotLoaded,
    Ingesting,
    Ingested,
}

enum Slot {
    Ingesting {
        generation: u64,
        cancel: CancelToken,
        rx: watch::Receiver<Outcome>,
        /// Document being replaced by a forced reingest.
        previous: Option<Arc<IngestedDocument>>,
    },
    Ingested(Arc<IngestedDocument>),
}

#[derive(Default)]
struct Slots {
    by_key: HashMap<String, Slot>,
    next_generation: u64,
}

struct Inner {
    config: Config,
    cache: Option<Arc<dyn DocumentCache>>,
    slots: Mutex<Slots>,
}

#[derive(Clone)]
pub struct DocumentManager {
    inner: Arc<Inner>,
}

/// A source resolved to its key, with its bytes when they are already local.
struct Resolved {
    key: String,
    source: Source,
    bytes: Option<Arc<[u8]>>,
}

impl DocumentManager {
    pub fn new(config: Config, cache: Option<Arc<dyn DocumentCache>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                cache,
                slots: Mutex::new(Slots::default()),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Load `source`, ingesting it if needed.
    ///
    /// Returns the same `Arc` for every load of an already ingested source
    /// unless `force_reingest` is set.
    pub async fn load(&self, source: &Source, opts: LoadOptions) -> Result<Arc<IngestedDocument>> {
        let resolved = self.resolve(source).await?;
        let mut force = opts.force_reingest;

        loop {
            let mut rx = {
                let mut slots = self.inner.slots.lock().await;
                let (joined, previous) = match slots.by_key.get(&resolved.key) {
                    Some(Slot::Ingested(doc)) if !force => {
                        tracing::debug!(source = %resolved.key, "already ingested");
                        return Ok(doc.clone());
                    }
                    Some(Slot::Ingesting { rx, .. }) if !force => (Some(rx.clone()), None),
                    Some(Slot::Ingesting {
                        cancel, previous, ..
                    }) => {
                        tracing::info!(source = %resolved.key, "cancelling in-flight ingestion");
                        cancel.cancel();
                        (None, previous.clone())
                    }
                    Some(Slot::Ingested(doc)) => (None, Some(doc.clone())),
                    None => (None, None),
                };
                match joined {
                    Some(rx) => rx,
                    None => self.start(&mut slots, &resolved, force, previous),
                }
            };
            force = false;

            let outcome = match rx.wait_for(Option::is_some).await {
                Ok(value) => value.clone(),
                Err(_) => None,
            };
            match outcome {
                Some(Err(IngestError::Cancelled)) => {
                    tracing::debug!(source = %resolved.key, "run superseded, re-joining");
                    continue;
                }
                Some(result) => return result,
                None => {
                    return Err(IngestError::Internal(
                        "ingestion task ended without a result".to_string(),
                    ))
                }
            }
        }
    }

    /// Register a new run for `resolved` and spawn it. Caller holds the lock.
    ///
    /// `previous` goes back into the slot if the run fails.
    fn start(
        &self,
        slots: &mut Slots,
        resolved: &Resolved,
        skip_cache: bool,
        previous: Option<Arc<IngestedDocument>>,
    ) -> watch::Receiver<Outcome> {
        let generation = slots.next_generation;
        slots.next_generation += 1;

        let cancel = CancelToken::new();
        let (tx, rx) = watch::channel(None);
        slots.by_key.insert(
            resolved.key.clone(),
            Slot::Ingesting {
                generation,
                cancel: cancel.clone(),
                rx: rx.clone(),
                previous,
            },
        );

        let inner = self.inner.clone();
        let key = resolved.key.clone();
        let source = resolved.source.clone();
        let bytes = resolved.bytes.clone();
        tokio::spawn(async move {
            let result = inner.ingest(&key, &source, bytes, skip_cache, &cancel).await;

            let mut slots = inner.slots.lock().await;
            let current = match slots.by_key.get(&key) {
                Some(Slot::Ingesting {
                    generation: g,
                    previous,
                    ..
                }) if *g == generation => Some(previous.clone()),
                _ => None,
            };
            let result = if let Some(previous) = current {
                match (&result, previous) {
                    (Ok(doc), _) => {
                        slots.by_key.insert(key.clone(), Slot::Ingested(doc.clone()));
                    }
                    (Err(e), Some(previous)) => {
                        tracing::warn!(source = %key, error = %e, "reingestion failed, keeping previous document");
                        slots.by_key.insert(key.clone(), Slot::Ingested(previous));
                    }
                    (Err(e), None) => {
                        tracing::warn!(source = %key, error = %e, "ingestion failed");
                        slots.by_key.remove(&key);
                    }
                }
                result
            } else {
                // a newer run owns the slot; send our waiters over to it
                Err(IngestError::Cancelled)
            };
            drop(slots);
            tx.send_replace(Some(result));
        });

        rx
    }

    async fn resolve(&self, source: &Source) -> Result<Resolved> {
        let (key, bytes) = match source {
            Source::Url(url) => (url.clone(), None),
            Source::Bytes { bytes, .. } => (content_key(bytes), Some(bytes.clone())),
            Source::Path(_) => {
                let bytes = load_bytes(source, &self.inner.config.fetch).await?;
                (content_key(&bytes), Some(bytes))
            }
        };
        Ok(Resolved {
            key,
            source: source.clone(),
            bytes,
        })
    }

    pub async fn status(&self, key: &str) -> DocumentStatus {
        match self.inner.slots.lock().await.by_key.get(key) {
            None => DocumentStatus::NotLoaded,
            Some(Slot::Ingesting { .. }) => DocumentStatus::Ingesting,
            Some(Slot::Ingested(_)) => DocumentStatus::Ingested,
        }
    }

    /// The ingested document for `key`, if there is one.
    pub async fn document(&self, key: &str) -> Option<Arc<IngestedDocument>> {
        match self.inner.slots.lock().await.by_key.get(key) {
            Some(Slot::Ingested(doc)) => Some(doc.clone()),
            _ => None,
        }
    }

    async fn ready(&self, key: &str) -> Result<Arc<IngestedDocument>> {
        self.document(key)
            .await
            .ok_or_else(|| IngestError::IndexUnavailable(key.to_string()))
    }

    /// Ranked chunks for `text`. Fails with a retryable
    /// [`IngestError::IndexUnavailable`] until `key` is ingested.
    pub async fn query(&self, key: &str, text: &str, opts: QueryOptions) -> Result<QueryResponse> {
        let doc = self.ready(key).await?;
        Ok(query_document(&doc, text, opts, &self.inner.config.retrieval))
    }

    /// Formatted context for `text` within `max_tokens`.
    pub async fn context_for(&self, key: &str, text: &str, max_tokens: usize) -> Result<String> {
        let doc = self.ready(key).await?;
        Ok(context_for(&doc, text, max_tokens, &self.inner.config.retrieval))
    }
}

impl Inner {
    async fn ingest(
        &self,
        key: &str,
        source: &Source,
        bytes: Option<Arc<[u8]>>,
        skip_cache: bool,
        cancel: &CancelToken,
    ) -> Result<Arc<IngestedDocument>> {
        if !skip_cache {
            if let Some(doc) = self.restore(key).await {
                return Ok(doc);
            }
        }

        let bytes = match bytes {
            Some(bytes) => bytes,
            None => load_bytes(source, &self.config.fetch).await?,
        };
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let config = self.config.clone();
        let cancel = cancel.clone();
        let run_key = key.to_string();
        let doc = tokio::task::spawn_blocking(move || run_pipeline(&run_key, &bytes, &config, &cancel))
            .await
            .map_err(|e| IngestError::Internal(format!("ingestion task failed: {}", e)))??;
        let doc = Arc::new(doc);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(key, &doc.snapshot()).await {
                tracing::warn!(source = key, error = %e, "failed to persist ingested document");
            }
        }
        Ok(doc)
    }

    async fn restore(&self, key: &str) -> Option<Arc<IngestedDocument>> {
        let cache = self.cache.as_ref()?;
        let snapshot = match cache.get(key).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(source = key, error = %e, "cache lookup failed, ingesting");
                return None;
            }
        };
        match tokio::task::spawn_blocking(move || IngestedDocument::from_snapshot(snapshot)).await {
            Ok(doc) => {
                tracing::info!(
                    source = key,
                    ingestion_id = %doc.ingestion_id,
                    chunks = doc.chunks.len(),
                    "restored from cache"
                );
                Some(Arc::new(doc))
            }
            Err(e) => {
                tracing::warn!(source = key, error = %e, "cache restore failed, ingesting");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxlaw_context_core::document::DocumentParts;

    async fn with_ingesting_slot(manager: &DocumentManager, key: &str) -> watch::Sender<Outcome> {
        let (tx, rx) = watch::channel(None);
        let mut slots = manager.inner.slots.lock().await;
        slots.by_key.insert(
            key.to_string(),
            Slot::Ingesting {
                generation: 0,
                cancel: CancelToken::new(),
                rx,
                previous: None,
            },
        );
        tx
    }

    #[tokio::test]
    async fn test_not_loaded() {
        let manager = DocumentManager::new(Config::minimal(), None);
        assert_eq!(manager.status("sha256:00").await, DocumentStatus::NotLoaded);
        assert!(manager.document("sha256:00").await.is_none());
        let err = manager
            .query(
                "sha256:00",
                "income tax",
                QueryOptions::from_config(&Config::minimal().retrieval),
            )
            .await
            .unwrap_err();
        assert_eq!(err, IngestError::IndexUnavailable("sha256:00".into()));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_ingesting_is_not_ready() {
        let manager = DocumentManager::new(Config::minimal(), None);
        let _tx = with_ingesting_slot(&manager, "k").await;
        assert_eq!(manager.status("k").await, DocumentStatus::Ingesting);
        let err = manager.context_for("k", "penalty", 500).await.unwrap_err();
        assert!(matches!(err, IngestError::IndexUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_run_clears_slot() {
        let manager = DocumentManager::new(Config::minimal(), None);
        let source = Source::bytes("bad.pdf", b"definitely not a pdf".to_vec());
        let key = source.key().unwrap();

        let err = manager.load(&source, LoadOptions::default()).await.unwrap_err();
        assert!(matches!(err, IngestError::Extraction(_)));
        assert_eq!(manager.status(&key).await, DocumentStatus::NotLoaded);

        // the next call retries rather than replaying the failure
        let err = manager.load(&source, LoadOptions::default()).await.unwrap_err();
        assert!(matches!(err, IngestError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_failed_forced_reingest_keeps_previous_document() {
        let manager = DocumentManager::new(Config::minimal(), None);
        let source = Source::bytes("bad.pdf", b"definitely not a pdf".to_vec());
        let key = source.key().unwrap();
        let previous = Arc::new(IngestedDocument::new(key.clone(), DocumentParts::default()));
        manager
            .inner
            .slots
            .lock()
            .await
            .by_key
            .insert(key.clone(), Slot::Ingested(previous.clone()));

        let err = manager
            .load(
                &source,
                LoadOptions {
                    force_reingest: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Extraction(_)));
        assert_eq!(manager.status(&key).await, DocumentStatus::Ingested);
        let kept = manager.document(&key).await.unwrap();
        assert!(Arc::ptr_eq(&kept, &previous));

        // a plain load serves the kept document without running again
        let loaded = manager.load(&source, LoadOptions::default()).await.unwrap();
        assert!(Arc::ptr_eq(&loaded, &previous));
    }

    #[tokio::test]
    async fn test_dropped_sender_is_internal_error() {
        let manager = DocumentManager::new(Config::minimal(), None);
        let source = Source::bytes("a.pdf", b"%PDF-1.4".to_vec());
        let key = source.key().unwrap();
        let tx = with_ingesting_slot(&manager, &key).await;
        drop(tx);

        let err = manager.load(&source, LoadOptions::default()).await.unwrap_err();
        assert!(matches!(err, IngestError::Internal(_)));
    }
}
