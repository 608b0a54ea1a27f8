//! Ingestion pipeline orchestration.
//!
//! Runs one source through every stage in order: extraction →
//! normalization → structure detection → tree building → chunking →
//! indexing. The whole run is synchronous and CPU-bound; the manager calls
//! it under `spawn_blocking`. Cancellation is cooperative and checked
//! between stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use taxlaw_context_core::chunk::chunk_outline;
use taxlaw_context_core::detect::StructureDetector;
use taxlaw_context_core::document::{DocumentParts, IngestedDocument};
use taxlaw_context_core::models::ElementKind;
use taxlaw_context_core::normalize::normalize_pages;
use taxlaw_context_core::structure::build_tree;

use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::extract::extract_pages;

/// Shared flag that asks a running pipeline to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(IngestError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Run the full pipeline over `bytes` and return the ingested document.
pub fn run_pipeline(
    source_key: &str,
    bytes: &[u8],
    config: &Config,
    cancel: &CancelToken,
) -> Result<IngestedDocument> {
    let started = Instant::now();
    cancel.check()?;

    let pages = extract_pages(bytes, config.normalize.line_tolerance)?;
    cancel.check()?;

    let normalized_pages = normalize_pages(&pages, &config.normalize);
    tracing::info!(
        source = source_key,
        pages = normalized_pages.len(),
        "pages normalized"
    );
    cancel.check()?;

    let detector = StructureDetector::new(config.detection.clone())
        .map_err(|e| IngestError::Internal(format!("{:#}", e)))?;
    let elements = detector.detect(&normalized_pages);
    let headings = elements.iter().filter(|e| e.kind == ElementKind::Heading).count();
    tracing::info!(
        source = source_key,
        elements = elements.len(),
        headings,
        "structure detected"
    );
    cancel.check()?;

    let outline = build_tree(&elements, config.chunking.section_title_chars);
    cancel.check()?;

    let chunks = chunk_outline(&outline, &config.chunking);
    tracing::info!(source = source_key, chunks = chunks.len(), "document chunked");
    cancel.check()?;

    let doc = IngestedDocument::new(
        source_key,
        DocumentParts {
            pages,
            normalized_pages,
            elements,
            outline,
            chunks,
        },
    );
    tracing::info!(
        source = source_key,
        ingestion_id = %doc.ingestion_id,
        indexed = doc.index.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ingestion complete"
    );
    Ok(doc)
}
