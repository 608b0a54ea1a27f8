//! The result of one full ingestion.
//!
//! An [`IngestedDocument`] is created once and never mutated; callers share
//! it behind an `Arc`. [`DocumentSnapshot`] is its serializable twin for
//! persisted caches. The search index is not serialized; it is rebuilt from
//! the chunks on restore.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::index::{index_chunks, SearchIndex};
use crate::models::{Chunk, NormalizedPage, Page, StructuralElement, StructureNode};

/// Pipeline outputs for one source, before indexing.
#[derive(Debug, Clone, Default)]
pub struct DocumentParts {
    pub pages: Vec<Page>,
    pub normalized_pages: Vec<NormalizedPage>,
    pub elements: Vec<StructuralElement>,
    pub outline: Vec<StructureNode>,
    pub chunks: Vec<Chunk>,
}

pub struct IngestedDocument {
    pub source_id: String,
    /// Unique per pipeline run; a cached document keeps its original id.
    pub ingestion_id: Uuid,
    pub pages: Vec<Page>,
    pub normalized_pages: Vec<NormalizedPage>,
    pub elements: Vec<StructuralElement>,
    pub outline: Vec<StructureNode>,
    pub chunks: Vec<Chunk>,
    pub index: Arc<dyn SearchIndex>,
    pub ingested_at: DateTime<Utc>,
}

impl IngestedDocument {
    /// Assemble a document with a freshly built index over `chunks`.
    pub fn new(source_id: impl Into<String>, parts: DocumentParts) -> Self {
        let index = Arc::new(index_chunks(&parts.chunks));
        Self::with_index(source_id, parts, index)
    }

    /// Assemble a document around an already built index.
    pub fn with_index(
        source_id: impl Into<String>,
        parts: DocumentParts,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            ingestion_id: Uuid::new_v4(),
            pages: parts.pages,
            normalized_pages: parts.normalized_pages,
            elements: parts.elements,
            outline: parts.outline,
            chunks: parts.chunks,
            index,
            ingested_at: Utc::now(),
        }
    }

    pub fn chunk(&self, id: &str) -> Option<&Chunk> {
        // ids are `chunk-<index>`; fall back to a scan for foreign ids
        id.strip_prefix("chunk-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|i| self.chunks.get(i))
            .filter(|c| c.id == id)
            .or_else(|| self.chunks.iter().find(|c| c.id == id))
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            source_id: self.source_id.clone(),
            ingestion_id: self.ingestion_id,
            pages: self.pages.clone(),
            normalized_pages: self.normalized_pages.clone(),
            elements: self.elements.clone(),
            outline: self.outline.clone(),
            chunks: self.chunks.clone(),
            ingested_at: self.ingested_at,
        }
    }

    /// Restore a cached document, re-indexing its chunks.
    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Self {
        let index = Arc::new(index_chunks(&snapshot.chunks));
        Self {
            source_id: snapshot.source_id,
            ingestion_id: snapshot.ingestion_id,
            pages: snapshot.pages,
            normalized_pages: snapshot.normalized_pages,
            elements: snapshot.elements,
            outline: snapshot.outline,
            chunks: snapshot.chunks,
            index,
            ingested_at: snapshot.ingested_at,
        }
    }
}

impl fmt::Debug for IngestedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestedDocument")
            .field("source_id", &self.source_id)
            .field("ingestion_id", &self.ingestion_id)
            .field("pages", &self.pages.len())
            .field("chunks", &self.chunks.len())
            .field("indexed", &self.index.len())
            .field("ingested_at", &self.ingested_at)
            .finish_non_exhaustive()
    }
}

/// Serializable form of an [`IngestedDocument`], without the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub source_id: String,
    pub ingestion_id: Uuid,
    pub pages: Vec<Page>,
    pub normalized_pages: Vec<NormalizedPage>,
    pub elements: Vec<StructuralElement>,
    pub outline: Vec<StructureNode>,
    pub chunks: Vec<Chunk>,
    pub ingested_at: DateTime<Utc>,
}
