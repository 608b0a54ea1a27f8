//! Full-text search abstraction for Tax Law Context.
//!
//! The [`SearchIndex`] trait is the only capability the query engine needs
//! from a search backend: add a text under an id, and return ranked ids
//! for a query. Any inverted-index, BM25 or trigram engine satisfies it,
//! so the ranking and fallback logic in [`crate::search`] never depends on
//! a particular engine.
//!
//! An index is built once per ingested document and only read afterwards,
//! so implementations must be `Send + Sync` to be shared across tasks.

pub mod memory;

pub use memory::Bm25Index;

use crate::models::Chunk;

/// Minimal full-text search capability.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`index`](SearchIndex::index) | Add a document text under `id` |
/// | [`search`](SearchIndex::search) | Ranked `(id, raw score)` pairs, best first |
pub trait SearchIndex: Send + Sync {
    /// Add `text` under `id`. Indexing the same id twice adds a second entry.
    fn index(&mut self, id: &str, text: &str);

    /// Return at most `limit` hits, highest raw score first.
    ///
    /// Scores are engine-specific and only comparable within one call.
    fn search(&self, query: &str, limit: usize) -> Vec<(String, f64)>;

    /// Number of indexed entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the default engine over chunk contents, keyed by chunk id.
pub fn index_chunks(chunks: &[Chunk]) -> Bm25Index {
    let mut index = Bm25Index::new();
    for chunk in chunks {
        index.index(&chunk.id, &chunk.content);
    }
    index
}

/// Lower-cased alphanumeric terms of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Section 3(1): VAT is 7.5%!"),
            vec!["section", "3", "1", "vat", "is", "7", "5"]
        );
        assert!(tokenize("  --  ").is_empty());
    }
}
