//! Outline-aware chunker.
//!
//! Walks the outline in document order and packs node texts into
//! [`Chunk`]s bounded by estimated token counts. Heading boundaries are
//! preferred as break points once a chunk is large enough; nodes too large
//! for a single chunk are split on sentence boundaries and emitted on their
//! own.
//!
//! # Algorithm
//!
//! For each node, with an optional open chunk:
//!
//! 1. If the node alone exceeds `max_tokens`, close the open chunk and
//!    greedily pack the node's sentences into standalone sub-chunks.
//! 2. Otherwise close the open chunk first when adding the node would
//!    exceed `max_tokens`, or when the chunk already holds `min_tokens`,
//!    the node is a heading, and adding it would exceed `target_tokens`.
//! 3. Append the node, widen the page range and adopt the node's section
//!    path when it is more specific.
//!
//! Every node lands in exactly one chunk, in order.
//!
//! # Example
//!
//! ```rust
//! use taxlaw_context_core::chunk::{chunk_outline, ChunkLimits};
//! use taxlaw_context_core::models::{ElementKind, StructuralElement, BODY_LEVEL};
//! use taxlaw_context_core::structure::build_tree;
//!
//! let elements = vec![StructuralElement {
//!     kind: ElementKind::Paragraph,
//!     level: BODY_LEVEL,
//!     text: "Tax is payable on chargeable income.".to_string(),
//!     page_number: 1,
//!     confidence: 0.8,
//!     numbering: None,
//! }];
//! let limits = ChunkLimits::default();
//! let chunks = chunk_outline(&build_tree(&elements, limits.section_title_chars), &limits);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id, "chunk-0");
//! ```

use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::models::{Chunk, ElementKind, PageRange, StructureNode};
use crate::structure::flatten;

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

const NODE_SEPARATOR: &str = "\n\n";

/// Size bounds for chunks, in estimated tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkLimits {
    pub target_tokens: usize,
    pub min_tokens: usize,
    pub max_tokens: usize,
    /// Heading titles are cut to this many characters in section paths.
    pub section_title_chars: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            target_tokens: 600,
            min_tokens: 500,
            max_tokens: 800,
            section_title_chars: 50,
        }
    }
}

/// `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

struct OpenChunk {
    content: String,
    chars: usize,
    section_path: Vec<String>,
    page_range: PageRange,
    node_ids: Vec<String>,
}

impl OpenChunk {
    fn start(node: &StructureNode) -> Self {
        Self {
            content: node.text.clone(),
            chars: node.text.chars().count(),
            section_path: node.section_path.clone(),
            page_range: PageRange::single(node.page_number),
            node_ids: vec![node.id.clone()],
        }
    }

    /// Estimated tokens if `node` were appended.
    fn tokens_with(&self, node: &StructureNode) -> usize {
        (self.chars + NODE_SEPARATOR.len() + node.text.chars().count()).div_ceil(CHARS_PER_TOKEN)
    }

    fn tokens(&self) -> usize {
        self.chars.div_ceil(CHARS_PER_TOKEN)
    }

    fn push(&mut self, node: &StructureNode) {
        self.content.push_str(NODE_SEPARATOR);
        self.content.push_str(&node.text);
        self.chars += NODE_SEPARATOR.len() + node.text.chars().count();
        self.page_range = self.page_range.union(&PageRange::single(node.page_number));
        if node.section_path.len() > self.section_path.len() {
            self.section_path = node.section_path.clone();
        }
        self.node_ids.push(node.id.clone());
    }
}

struct ChunkSink {
    chunks: Vec<Chunk>,
}

impl ChunkSink {
    fn emit(
        &mut self,
        content: String,
        section_path: Vec<String>,
        page_range: PageRange,
        node_ids: Vec<String>,
    ) {
        let index = self.chunks.len();
        let token_estimate = estimate_tokens(&content);
        self.chunks.push(Chunk {
            id: format!("chunk-{}", index),
            index,
            content,
            section_path,
            page_range,
            node_ids,
            token_estimate,
        });
    }

    fn close(&mut self, open: Option<OpenChunk>) {
        if let Some(open) = open {
            self.emit(open.content, open.section_path, open.page_range, open.node_ids);
        }
    }
}

/// Chunk the outline rooted at `roots`.
pub fn chunk_outline(roots: &[StructureNode], limits: &ChunkLimits) -> Vec<Chunk> {
    let mut sink = ChunkSink { chunks: Vec::new() };
    let mut open: Option<OpenChunk> = None;

    for node in flatten(roots) {
        if estimate_tokens(&node.text) > limits.max_tokens {
            sink.close(open.take());
            for piece in pack_sentences(&node.text, limits.max_tokens) {
                sink.emit(
                    piece,
                    node.section_path.clone(),
                    PageRange::single(node.page_number),
                    vec![node.id.clone()],
                );
            }
            continue;
        }

        let mut current = match open.take() {
            None => {
                open = Some(OpenChunk::start(node));
                continue;
            }
            Some(current) => current,
        };

        let projected = current.tokens_with(node);
        let over_max = projected > limits.max_tokens;
        let heading_break = current.tokens() >= limits.min_tokens
            && node.kind == ElementKind::Heading
            && projected > limits.target_tokens;

        if over_max || heading_break {
            sink.close(Some(current));
            open = Some(OpenChunk::start(node));
        } else {
            current.push(node);
            open = Some(current);
        }
    }
    sink.close(open);

    tracing::debug!(chunks = sink.chunks.len(), "outline chunked");
    sink.chunks
}

/// Greedily pack sentences into pieces of at most `max_tokens`.
///
/// A single sentence longer than the limit becomes its own piece.
fn pack_sentences(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let mut pieces = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for sentence in text.split_sentence_bounds() {
        let len = sentence.chars().count();
        if buf_chars > 0 && buf_chars + len > max_chars {
            push_piece(&mut pieces, &buf);
            buf.clear();
            buf_chars = 0;
        }
        buf.push_str(sentence);
        buf_chars += len;
    }
    push_piece(&mut pieces, &buf);
    pieces
}

fn push_piece(pieces: &mut Vec<String>, buf: &str) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        pieces.push(trimmed.to_string());
    }
}
