//! Core data models used throughout Tax Law Context.
//!
//! These types represent the pages, structural elements, outline nodes,
//! chunks, and query results that flow through the ingestion and retrieval
//! pipeline. Everything here is plain data: owned, `Clone`, and
//! serializable so a whole ingestion can be snapshotted into a cache.

use serde::{Deserialize, Serialize};

/// A positioned run of text extracted from a PDF page.
///
/// `y` uses a top-down convention: `0.0` is the top edge of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub font_size: f64,
    pub x: f64,
    pub y: f64,
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
}

/// One extracted page with its fragments in content-stream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub fragments: Vec<TextFragment>,
}

impl Page {
    pub fn empty(page_number: u32) -> Self {
        Self {
            page_number,
            fragments: Vec::new(),
        }
    }
}

/// One cleaned text blob per page, paragraphs separated by `\n\n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPage {
    pub page_number: u32,
    pub text: String,
}

/// Classification of a paragraph-level unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Heading,
    Paragraph,
    ListItem,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Heading => "heading",
            ElementKind::Paragraph => "paragraph",
            ElementKind::ListItem => "list-item",
        }
    }
}

/// Level assigned to paragraphs and list items.
///
/// Body text sits below every heading depth, so it never closes an open
/// heading in the structure builder.
pub const BODY_LEVEL: u8 = u8::MAX;

/// A classified paragraph, as produced by the structure detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralElement {
    pub kind: ElementKind,
    pub level: u8,
    pub text: String,
    pub page_number: u32,
    /// Heading confidence for headings; `1 - heading confidence` otherwise.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numbering: Option<String>,
}

/// Inclusive page span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    pub fn contains(&self, other: &PageRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: &PageRange) -> PageRange {
        PageRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// `Page 3` or `Pages 3-5`.
    pub fn label(&self) -> String {
        if self.start == self.end {
            format!("Page {}", self.start)
        } else {
            format!("Pages {}-{}", self.start, self.end)
        }
    }
}

/// A node in the document outline.
///
/// Children are owned; `parent_id` is a back-reference only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureNode {
    pub id: String,
    pub kind: ElementKind,
    pub level: u8,
    pub text: String,
    pub page_number: u32,
    pub page_range: PageRange,
    pub children: Vec<StructureNode>,
    pub parent_id: Option<String>,
    pub section_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numbering: Option<String>,
}

/// A token-bounded, retrievable unit of document text with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub index: usize,
    pub content: String,
    pub section_path: Vec<String>,
    pub page_range: PageRange,
    pub node_ids: Vec<String>,
    pub token_estimate: usize,
}

impl Chunk {
    /// `Part I > Section 3` style label, or `Document` for untitled content.
    pub fn section_label(&self) -> String {
        if self.section_path.is_empty() {
            "Document".to_string()
        } else {
            self.section_path.join(" > ")
        }
    }
}

/// Coarse relevance bucket derived from a normalized score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Low,
    Medium,
    High,
}

impl Relevance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relevance::High => "high",
            Relevance::Medium => "medium",
            Relevance::Low => "low",
        }
    }
}

/// Which stage of the retrieval chain produced a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "term", rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// The anchor-expanded query matched.
    Expanded,
    /// The caller's raw query matched.
    Raw,
    /// A single query word matched.
    Word(String),
    /// Nothing matched; leading chunks were returned in document order.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub chunk: Chunk,
    pub score: f64,
    pub relevance: Relevance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<QueryResult>,
    pub total_results: usize,
    pub query: String,
    pub strategy: RetrievalStrategy,
}
