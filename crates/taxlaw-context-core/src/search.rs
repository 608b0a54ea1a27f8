//! Query engine: retrieval with fallback tiers and context assembly.
//!
//! The engine operates entirely through an [`IngestedDocument`] and its
//! [`SearchIndex`](crate::index::SearchIndex); it holds no state of its own.
//!
//! # Retrieval chain
//!
//! 1. Search with the anchor-expanded query.
//! 2. If empty, search with the caller's raw query.
//! 3. If empty, search each of the first few query words (longer than two
//!    characters) and keep the first non-empty result set.
//! 4. If still empty, return the document's leading chunks with descending
//!    synthetic scores `0.1 / (i + 1)`.
//!
//! Search scores are normalized by the best hit of each search, then
//! filtered by `min_score`. A tier emptied by the filter falls through to
//! the next one; the final fallback is never filtered, so any document
//! with chunks always yields at least one result.
//!
//! # Context assembly
//!
//! [`chunks_for_ai`] picks high/medium results (or the top few when none
//! qualify), orders them by tier and anchor-boosted score and packs
//! formatted blocks into a token budget. The first block that overflows is
//! replaced by a short summary when that fits, and packing stops there.

use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::chunk::estimate_tokens;
use crate::document::IngestedDocument;
use crate::models::{Chunk, QueryResponse, QueryResult, Relevance, RetrievalStrategy};

/// Separator placed between context blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default number of results per query.
    pub limit: usize,
    /// Default minimum normalized score for search hits.
    pub min_score: f64,
    /// Default token budget for [`context_for`].
    pub max_context_tokens: usize,
    /// When a query lacks any of these (case-insensitive), it is expanded.
    pub anchor_terms: Vec<String>,
    /// Domain keywords appended by [`expand_query`].
    pub expansion_terms: Vec<String>,
    /// Known reference values appended by [`expand_query`].
    pub reference_values: Vec<String>,
    /// Sentences containing these survive summarization.
    pub summary_terms: Vec<String>,
    /// Added to a result's score when its chunk mentions an anchor term.
    pub anchor_bonus: f64,
    pub high_threshold: f64,
    pub medium_threshold: f64,
    /// At most this many chunks are considered for the context string.
    pub max_context_chunks: usize,
    /// Results used when none reach medium relevance.
    pub fallback_results: usize,
    /// Words tried individually by the word-level tier.
    pub word_fallback_words: usize,
    pub summary_max_chars: usize,
    /// Returned by [`context_for`] when there is nothing to show.
    pub empty_notice: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            min_score: 0.0,
            max_context_tokens: 2000,
            anchor_terms: strings(&["tax", "nigeria"]),
            expansion_terms: strings(&["Nigeria", "Tax", "Act", "2025"]),
            reference_values: Vec::new(),
            summary_terms: strings(&[
                "tax", "rate", "exempt", "relief", "deduct", "penalty", "shall", "%", "₦", "naira",
            ]),
            anchor_bonus: 0.1,
            high_threshold: 0.5,
            medium_threshold: 0.2,
            max_context_chunks: 8,
            fallback_results: 3,
            word_fallback_words: 3,
            summary_max_chars: 200,
            empty_notice: "No relevant content was found in the loaded tax document.".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Per-query overrides of the configured defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub limit: usize,
    pub min_score: f64,
}

impl QueryOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            limit: config.limit,
            min_score: config.min_score,
        }
    }
}

fn contains_ci(haystack_lower: &str, needle: &str) -> bool {
    haystack_lower.contains(&needle.to_lowercase())
}

/// Append expansion terms and reference values when `query` misses any
/// anchor term. Terms already present are not repeated.
pub fn expand_query(query: &str, config: &RetrievalConfig) -> String {
    let lower = query.to_lowercase();
    if config.anchor_terms.iter().all(|a| contains_ci(&lower, a)) {
        return query.to_string();
    }

    let mut expanded = query.trim().to_string();
    for term in config.expansion_terms.iter().chain(&config.reference_values) {
        if !contains_ci(&lower, term) && !contains_ci(&expanded.to_lowercase(), term) {
            if !expanded.is_empty() {
                expanded.push(' ');
            }
            expanded.push_str(term);
        }
    }
    expanded
}

/// Bucket a normalized score.
pub fn relevance_for(score: f64, config: &RetrievalConfig) -> Relevance {
    if score >= config.high_threshold {
        Relevance::High
    } else if score >= config.medium_threshold {
        Relevance::Medium
    } else {
        Relevance::Low
    }
}

/// Run one search, normalize by the top score and drop hits below `min_score`.
fn search_tier(
    doc: &IngestedDocument,
    query: &str,
    opts: QueryOptions,
    config: &RetrievalConfig,
) -> Vec<QueryResult> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let hits = doc.index.search(query, opts.limit);
    let top = hits.first().map(|h| h.1).unwrap_or(0.0);
    if top <= 0.0 {
        return Vec::new();
    }

    hits.into_iter()
        .filter_map(|(id, raw)| {
            let chunk = doc.chunk(&id)?;
            let score = raw / top;
            (score >= opts.min_score).then(|| QueryResult {
                chunk: chunk.clone(),
                score,
                relevance: relevance_for(score, config),
            })
        })
        .take(opts.limit)
        .collect()
}

/// Leading chunks in document order with strictly descending synthetic scores.
fn fallback_results(doc: &IngestedDocument, limit: usize, config: &RetrievalConfig) -> Vec<QueryResult> {
    doc.chunks
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, chunk)| {
            let score = 0.1 / (i + 1) as f64;
            QueryResult {
                chunk: chunk.clone(),
                score,
                relevance: relevance_for(score, config),
            }
        })
        .collect()
}

/// Query words eligible for the word-level tier.
fn fallback_words(query: &str, count: usize) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 2)
        .take(count)
        .map(|w| w.to_string())
        .collect()
}

/// Retrieve ranked chunks for `query`. Never empty when the document has
/// chunks and `opts.limit > 0`.
pub fn query_document(
    doc: &IngestedDocument,
    query: &str,
    opts: QueryOptions,
    config: &RetrievalConfig,
) -> QueryResponse {
    let respond = |results: Vec<QueryResult>, strategy: RetrievalStrategy| QueryResponse {
        total_results: results.len(),
        results,
        query: query.to_string(),
        strategy,
    };

    let expanded = expand_query(query, config);
    let results = search_tier(doc, &expanded, opts, config);
    if !results.is_empty() {
        let strategy = if expanded == query {
            RetrievalStrategy::Raw
        } else {
            RetrievalStrategy::Expanded
        };
        return respond(results, strategy);
    }

    if expanded != query {
        let results = search_tier(doc, query, opts, config);
        if !results.is_empty() {
            tracing::debug!(query, "expanded query matched nothing, raw query did");
            return respond(results, RetrievalStrategy::Raw);
        }
    }

    for word in fallback_words(query, config.word_fallback_words) {
        let results = search_tier(doc, &word, opts, config);
        if !results.is_empty() {
            tracing::debug!(query, word = %word, "falling back to word-level match");
            return respond(results, RetrievalStrategy::Word(word));
        }
    }

    tracing::debug!(query, "no match, returning leading chunks");
    respond(
        fallback_results(doc, opts.limit, config),
        RetrievalStrategy::Fallback,
    )
}

/// `[Part I > Section 3 - Pages 2-5]` followed by `body`.
pub fn format_block(chunk: &Chunk, body: &str) -> String {
    format!("[{} - {}]\n{}", chunk.section_label(), chunk.page_range.label(), body)
}

/// Shorten `text` to its first sentence plus every sentence mentioning a
/// summary term, capped at `summary_max_chars`.
pub fn summarize_chunk(text: &str, config: &RetrievalConfig) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for (i, sentence) in text.split_sentence_bounds().enumerate() {
        let trimmed = sentence.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();
        if i == 0 || config.summary_terms.iter().any(|t| contains_ci(&lower, t)) {
            kept.push(trimmed);
        }
    }
    let summary = kept.join(" ");
    truncate_chars(&summary, config.summary_max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn mentions_anchor(chunk: &Chunk, config: &RetrievalConfig) -> bool {
    let lower = chunk.content.to_lowercase();
    config.anchor_terms.iter().any(|a| contains_ci(&lower, a))
}

/// Pack the best results of `response` into a context string of at most
/// `max_tokens` estimated tokens, plus at most one summary block.
pub fn chunks_for_ai(response: &QueryResponse, max_tokens: usize, config: &RetrievalConfig) -> String {
    let mut candidates: Vec<(&QueryResult, f64)> = response
        .results
        .iter()
        .filter(|r| r.relevance >= Relevance::Medium)
        .map(|r| (r, r.score))
        .collect();
    if candidates.is_empty() {
        candidates = response
            .results
            .iter()
            .take(config.fallback_results)
            .map(|r| (r, r.score))
            .collect();
    }
    for (result, boosted) in candidates.iter_mut() {
        if mentions_anchor(&result.chunk, config) {
            *boosted += config.anchor_bonus;
        }
    }
    candidates.sort_by(|a, b| {
        b.0.relevance.cmp(&a.0.relevance).then(
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    candidates.truncate(config.max_context_chunks);

    let separator_tokens = estimate_tokens(BLOCK_SEPARATOR);
    let mut blocks: Vec<String> = Vec::new();
    let mut used = 0usize;
    for (result, _) in candidates {
        let joint = if blocks.is_empty() { 0 } else { separator_tokens };
        let block = format_block(&result.chunk, &result.chunk.content);
        let tokens = estimate_tokens(&block) + joint;
        if used + tokens <= max_tokens {
            used += tokens;
            blocks.push(block);
            continue;
        }

        let summary = summarize_chunk(&result.chunk.content, config);
        let short = format_block(&result.chunk, &summary);
        if !summary.is_empty() && used + estimate_tokens(&short) + joint <= max_tokens {
            blocks.push(short);
        }
        break;
    }

    blocks.join(BLOCK_SEPARATOR)
}

/// Query and assemble a context string, or the configured notice when
/// nothing can be shown.
pub fn context_for(
    doc: &IngestedDocument,
    query: &str,
    max_tokens: usize,
    config: &RetrievalConfig,
) -> String {
    if doc.chunks.is_empty() {
        return config.empty_notice.clone();
    }
    let response = query_document(doc, query, QueryOptions::from_config(config), config);
    let context = chunks_for_ai(&response, max_tokens, config);
    if context.is_empty() {
        config.empty_notice.clone()
    } else {
        context
    }
}
