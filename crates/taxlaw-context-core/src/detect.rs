//! Heuristic structure detection over normalized pages.
//!
//! Each blank-line-separated paragraph is scored for "heading-ness" from
//! its numbering label, capitalization, length, and leading keyword. The
//! weights live in [`DetectionConfig`] so they can be tuned and tested
//! independently of the detection logic.
//!
//! ```text
//! confidence = clamp01( numbering_weight · [numbered]
//!                     + all_caps_weight  · [ALL CAPS]
//!                     + font_size_weight · font_size_score
//!                     + length adjustment (+short_bonus / −long_penalty)
//!                     + keyword_weight   · [starts with heading keyword] )
//! ```
//!
//! Font metadata does not survive normalization, so `font_size_score` is a
//! constant (neutral `0.5` by default) rather than a per-paragraph signal.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::models::{ElementKind, NormalizedPage, StructuralElement, BODY_LEVEL};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub numbering_weight: f64,
    pub all_caps_weight: f64,
    pub font_size_weight: f64,
    /// Font-size dominance score fed to `font_size_weight`; `0.5` is neutral.
    pub font_size_score: f64,
    pub short_bonus: f64,
    /// Paragraphs shorter than this (chars) get `short_bonus`.
    pub short_chars: usize,
    pub long_penalty: f64,
    /// Paragraphs longer than this (chars) get `long_penalty`.
    pub long_chars: usize,
    pub keyword_weight: f64,
    /// A paragraph is a heading when its confidence is strictly above this.
    pub heading_threshold: f64,
    /// Minimum letters for the all-caps test.
    pub min_caps_letters: usize,
    pub heading_keywords: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            numbering_weight: 0.4,
            all_caps_weight: 0.3,
            font_size_weight: 0.2,
            font_size_score: 0.5,
            short_bonus: 0.1,
            short_chars: 100,
            long_penalty: 0.2,
            long_chars: 200,
            keyword_weight: 0.2,
            heading_threshold: 0.5,
            min_caps_letters: 3,
            heading_keywords: ["section", "chapter", "part", "article", "subsection"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Signals computed for one paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingScore {
    pub confidence: f64,
    pub numbering: Option<String>,
    /// Dot-depth of the numbering label (`1.2.3` → 3); `None` when unnumbered.
    pub numbering_depth: Option<u8>,
    pub all_caps: bool,
}

/// Compiled detector. Build once per ingestion and reuse across pages.
pub struct StructureDetector {
    config: DetectionConfig,
    chapter: Regex,
    part: Regex,
    dotted: Regex,
    lettered: Regex,
    roman: Regex,
    list_item: Regex,
    paragraph_break: Regex,
}

impl StructureDetector {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        Ok(Self {
            config,
            chapter: Regex::new(r"^(?:CHAPTER|Chapter)\s+(?:[IVXLCDM]+|\d+|[A-Z][A-Za-z]*)\b")
                .context("failed to compile chapter regex")?,
            part: Regex::new(r"^(?:PART|Part)\s+(?:[IVXLCDM]+|[A-Z][A-Za-z]*)\b")
                .context("failed to compile part regex")?,
            dotted: Regex::new(r"^(\d{1,3}(?:\.\d{1,3})*)\.?(?:\s|$)")
                .context("failed to compile dotted numbering regex")?,
            lettered: Regex::new(r"^(\([A-Za-z]\)|[A-Z]\.)(?:\s|$)")
                .context("failed to compile lettered numbering regex")?,
            roman: Regex::new(r"^([IVXLCDM]+\.|\([ivxlcdm]+\))(?:\s|$)")
                .context("failed to compile roman numbering regex")?,
            list_item: Regex::new(r"^(?:[•▪◦‣●\-\*–]\s|\(?\d+[.)]\s|\([a-z]\)\s)")
                .context("failed to compile list item regex")?,
            paragraph_break: Regex::new(r"\n[ \t]*\n")
                .context("failed to compile paragraph break regex")?,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Classify every paragraph of every page, in document order.
    pub fn detect(&self, pages: &[NormalizedPage]) -> Vec<StructuralElement> {
        let mut elements = Vec::new();
        for page in pages {
            for para in self.paragraph_break.split(&page.text) {
                let text = para.trim();
                if text.is_empty() {
                    continue;
                }
                elements.push(self.classify(text, page.page_number));
            }
        }
        tracing::debug!(
            elements = elements.len(),
            headings = elements
                .iter()
                .filter(|e| e.kind == ElementKind::Heading)
                .count(),
            "structure detected"
        );
        elements
    }

    pub fn classify(&self, text: &str, page_number: u32) -> StructuralElement {
        let score = self.score(text);
        if score.confidence > self.config.heading_threshold {
            let level = match score.numbering_depth {
                Some(depth) => depth,
                None if score.all_caps && text.chars().count() < self.config.short_chars => 1,
                None => 2,
            };
            StructuralElement {
                kind: ElementKind::Heading,
                level,
                text: text.to_string(),
                page_number,
                confidence: score.confidence,
                numbering: score.numbering,
            }
        } else {
            let kind = if self.list_item.is_match(text) {
                ElementKind::ListItem
            } else {
                ElementKind::Paragraph
            };
            StructuralElement {
                kind,
                level: BODY_LEVEL,
                text: text.to_string(),
                page_number,
                confidence: 1.0 - score.confidence,
                numbering: score.numbering,
            }
        }
    }

    pub fn score(&self, text: &str) -> HeadingScore {
        let cfg = &self.config;
        let (numbering, numbering_depth) = match self.numbering(text) {
            Some((label, depth)) => (Some(label), Some(depth)),
            None => (None, None),
        };
        let all_caps = is_all_caps(text, cfg.min_caps_letters);

        let len = text.chars().count();
        let length_adjustment = if len < cfg.short_chars {
            cfg.short_bonus
        } else if len > cfg.long_chars {
            -cfg.long_penalty
        } else {
            0.0
        };

        let lower = text.to_lowercase();
        let keyword = cfg
            .heading_keywords
            .iter()
            .any(|k| lower.starts_with(&k.to_lowercase()));

        let mut confidence = cfg.font_size_weight * cfg.font_size_score + length_adjustment;
        if numbering.is_some() {
            confidence += cfg.numbering_weight;
        }
        if all_caps {
            confidence += cfg.all_caps_weight;
        }
        if keyword {
            confidence += cfg.keyword_weight;
        }

        HeadingScore {
            confidence: confidence.clamp(0.0, 1.0),
            numbering,
            numbering_depth,
            all_caps,
        }
    }

    /// First matching numbering label in priority order: chapter, part,
    /// dotted numeric, lettered, roman.
    pub fn numbering(&self, text: &str) -> Option<(String, u8)> {
        if let Some(m) = self.chapter.find(text) {
            return Some((m.as_str().trim().to_string(), 1));
        }
        if let Some(m) = self.part.find(text) {
            return Some((m.as_str().trim().to_string(), 1));
        }
        if let Some(c) = self.dotted.captures(text) {
            let label = c[1].to_string();
            let depth = label.split('.').count().min(u8::MAX as usize) as u8;
            return Some((label, depth));
        }
        if let Some(c) = self.lettered.captures(text) {
            return Some((c[1].to_string(), 1));
        }
        if let Some(c) = self.roman.captures(text) {
            return Some((c[1].to_string(), 1));
        }
        None
    }
}

/// True when the letters of `text` are all uppercase and there are enough of them.
pub fn is_all_caps(text: &str, min_letters: usize) -> bool {
    let letters: String = text.chars().filter(|c| c.is_alphabetic()).collect();
    letters.chars().count() >= min_letters
        && letters == letters.to_uppercase()
        && letters != letters.to_lowercase()
}
