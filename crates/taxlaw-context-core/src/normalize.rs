//! Page text normalization.
//!
//! Turns positioned [`TextFragment`]s into one cleaned text blob per page.
//!
//! # Algorithm
//!
//! 1. Rebuild lines from fragment baselines and collapse whitespace runs.
//!    A vertical gap wider than `paragraph_gap_ratio × font size` between two
//!    lines becomes a blank line.
//! 2. Merge line wraps: `tax-\nable → taxable`, and a newline between two
//!    lowercase letters becomes a single space.
//! 3. Strip running headers and footers: the first and last non-blank line
//!    of every page are compared case-insensitively (page numbers masked), and
//!    a line recurring on at least `max(min_pages, ratio × page count)` pages
//!    is removed from every page boundary it appears on.
//! 4. Rebuild paragraphs: a single newline becomes `\n\n` when the text before
//!    it ends a sentence and the text after it starts with a capital letter;
//!    otherwise it is folded into a space.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::models::{NormalizedPage, Page, TextFragment};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Maximum baseline difference (points) for two fragments to share a line.
    pub line_tolerance: f64,
    /// Gap between lines, in multiples of the font size, that starts a new paragraph.
    pub paragraph_gap_ratio: f64,
    /// Fraction of pages a boundary line must recur on to count as a header/footer.
    pub header_footer_ratio: f64,
    /// Absolute minimum number of pages for header/footer detection.
    pub header_footer_min_pages: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 2.0,
            paragraph_gap_ratio: 1.5,
            header_footer_ratio: 0.5,
            header_footer_min_pages: 2,
        }
    }
}

/// Normalize every page. Empty input yields empty output.
pub fn normalize_pages(pages: &[Page], config: &NormalizeConfig) -> Vec<NormalizedPage> {
    if pages.is_empty() {
        return Vec::new();
    }

    let merged: Vec<Vec<String>> = pages
        .iter()
        .map(|page| {
            let text = build_lines(&page.fragments, config).join("\n");
            merge_line_wraps(&text)
                .split('\n')
                .map(|l| l.to_string())
                .collect()
        })
        .collect();

    let repeating = find_repeating_boundary_lines(&merged, config);

    pages
        .iter()
        .zip(merged)
        .map(|(page, lines)| {
            let lines = strip_boundary_lines(lines, &repeating);
            NormalizedPage {
                page_number: page.page_number,
                text: rebuild_paragraphs(&lines.join("\n")),
            }
        })
        .collect()
}

/// Group fragments into whitespace-collapsed lines by baseline.
///
/// Blank entries mark paragraph-sized vertical gaps.
fn build_lines(fragments: &[TextFragment], config: &NormalizeConfig) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut line_y: Option<f64> = None;
    let mut line_font = 0.0_f64;

    for frag in fragments {
        let text = collapse_whitespace(&frag.text);
        if text.is_empty() {
            continue;
        }
        match line_y {
            Some(y) if (frag.y - y).abs() <= config.line_tolerance => {
                current.push(' ');
                current.push_str(&text);
                line_font = line_font.max(frag.font_size);
            }
            Some(y) => {
                lines.push(std::mem::take(&mut current));
                if frag.y - y > config.paragraph_gap_ratio * line_font.max(frag.font_size) {
                    lines.push(String::new());
                }
                current.push_str(&text);
                line_y = Some(frag.y);
                line_font = frag.font_size;
            }
            None => {
                current.push_str(&text);
                line_y = Some(frag.y);
                line_font = frag.font_size;
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Merge hyphenated and lowercase-to-lowercase line wraps.
fn merge_line_wraps(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '-'
            && i > 0
            && chars[i - 1].is_alphabetic()
            && chars.get(i + 1) == Some(&'\n')
            && chars.get(i + 2).is_some_and(|n| n.is_lowercase())
        {
            // Drop both the hyphen and the newline.
            i += 2;
            continue;
        }
        if c == '\n'
            && i > 0
            && chars[i - 1].is_lowercase()
            && chars.get(i + 1).is_some_and(|n| n.is_lowercase())
        {
            out.push(' ');
            i += 1;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Comparison key for header/footer detection.
///
/// Lower-cased; digit runs are masked to `#` only when the whole line is a
/// page number (`12`, `- 12 -`, `Page 12 of 30`), so numbered headings such
/// as `CHAPTER 1` and `CHAPTER 2` stay distinct.
fn boundary_key(line: &str) -> String {
    let lower = collapse_whitespace(line).to_lowercase();
    let mut masked = String::with_capacity(lower.len());
    let mut in_digits = false;
    for c in lower.chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                masked.push('#');
            }
            in_digits = true;
        } else {
            masked.push(c);
            in_digits = false;
        }
    }
    if is_page_number_line(&masked) {
        masked
    } else {
        lower
    }
}

fn is_page_number_line(masked: &str) -> bool {
    let mut saw_number = false;
    for token in masked
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '/' | '|'))
        .filter(|t| !t.is_empty())
    {
        match token {
            "#" => saw_number = true,
            "page" | "pg" | "p." | "of" => {}
            _ => return false,
        }
    }
    saw_number
}

fn first_and_last_non_blank(lines: &[String]) -> (Option<usize>, Option<usize>) {
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    (first, last)
}

fn find_repeating_boundary_lines(
    pages: &[Vec<String>],
    config: &NormalizeConfig,
) -> HashSet<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for lines in pages {
        let (first, last) = first_and_last_non_blank(lines);
        let mut seen: HashSet<String> = HashSet::new();
        for idx in [first, last].into_iter().flatten() {
            seen.insert(boundary_key(&lines[idx]));
        }
        for key in seen {
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    let threshold = (config.header_footer_min_pages as f64)
        .max(config.header_footer_ratio * pages.len() as f64);

    counts
        .into_iter()
        .filter(|(key, count)| !key.is_empty() && *count as f64 >= threshold)
        .map(|(key, _)| key)
        .collect()
}

fn strip_boundary_lines(mut lines: Vec<String>, repeating: &HashSet<String>) -> Vec<String> {
    if repeating.is_empty() {
        return lines;
    }
    let (first, _) = first_and_last_non_blank(&lines);
    if let Some(idx) = first {
        if repeating.contains(&boundary_key(&lines[idx])) {
            lines.remove(idx);
        }
    }
    let (_, last) = first_and_last_non_blank(&lines);
    if let Some(idx) = last {
        if repeating.contains(&boundary_key(&lines[idx])) {
            lines.remove(idx);
        }
    }
    lines
}

fn ends_sentence(text: &str) -> bool {
    let trimmed = text.trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | ')' | '\u{201D}' | '\u{2019}')
    });
    trimmed.ends_with(['.', '!', '?'])
}

/// Turn single newlines into paragraph breaks or spaces.
fn rebuild_paragraphs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Blank lines are explicit paragraph breaks and are preserved as-is.
    let mut paragraphs: Vec<String> = Vec::new();
    for block in text.split("\n\n") {
        let lines: Vec<&str> = block
            .split('\n')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            continue;
        }
        let mut para = String::from(lines[0]);
        for next in &lines[1..] {
            let starts_upper = next.chars().next().is_some_and(|c| c.is_uppercase());
            if ends_sentence(&para) && starts_upper {
                paragraphs.push(std::mem::take(&mut para));
            } else {
                para.push(' ');
            }
            para.push_str(next);
        }
        paragraphs.push(para);
    }
    for (i, p) in paragraphs.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(p.trim());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, y: f64, page: u32) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            font_size: 12.0,
            x: 72.0,
            y,
            page_number: page,
            font_name: None,
        }
    }

    fn page(number: u32, lines: &[&str]) -> Page {
        Page {
            page_number: number,
            fragments: lines
                .iter()
                .enumerate()
                .map(|(i, l)| frag(l, 72.0 + i as f64 * 14.0, number))
                .collect(),
        }
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(normalize_pages(&[], &NormalizeConfig::default()).is_empty());
    }

    #[test]
    fn test_collapses_whitespace_and_joins_same_line() {
        let p = Page {
            page_number: 1,
            fragments: vec![frag("Income   tax", 100.0, 1), frag("is\tdue.", 100.5, 1)],
        };
        let out = normalize_pages(&[p], &NormalizeConfig::default());
        assert_eq!(out[0].text, "Income tax is due.");
    }

    #[test]
    fn test_merges_hyphenated_wrap() {
        let out = normalize_pages(
            &[page(1, &["The income is tax-", "able in Nigeria."])],
            &NormalizeConfig::default(),
        );
        assert_eq!(out[0].text, "The income is taxable in Nigeria.");
    }

    #[test]
    fn test_lowercase_wrap_merges_with_space() {
        let out = normalize_pages(
            &[page(1, &["every person shall", "pay the tax."])],
            &NormalizeConfig::default(),
        );
        assert_eq!(out[0].text, "every person shall pay the tax.");
    }

    #[test]
    fn test_sentence_end_and_capital_starts_paragraph() {
        let out = normalize_pages(
            &[page(1, &["The tax is due.", "Penalties apply", "after the deadline."])],
            &NormalizeConfig::default(),
        );
        assert_eq!(
            out[0].text,
            "The tax is due.\n\nPenalties apply after the deadline."
        );
    }

    #[test]
    fn test_vertical_gap_becomes_paragraph_break() {
        let p = Page {
            page_number: 1,
            fragments: vec![
                frag("CHAPTER 1", 72.0, 1),
                frag("Imposition of tax", 120.0, 1),
            ],
        };
        let out = normalize_pages(&[p], &NormalizeConfig::default());
        assert_eq!(out[0].text, "CHAPTER 1\n\nImposition of tax");
    }

    #[test]
    fn test_running_footer_removed_from_all_pages() {
        let pages = vec![
            page(1, &["First page body text.", "Page 1 of 3"]),
            page(2, &["Second page body text.", "Page 2 of 3"]),
            page(3, &["Third page body text.", "Page 3 of 3"]),
        ];
        let out = normalize_pages(&pages, &NormalizeConfig::default());
        assert_eq!(out.len(), 3);
        for p in &out {
            assert!(!p.text.contains("Page"), "footer survived: {}", p.text);
        }
        assert_eq!(out[1].text, "Second page body text.");
    }

    #[test]
    fn test_running_header_case_insensitive() {
        let pages = vec![
            page(1, &["NIGERIA TAX ACT, 2025", "Alpha."]),
            page(2, &["Nigeria Tax Act, 2025", "Beta."]),
        ];
        let out = normalize_pages(&pages, &NormalizeConfig::default());
        assert_eq!(out[0].text, "Alpha.");
        assert_eq!(out[1].text, "Beta.");
    }

    #[test]
    fn test_single_page_keeps_boundary_lines() {
        let out = normalize_pages(
            &[page(1, &["Header line", "Body.", "Footer line"])],
            &NormalizeConfig::default(),
        );
        assert!(out[0].text.contains("Header line"));
        assert!(out[0].text.contains("Footer line"));
    }

    #[test]
    fn test_empty_page_keeps_its_number() {
        let pages = vec![Page::empty(1), page(2, &["Body."])];
        let out = normalize_pages(&pages, &NormalizeConfig::default());
        assert_eq!(out[0].page_number, 1);
        assert_eq!(out[0].text, "");
        assert_eq!(out[1].text, "Body.");
    }

    #[test]
    fn test_boundary_key_masks_page_numbers_only() {
        assert_eq!(boundary_key("Page 12 of 30"), boundary_key("page 3 of 30"));
        assert_eq!(boundary_key("- 4 -"), boundary_key("- 5 -"));
        assert_eq!(boundary_key("7"), boundary_key("8"));
        assert_ne!(boundary_key("CHAPTER 1"), boundary_key("CHAPTER 2"));
        assert_ne!(boundary_key("Section 12"), boundary_key("Section 13"));
    }

    #[test]
    fn test_numbered_chapter_headings_survive() {
        let pages = vec![
            page(1, &["CHAPTER 1", "Imposition of tax.", "Page 1 of 3"]),
            page(2, &["CHAPTER 2", "Companies income tax.", "Page 2 of 3"]),
            page(3, &["CHAPTER 3", "Value added tax.", "Page 3 of 3"]),
        ];
        let out = normalize_pages(&pages, &NormalizeConfig::default());
        for (i, p) in out.iter().enumerate() {
            let heading = format!("CHAPTER {}", i + 1);
            assert!(p.text.starts_with(&heading), "heading lost: {:?}", p.text);
            assert!(!p.text.contains("of 3"), "footer survived: {:?}", p.text);
        }
    }
}
