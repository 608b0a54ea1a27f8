//! Positional PDF text extraction.
//!
//! Pages are rendered one at a time through `pdf-extract`'s [`OutputDev`]
//! callbacks over a `lopdf` document. Glyphs are grouped into word
//! fragments carrying their position and effective font size, with the
//! vertical axis flipped so `y` grows downwards from the top of the page.
//!
//! A page that fails to render (error or panic) degrades to an empty
//! [`Page`]; extraction only fails when the document cannot be loaded or
//! every page comes back empty.

use std::panic::{self, AssertUnwindSafe};

use lopdf::Document;
use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};

use taxlaw_context_core::models::{Page, TextFragment};

use crate::error::{IngestError, Result};

/// Font size assumed when the text matrix is degenerate.
const DEFAULT_FONT_SIZE: f64 = 12.0;

/// Horizontal gap, in multiples of the font size, that separates two words.
const WORD_GAP_RATIO: f64 = 0.25;

/// Extract every page of `bytes`.
pub fn extract_pages(bytes: &[u8], line_tolerance: f64) -> Result<Vec<Page>> {
    let mut doc = Document::load_mem(bytes)
        .map_err(|e| IngestError::Extraction(format!("failed to load PDF: {}", e)))?;

    if doc.is_encrypted() {
        if let Err(e) = doc.decrypt("") {
            tracing::warn!(error = %e, "encrypted PDF could not be opened with an empty password");
        }
    }

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(IngestError::Extraction("PDF has no pages".to_string()));
    }

    let pages: Vec<Page> = page_numbers
        .into_iter()
        .map(|n| extract_page(&doc, n, line_tolerance))
        .collect();

    if pages.iter().all(|p| p.fragments.is_empty()) {
        return Err(IngestError::Extraction(format!(
            "no text found on any of {} pages",
            pages.len()
        )));
    }

    tracing::info!(
        pages = pages.len(),
        fragments = pages.iter().map(|p| p.fragments.len()).sum::<usize>(),
        "pdf extracted"
    );
    Ok(pages)
}

fn extract_page(doc: &Document, page_number: u32, line_tolerance: f64) -> Page {
    let mut collector = FragmentCollector::new(page_number, line_tolerance);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::output_doc_page(doc, &mut collector, page_number)
    }));
    match outcome {
        Ok(Ok(())) => collector.into_page(),
        Ok(Err(e)) => {
            tracing::warn!(page = page_number, error = ?e, "page extraction failed, leaving it empty");
            Page::empty(page_number)
        }
        Err(_) => {
            tracing::warn!(page = page_number, "page extraction panicked, leaving it empty");
            Page::empty(page_number)
        }
    }
}

struct PendingWord {
    text: String,
    x: f64,
    y: f64,
    font_size: f64,
    /// Where the next glyph of this word is expected to start.
    end_x: f64,
}

/// [`OutputDev`] that records word fragments for one page.
struct FragmentCollector {
    page_number: u32,
    line_tolerance: f64,
    top: f64,
    fragments: Vec<TextFragment>,
    pending: Option<PendingWord>,
}

impl FragmentCollector {
    fn new(page_number: u32, line_tolerance: f64) -> Self {
        Self {
            page_number,
            line_tolerance,
            top: 0.0,
            fragments: Vec::new(),
            pending: None,
        }
    }

    fn flush(&mut self) {
        if let Some(word) = self.pending.take() {
            let text = word.text.trim();
            if !text.is_empty() {
                self.fragments.push(TextFragment {
                    text: text.to_string(),
                    font_size: word.font_size,
                    x: word.x,
                    y: word.y,
                    page_number: self.page_number,
                    font_name: None,
                });
            }
        }
    }

    fn into_page(mut self) -> Page {
        self.flush();
        Page {
            page_number: self.page_number,
            fragments: self.fragments,
        }
    }
}

/// Larger axis scale of the text matrix times the nominal size.
fn effective_font_size(trm: &Transform, font_size: f64) -> f64 {
    let size = trm.m11.abs().max(trm.m22.abs()) * font_size;
    if size.is_finite() && size > 0.0 {
        size
    } else {
        DEFAULT_FONT_SIZE
    }
}

impl OutputDev for FragmentCollector {
    fn begin_page(
        &mut self,
        _page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> std::result::Result<(), OutputError> {
        self.top = media_box.ury;
        Ok(())
    }

    fn end_page(&mut self) -> std::result::Result<(), OutputError> {
        self.flush();
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> std::result::Result<(), OutputError> {
        if char.trim().is_empty() {
            self.flush();
            return Ok(());
        }

        let size = effective_font_size(trm, font_size);
        let x = trm.m31;
        let y = self.top - trm.m32;
        let advance = width * size;

        let continues = self.pending.as_ref().is_some_and(|word| {
            (word.y - y).abs() <= self.line_tolerance
                && x >= word.x
                && x - word.end_x <= WORD_GAP_RATIO * size
        });
        if !continues {
            self.flush();
        }

        match self.pending.as_mut() {
            Some(word) => {
                word.text.push_str(char);
                word.end_x = x + advance;
                word.font_size = word.font_size.max(size);
            }
            None => {
                self.pending = Some(PendingWord {
                    text: char.to_string(),
                    x,
                    y,
                    font_size: size,
                    end_x: x + advance,
                });
            }
        }
        Ok(())
    }

    fn begin_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> std::result::Result<(), OutputError> {
        self.flush();
        Ok(())
    }
}
