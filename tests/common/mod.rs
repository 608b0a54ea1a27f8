//! Hand-assembled PDFs for the integration tests.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// One line of text: `(font size, x, y from the bottom, text)`.
pub type Line = (i64, i64, i64, &'static str);

/// Build a PDF with one page per entry of `pages`, Helvetica throughout.
pub fn build_pdf(pages: &[Vec<Line>]) -> Vec<u8> {
    let fonts = vec!["F1"; pages.len()];
    build_pdf_with_fonts(pages, &fonts)
}

/// Like [`build_pdf`], but page `i` selects font resource `fonts[i]`.
/// Only `F1` is defined, so any other name references a missing font.
pub fn build_pdf_with_fonts(pages: &[Vec<Line>], fonts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for (lines, &font) in pages.iter().zip(fonts) {
        let mut operations = Vec::new();
        for &(size, x, y, text) in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![font.into(), size.into()]));
            operations.push(Operation::new("Td", vec![x.into(), y.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Three-page excerpt of a tax act with a running footer.
pub fn tax_act_pdf() -> Vec<u8> {
    build_pdf(&[
        vec![
            (16, 72, 780, "PART I OBJECTIVE AND APPLICATION"),
            (12, 72, 730, "1. Objective"),
            (12, 72, 690, "The objective of this Act is to consolidate the laws on taxation in Nigeria."),
            (12, 72, 676, "It applies to every person liable to tax under this Act."),
            (10, 72, 40, "Page 1 of 3"),
        ],
        vec![
            (16, 72, 780, "PART II INCOME TAX"),
            (12, 72, 730, "Companies income tax is charged at thirty percent of total profits."),
            (12, 72, 716, "Small companies with turnover below fifty million naira are exempt."),
            (10, 72, 40, "Page 2 of 3"),
        ],
        vec![
            (16, 72, 780, "PART III VALUE ADDED TAX"),
            (12, 72, 730, "Value added tax is charged at seven and a half percent on taxable supplies."),
            (12, 72, 716, "Basic food items and medical services are exempt from value added tax."),
            (10, 72, 40, "Page 3 of 3"),
        ],
    ])
}

/// A PDF whose only page carries no text.
pub fn blank_pdf() -> Vec<u8> {
    build_pdf(&[vec![]])
}
