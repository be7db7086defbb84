//! PDF extraction.
//!
//! Primary strategy walks pages with lopdf so every section carries its page
//! number; the fallback runs pdf-extract over the whole document and loses
//! page provenance but tolerates files lopdf chokes on.

use siftdb_core::types::Section;

use crate::ExtractStrategy;

/// Page-aware strategy: one section per page, titled with a heading
/// heuristic applied to the page's first line.
pub struct PdfPageStrategy;

impl ExtractStrategy for PdfPageStrategy {
    fn name(&self) -> &'static str {
        "pdf-pages"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let doc = lopdf::Document::load_mem(bytes)?;
        let mut sections = Vec::new();
        for (page_number, _) in doc.get_pages() {
            let text = doc.extract_text(&[page_number])?;
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let title = extract_section_heading(trimmed).unwrap_or_default();
            sections.push(Section::new(title, trimmed.to_string(), Some(page_number)));
        }
        Ok(sections)
    }
}

/// Whole-document fallback without page numbers.
pub struct PdfFlatTextStrategy;

impl ExtractStrategy for PdfFlatTextStrategy {
    fn name(&self) -> &'static str {
        "pdf-flat-text"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let text = pdf_extract::extract_text_from_mem(bytes)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let title = extract_section_heading(trimmed).unwrap_or_default();
        Ok(vec![Section::new(title, trimmed.to_string(), None)])
    }
}

/// Heading heuristic: the first non-empty line, if it is short and does not
/// end like a running sentence.
fn extract_section_heading(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.len() > 120 || line.ends_with('.') || line.ends_with(',') {
        return None;
    }
    Some(line.to_string())
}
