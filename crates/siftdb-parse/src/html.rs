//! HTML extraction via the scraper crate.

use scraper::{ElementRef, Html, Selector};

use siftdb_core::types::Section;

use crate::ExtractStrategy;

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "svg", "head", "template"];
const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Structure-aware strategy: each `<h1>`..`<h6>` opens a new section titled
/// with the heading text; visible text in between becomes the section body.
pub struct HtmlHeadingStrategy;

impl ExtractStrategy for HtmlHeadingStrategy {
    fn name(&self) -> &'static str {
        "html-headings"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let html = std::str::from_utf8(bytes)?;
        let document = Html::parse_document(html);
        let body_selector =
            Selector::parse("body").map_err(|e| anyhow::anyhow!("invalid selector: {e:?}"))?;

        let mut state = SectionBuilder::default();
        if let Some(body) = document.select(&body_selector).next() {
            walk(body, &mut state);
        }
        let sections = state.finish();
        anyhow::ensure!(!sections.is_empty(), "document has no visible text");
        Ok(sections)
    }
}

#[derive(Default)]
struct SectionBuilder {
    sections: Vec<Section>,
    title: String,
    body: Vec<String>,
}

impl SectionBuilder {
    fn open(&mut self, title: String) {
        self.flush();
        self.title = title;
    }

    fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.body.push(text.to_string());
        }
    }

    fn flush(&mut self) {
        if !self.body.is_empty() || !self.title.is_empty() {
            let body = self.body.join("\n");
            self.sections.push(Section::new(std::mem::take(&mut self.title), body, None));
            self.body.clear();
        }
    }

    fn finish(mut self) -> Vec<Section> {
        self.flush();
        self.sections.retain(|s| !s.body.trim().is_empty() || !s.title.is_empty());
        self.sections
    }
}

fn walk(element: ElementRef<'_>, state: &mut SectionBuilder) {
    use scraper::node::Node;

    let tag = element.value().name();
    if SKIPPED_TAGS.contains(&tag) {
        return;
    }
    if HEADING_TAGS.contains(&tag) {
        let title = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
        state.open(title);
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => state.push_text(text),
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    walk(child_ref, state);
                }
            }
            _ => {}
        }
    }
}

/// Fallback: strip all markup and return one untitled section of visible
/// text, ignoring structure entirely.
pub struct HtmlFlatTextStrategy;

impl ExtractStrategy for HtmlFlatTextStrategy {
    fn name(&self) -> &'static str {
        "html-flat-text"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let html = String::from_utf8_lossy(bytes);
        let document = Html::parse_document(&html);
        let text = document
            .root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Section::new("", text, None)])
    }
}
