//! DOCX and PPTX extraction (OOXML zip containers).

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use siftdb_core::types::Section;

use crate::ExtractStrategy;

/// Structure-aware DOCX strategy: paragraphs styled `Heading*` or `Title`
/// open new sections; other paragraphs accumulate into the section body.
pub struct DocxHeadingStrategy;

impl ExtractStrategy for DocxHeadingStrategy {
    fn name(&self) -> &'static str {
        "docx-headings"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let xml = read_zip_entry(bytes, "word/document.xml")?;
        let paragraphs = parse_docx_paragraphs(&xml)?;

        let mut sections = Vec::new();
        let mut title = String::new();
        let mut body: Vec<String> = Vec::new();
        for para in paragraphs {
            if para.is_heading && !para.text.is_empty() {
                flush(&mut sections, &mut title, &mut body);
                title = para.text;
            } else if !para.text.is_empty() {
                body.push(para.text);
            }
        }
        flush(&mut sections, &mut title, &mut body);
        Ok(sections)
    }
}

/// DOCX fallback: every text run in document order, one untitled section.
pub struct DocxFlatTextStrategy;

impl ExtractStrategy for DocxFlatTextStrategy {
    fn name(&self) -> &'static str {
        "docx-flat-text"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let xml = read_zip_entry(bytes, "word/document.xml")?;
        let runs = collect_tag_text(&xml, b"w:t")?;
        let text = runs.join(" ");
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Section::new("", text.trim().to_string(), None)])
    }
}

/// Structure-aware PPTX strategy: one section per slide, page number = slide
/// number, title = the slide's first text run.
pub struct PptxSlideStrategy;

impl ExtractStrategy for PptxSlideStrategy {
    fn name(&self) -> &'static str {
        "pptx-slides"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut slide_names: Vec<(u32, String)> = Vec::new();
        for name in archive.file_names() {
            if let Some(n) = slide_number(name) {
                slide_names.push((n, name.to_string()));
            }
        }
        slide_names.sort();

        let mut sections = Vec::new();
        for (number, name) in slide_names {
            let mut xml = String::new();
            archive.by_name(&name)?.read_to_string(&mut xml)?;
            let runs = collect_tag_text(&xml, b"a:t")?;
            if runs.is_empty() {
                continue;
            }
            let title = runs[0].trim().to_string();
            let body = runs[1..].join("\n");
            let body = if body.trim().is_empty() { title.clone() } else { body };
            sections.push(Section::new(title, body, Some(number)));
        }
        Ok(sections)
    }
}

/// PPTX fallback: every `a:t` run in every slide xml, one untitled section.
pub struct PptxFlatTextStrategy;

impl ExtractStrategy for PptxFlatTextStrategy {
    fn name(&self) -> &'static str {
        "pptx-flat-text"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let names: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with("ppt/") && n.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        let mut runs = Vec::new();
        for name in names {
            let mut xml = String::new();
            archive.by_name(&name)?.read_to_string(&mut xml)?;
            runs.extend(collect_tag_text(&xml, b"a:t")?);
        }
        let text = runs.join("\n");
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Section::new("", text.trim().to_string(), None)])
    }
}

fn slide_number(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("ppt/slides/slide")?;
    rest.strip_suffix(".xml")?.parse().ok()
}

fn read_zip_entry(bytes: &[u8], entry: &str) -> anyhow::Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name(entry)?.read_to_string(&mut xml)?;
    Ok(xml)
}

struct DocxParagraph {
    text: String,
    is_heading: bool,
}

fn parse_docx_paragraphs(xml: &str) -> anyhow::Result<Vec<DocxParagraph>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut paragraphs = Vec::new();
    let mut runs: Vec<String> = Vec::new();
    let mut in_paragraph = false;
    let mut in_text = false;
    let mut is_heading = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    in_paragraph = true;
                    runs.clear();
                    is_heading = false;
                }
                b"w:t" if in_paragraph => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"w:pStyle" && in_paragraph => {
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() == b"w:val" {
                        let style = attr.unescape_value()?;
                        if style.starts_with("Heading") || style.as_ref() == "Title" {
                            is_heading = true;
                        }
                    }
                }
            }
            Event::Text(t) if in_text => runs.push(t.unescape()?.into_owned()),
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    in_paragraph = false;
                    let text = runs.join("").trim().to_string();
                    paragraphs.push(DocxParagraph { text, is_heading });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

/// Collect the text content of every `<tag>` element in document order.
fn collect_tag_text(xml: &str, tag: &[u8]) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut in_tag = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == tag => in_tag = true,
            Event::End(e) if e.name().as_ref() == tag => in_tag = false,
            Event::Text(t) if in_tag => {
                let text = t.unescape()?.trim().to_string();
                if !text.is_empty() {
                    out.push(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn flush(sections: &mut Vec<Section>, title: &mut String, body: &mut Vec<String>) {
    if !body.is_empty() || !title.is_empty() {
        sections.push(Section::new(std::mem::take(title), body.join("\n"), None));
        body.clear();
    }
}
