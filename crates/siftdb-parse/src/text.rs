//! Plain text and Markdown extraction.

use siftdb_core::types::Section;

use crate::ExtractStrategy;

/// Structure-aware strategy: ATX headings (`#`, `##`, ...) open new sections
/// titled with the heading text. Text before the first heading becomes an
/// untitled leading section.
pub struct MarkdownHeadingStrategy;

impl ExtractStrategy for MarkdownHeadingStrategy {
    fn name(&self) -> &'static str {
        "markdown-headings"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let text = std::str::from_utf8(bytes)?;
        let mut sections = Vec::new();
        let mut title = String::new();
        let mut body = String::new();

        for line in text.lines() {
            if let Some(heading) = parse_heading(line) {
                flush(&mut sections, &mut title, &mut body);
                title = heading.to_string();
            } else {
                body.push_str(line);
                body.push('\n');
            }
        }
        flush(&mut sections, &mut title, &mut body);

        // A file with no headings and no text is not this strategy's problem.
        anyhow::ensure!(!sections.is_empty(), "no sections found");
        Ok(sections)
    }
}

fn parse_heading(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let hashes = trimmed.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let heading = rest.trim();
    (!heading.is_empty()).then_some(heading)
}

fn flush(sections: &mut Vec<Section>, title: &mut String, body: &mut String) {
    if !body.trim().is_empty() || !title.is_empty() {
        sections.push(Section::new(title.clone(), body.trim().to_string(), None));
    }
    title.clear();
    body.clear();
}

/// Fallback: the whole payload as a single untitled section, decoded
/// lossily so that mostly-text files with a few bad bytes still ingest.
pub struct PlainTextStrategy;

impl ExtractStrategy for PlainTextStrategy {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
        let text = String::from_utf8_lossy(bytes);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Section::new("", trimmed.to_string(), None)])
    }
}
