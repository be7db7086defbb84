//! Token-aware semantic chunker.
//!
//! Splits each section of a parsed document independently, so a chunk never
//! spans two sections. Sentence and paragraph boundaries win over hitting the
//! exact size target: chunks may undershoot the target but never exceed 1.5x
//! of it. The section title is prefixed into each chunk's text so the
//! embedding stage keeps topical context.

use crate::config::ChunkingConfig;
use crate::types::{ChunkCandidate, ParsedDocument};

#[derive(Default)]
pub struct SemanticChunker {
    config: ChunkingConfig,
}

impl SemanticChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config: config.clamped() }
    }

    /// Produce ordered chunk candidates for every section of `doc`.
    /// Empty or whitespace-only sections yield no candidates.
    pub fn chunk(&self, doc: &ParsedDocument) -> Vec<ChunkCandidate> {
        let mut out = Vec::new();
        for section in &doc.sections {
            let body = section.body.trim();
            if body.is_empty() {
                continue;
            }
            for piece in self.split_text(body) {
                let content = if section.title.trim().is_empty() {
                    piece
                } else {
                    format!("{}\n\n{}", section.title.trim(), piece)
                };
                out.push(ChunkCandidate {
                    section: section.title.trim().to_string(),
                    page: section.page,
                    content,
                });
            }
        }
        out
    }

    /// Split one section body into pieces of roughly `target_tokens` tokens,
    /// preferring paragraph then sentence boundaries, with `overlap_tokens`
    /// of trailing context carried into the next piece.
    fn split_text(&self, body: &str) -> Vec<String> {
        let target = self.config.target_tokens;
        let overlap = self.config.overlap_tokens;

        let sentences = split_sentences(body);
        let mut pieces: Vec<String> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for sentence in sentences {
            let tokens = estimate_tokens(&sentence);
            if tokens > target {
                // A single oversized sentence: flush, then hard-split by words.
                if !current.is_empty() {
                    pieces.push(current.join(" "));
                    current.clear();
                    current_tokens = 0;
                }
                pieces.extend(hard_split(&sentence, target, overlap));
                continue;
            }
            if current_tokens + tokens > target && !current.is_empty() {
                pieces.push(current.join(" "));
                let tail = overlap_tail(&current, overlap);
                current = tail;
                current_tokens = current.iter().map(|s| estimate_tokens(s)).sum();
            }
            current_tokens += tokens;
            current.push(sentence);
        }
        if !current.is_empty() {
            let piece = current.join(" ");
            // Drop a trailing piece that is pure overlap of the previous one.
            let redundant = pieces.last().is_some_and(|prev| prev.ends_with(piece.as_str()));
            if !redundant {
                pieces.push(piece);
            }
        }
        pieces
    }
}

/// Word-count based token estimate: English averages ~0.75 words per token.
pub fn estimate_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f32 / 0.75) as usize
}

/// Split text into sentences, treating blank lines as hard boundaries.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let mut start = 0usize;
        let chars: Vec<(usize, char)> = paragraph.char_indices().collect();
        for (i, (pos, c)) in chars.iter().enumerate() {
            let terminal = matches!(c, '.' | '!' | '?');
            let at_end = i + 1 == chars.len();
            let followed_by_space = chars.get(i + 1).is_some_and(|(_, n)| n.is_whitespace());
            if terminal && (at_end || followed_by_space) {
                let end = pos + c.len_utf8();
                let sentence = paragraph[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = end;
            }
        }
        let rest = paragraph[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }
    }
    sentences
}

/// Last-resort split for text with no usable sentence boundaries.
fn hard_split(text: &str, target_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let words_per_chunk = ((target_tokens as f32) * 0.75) as usize;
    let overlap_words = ((overlap_tokens as f32) * 0.75) as usize;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < words.len() {
        let end = (start + words_per_chunk).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start = end.saturating_sub(overlap_words).max(start + 1);
    }
    chunks
}

/// Trailing sentences of `current` totaling at most `overlap_tokens`.
fn overlap_tail(current: &[String], overlap_tokens: usize) -> Vec<String> {
    let mut tail: Vec<String> = Vec::new();
    let mut tokens = 0usize;
    for sentence in current.iter().rev() {
        let t = estimate_tokens(sentence);
        if tokens + t > overlap_tokens {
            break;
        }
        tokens += t;
        tail.push(sentence.clone());
    }
    tail.reverse();
    tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentFormat, Section};

    fn doc(sections: Vec<Section>) -> ParsedDocument {
        ParsedDocument {
            doc_id: "doc".to_string(),
            filename: "doc.txt".to_string(),
            format: DocumentFormat::Text,
            sections,
        }
    }

    #[test]
    fn empty_section_yields_no_chunks() {
        let chunker = SemanticChunker::default();
        let d = doc(vec![Section::new("Empty", "   \n\n  ", None)]);
        assert!(chunker.chunk(&d).is_empty());
    }

    #[test]
    fn title_is_prefixed_into_chunk_text() {
        let chunker = SemanticChunker::default();
        let d = doc(vec![Section::new("Methods", "We used a hybrid approach.", Some(2))]);
        let chunks = chunker.chunk(&d);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.starts_with("Methods\n\n"));
        assert_eq!(chunks[0].page, Some(2));
        assert_eq!(chunks[0].section, "Methods");
    }

    #[test]
    fn chunks_never_span_sections() {
        let chunker = SemanticChunker::default();
        let d = doc(vec![
            Section::new("Intro", "First section body.", Some(1)),
            Section::new("Results", "Second section body.", Some(3)),
        ]);
        let chunks = chunker.chunk(&d);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.contains("First section"));
        assert!(!chunks[0].content.contains("Second section"));
    }

    #[test]
    fn long_section_is_split_with_overlap() {
        let cfg = ChunkingConfig { target_tokens: 500, overlap_tokens: 50 };
        let chunker = SemanticChunker::new(cfg);
        let sentence = "The quick brown fox jumps over the lazy dog near the river bank today.";
        let body = std::iter::repeat(sentence).take(120).collect::<Vec<_>>().join(" ");
        let d = doc(vec![Section::new("Long", &body, None)]);
        let chunks = chunker.chunk(&d);
        assert!(chunks.len() > 1, "a ~2000-token section must be split");
        for c in &chunks {
            assert!(
                estimate_tokens(&c.content) <= 500 + 500 / 2,
                "chunk exceeds 1.5x target: {} tokens",
                estimate_tokens(&c.content)
            );
        }
        // Overlap: the second chunk repeats the tail of the first.
        let first_tail: Vec<&str> = chunks[0].content.split_whitespace().rev().take(5).collect();
        let second = &chunks[1].content;
        assert!(first_tail.iter().all(|w| second.contains(w)));
    }

    #[test]
    fn giant_unbroken_sentence_is_hard_split() {
        let cfg = ChunkingConfig { target_tokens: 500, overlap_tokens: 50 };
        let chunker = SemanticChunker::new(cfg);
        let body = std::iter::repeat("word").take(3000).collect::<Vec<_>>().join(" ");
        let d = doc(vec![Section::new("", &body, None)]);
        let chunks = chunker.chunk(&d);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(estimate_tokens(&c.content) <= 750);
        }
    }

    #[test]
    fn token_estimate_tracks_word_count() {
        assert_eq!(estimate_tokens(""), 0);
        let text = "one two three four five six";
        assert_eq!(estimate_tokens(text), 8);
    }
}
