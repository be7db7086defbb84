//! Salient phrase extraction for the lexical index.
//!
//! Candidate 1–3-grams are scored by embedding similarity against the whole
//! chunk, then re-ranked with maximal marginal relevance so the selected set
//! is not dominated by near-duplicate phrases. When the embedder is
//! unavailable the extractor degrades to term-frequency ranking instead of
//! failing ingestion.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use siftdb_core::stopwords::is_stopword;
use siftdb_core::traits::Embedder;

const MAX_CANDIDATES: usize = 64;
const MMR_LAMBDA: f32 = 0.7;

pub struct KeywordExtractor {
    embedder: Option<Arc<dyn Embedder>>,
}

impl KeywordExtractor {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder: Some(embedder) }
    }

    /// Frequency-only extractor, used when no embedding backend exists.
    pub fn frequency_only() -> Self {
        Self { embedder: None }
    }

    /// Ranked `(phrase, salience)` pairs, best first, at most `top_n`.
    pub fn extract_keywords(&self, text: &str, top_n: usize) -> Vec<(String, f32)> {
        let candidates = candidate_phrases(text);
        if candidates.is_empty() || top_n == 0 {
            return Vec::new();
        }

        if let Some(embedder) = &self.embedder {
            match mmr_rank(embedder.as_ref(), text, &candidates, top_n) {
                Ok(ranked) => return ranked,
                Err(e) => {
                    warn!(error = %e, "embedding-based keyword ranking failed, using term frequency");
                }
            }
        }
        frequency_rank(&candidates, top_n)
    }
}

/// Candidate phrases with their occurrence counts, most frequent first,
/// capped at `MAX_CANDIDATES`.
fn candidate_phrases(text: &str) -> Vec<(String, usize)> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.len() > 2 && !is_stopword(w))
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for n in 1..=3usize {
        for window in words.windows(n) {
            let phrase = window.join(" ");
            let entry = counts.entry(phrase.clone()).or_insert(0);
            if *entry == 0 {
                order.push(phrase);
            }
            *entry += 1;
        }
    }

    let mut out: Vec<(String, usize)> =
        order.into_iter().map(|p| { let c = counts[&p]; (p, c) }).collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out.truncate(MAX_CANDIDATES);
    out
}

fn frequency_rank(candidates: &[(String, usize)], top_n: usize) -> Vec<(String, f32)> {
    let max = candidates.iter().map(|(_, c)| *c).max().unwrap_or(1) as f32;
    candidates
        .iter()
        .take(top_n)
        .map(|(phrase, count)| (phrase.clone(), *count as f32 / max))
        .collect()
}

/// Embedding relevance + maximal-marginal-relevance diversity re-ranking.
fn mmr_rank(
    embedder: &dyn Embedder,
    text: &str,
    candidates: &[(String, usize)],
    top_n: usize,
) -> anyhow::Result<Vec<(String, f32)>> {
    let mut batch: Vec<String> = Vec::with_capacity(candidates.len() + 1);
    batch.push(text.to_string());
    batch.extend(candidates.iter().map(|(p, _)| p.clone()));
    let vectors = embedder.embed_batch(&batch)?;
    anyhow::ensure!(vectors.len() == batch.len(), "embedder returned short batch");

    let doc = &vectors[0];
    let phrase_vecs = &vectors[1..];
    let relevance: Vec<f32> = phrase_vecs.iter().map(|v| dot(doc, v)).collect();

    let mut selected: Vec<usize> = Vec::new();
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    while selected.len() < top_n && !remaining.is_empty() {
        let mut best_pos = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, &i) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&j| dot(&phrase_vecs[i], &phrase_vecs[j]))
                .fold(0f32, f32::max);
            let score = MMR_LAMBDA * relevance[i] - (1.0 - MMR_LAMBDA) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }
        selected.push(remaining.remove(best_pos));
    }

    Ok(selected
        .into_iter()
        .map(|i| (candidates[i].0.clone(), relevance[i]))
        .collect())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbedder;

    #[test]
    fn stopwords_never_become_keywords() {
        let extractor = KeywordExtractor::frequency_only();
        let keywords = extractor.extract_keywords("the cat sat on the mat with the cat", 5);
        assert!(!keywords.is_empty());
        for (phrase, _) in &keywords {
            assert!(!phrase.split(' ').any(is_stopword), "stopword leaked into '{phrase}'");
        }
    }

    #[test]
    fn frequency_fallback_ranks_repeated_terms_first() {
        let extractor = KeywordExtractor::frequency_only();
        let text = "fusion fusion fusion retrieval ranking ranking";
        let keywords = extractor.extract_keywords(text, 3);
        assert_eq!(keywords[0].0, "fusion");
        assert!((keywords[0].1 - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn embedding_ranking_returns_at_most_top_n_distinct_phrases() {
        let extractor = KeywordExtractor::new(Arc::new(HashEmbedder::new(128)));
        let text = "dense vector retrieval fuses semantic similarity with sparse lexical \
                    relevance signals for document ranking and retrieval quality";
        let keywords = extractor.extract_keywords(text, 5);
        assert!(keywords.len() <= 5);
        assert!(!keywords.is_empty());
        let mut seen = std::collections::HashSet::new();
        for (phrase, _) in &keywords {
            assert!(seen.insert(phrase.clone()), "duplicate phrase '{phrase}'");
        }
    }

    #[test]
    fn empty_text_yields_no_keywords() {
        let extractor = KeywordExtractor::frequency_only();
        assert!(extractor.extract_keywords("", 10).is_empty());
        assert!(extractor.extract_keywords("a of the", 10).is_empty());
    }
}
