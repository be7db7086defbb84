//! Query-side orchestration: runs the vector and lexical engines
//! concurrently, survives single-engine failures, and fuses their results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use siftdb_core::config::FusionConfig;
use siftdb_core::traits::Embedder;
use siftdb_core::types::{SearchMode, SearchResponse, SearchResult};
use siftdb_core::{Error, Result};
use siftdb_text::LexicalIndex;
use siftdb_vector::VectorStore;

use crate::fusion::{self, RankedId};

/// Metadata a hit carries back from either engine.
struct Payload {
    text: String,
    doc_id: String,
    section: String,
    page: Option<u32>,
}

pub struct HybridSearchEngine {
    vector: Arc<VectorStore>,
    lexical: Arc<LexicalIndex>,
    embedder: Arc<dyn Embedder>,
    config: FusionConfig,
}

impl HybridSearchEngine {
    pub fn new(
        vector: Arc<VectorStore>,
        lexical: Arc<LexicalIndex>,
        embedder: Arc<dyn Embedder>,
        config: FusionConfig,
    ) -> Self {
        Self { vector, lexical, embedder, config }
    }

    /// Run a query against one collection. `min_score` filters fused scores
    /// after normalization; `top_k` bounds the final result count.
    pub async fn search(
        &self,
        index: &str,
        query: &str,
        mode: SearchMode,
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<SearchResponse> {
        if top_k == 0 {
            return Err(Error::validation("top_k must be > 0"));
        }
        if query.trim().is_empty() {
            return Err(Error::validation("query text must not be empty"));
        }
        // Over-fetch so fusion has candidates beyond the final cut.
        let candidate_k = top_k.saturating_mul(3).max(10);

        let (semantic, lexical) = match mode {
            SearchMode::Semantic => (Some(self.semantic_hits(index, query, candidate_k).await?), None),
            SearchMode::Lexical => (None, Some(self.lexical_hits(index, query, candidate_k).await?)),
            SearchMode::Hybrid => self.both_hits(index, query, candidate_k).await?,
        };

        let mut payloads: HashMap<String, Payload> = HashMap::new();
        let semantic_ranked = semantic
            .unwrap_or_default()
            .into_iter()
            .map(|hit| {
                payloads.entry(hit.chunk_id.clone()).or_insert(Payload {
                    text: hit.content,
                    doc_id: hit.doc_id,
                    section: hit.section,
                    page: hit.page,
                });
                RankedId { id: hit.chunk_id, score: hit.score }
            })
            .collect::<Vec<_>>();
        let lexical_ranked = lexical
            .unwrap_or_default()
            .into_iter()
            .map(|hit| {
                payloads.entry(hit.id.clone()).or_insert(Payload {
                    text: hit.text,
                    doc_id: hit.doc_id,
                    section: hit.section,
                    page: hit.page,
                });
                RankedId { id: hit.id, score: hit.score }
            })
            .collect::<Vec<_>>();

        let fused = match mode {
            SearchMode::Hybrid => fusion::fuse(&semantic_ranked, &lexical_ranked, &self.config),
            SearchMode::Semantic => single_engine_ranking(semantic_ranked),
            SearchMode::Lexical => single_engine_ranking(lexical_ranked),
        };

        let threshold = min_score.unwrap_or(f32::NEG_INFINITY);
        let cleared: Vec<RankedId> =
            fused.into_iter().filter(|hit| hit.score >= threshold).collect();
        let total_results = cleared.len();
        let results = cleared
            .into_iter()
            .take(top_k)
            .filter_map(|hit| {
                payloads.remove(&hit.id).map(|payload| SearchResult {
                    chunk_id: hit.id,
                    text: payload.text,
                    score: hit.score,
                    doc_id: payload.doc_id,
                    section: payload.section,
                    page: payload.page,
                })
            })
            .collect();
        Ok(SearchResponse { results, total_results })
    }

    async fn semantic_hits(
        &self,
        index: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<siftdb_vector::VectorHit>> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        // The deadline covers the whole sub-query, embedding included; a
        // hung model forward pass must not stall the caller.
        let sub_query = async {
            let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&[text]))
                .await
                .map_err(|e| Error::storage(format!("embedding task failed: {e}")))?
                .map_err(|e| Error::storage(format!("query embedding failed: {e}")))?;
            let vector = vectors
                .into_iter()
                .next()
                .ok_or_else(|| Error::storage("embedder returned no vector for query"))?;
            self.vector.query(index, &vector, top_k, None).await
        };
        self.with_deadline(sub_query).await?
    }

    async fn lexical_hits(
        &self,
        index: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<siftdb_text::LexicalHit>> {
        let lexical = Arc::clone(&self.lexical);
        let name = index.to_string();
        let text = query.to_string();
        let task = tokio::task::spawn_blocking(move || lexical.query(&name, &text, top_k));
        match self.with_deadline(task).await? {
            Ok(result) => result,
            Err(join) => Err(Error::storage(format!("lexical query task failed: {join}"))),
        }
    }

    /// Run both engines concurrently. A single failing engine degrades to
    /// the other with a warning; both failing is an error.
    #[allow(clippy::type_complexity)]
    async fn both_hits(
        &self,
        index: &str,
        query: &str,
        top_k: usize,
    ) -> Result<(Option<Vec<siftdb_vector::VectorHit>>, Option<Vec<siftdb_text::LexicalHit>>)> {
        let (semantic, lexical) = tokio::join!(
            self.semantic_hits(index, query, top_k),
            self.lexical_hits(index, query, top_k),
        );
        match (semantic, lexical) {
            (Ok(s), Ok(l)) => Ok((Some(s), Some(l))),
            (Ok(s), Err(e)) => {
                warn!(index, error = %e, "lexical engine failed, degrading to semantic-only");
                Ok((Some(s), None))
            }
            (Err(e), Ok(l)) => {
                warn!(index, error = %e, "vector engine failed, degrading to lexical-only");
                Ok((None, Some(l)))
            }
            (Err(semantic_err), Err(lexical_err)) => Err(Error::storage(format!(
                "both engines failed: vector: {semantic_err}; lexical: {lexical_err}"
            ))),
        }
    }

    async fn with_deadline<T>(&self, fut: impl std::future::Future<Output = T>) -> Result<T> {
        let budget = Duration::from_millis(self.config.query_timeout_ms);
        timeout(budget, fut)
            .await
            .map_err(|_| Error::storage(format!("sub-query exceeded {}ms", budget.as_millis())))
    }
}

/// Normalize a single engine's scores so thresholds behave the same across
/// modes. Rank order is already the engine's own.
fn single_engine_ranking(hits: Vec<RankedId>) -> Vec<RankedId> {
    let normalized = fusion::normalize(&hits.iter().map(|h| h.score).collect::<Vec<_>>());
    hits.into_iter()
        .zip(normalized)
        .map(|(hit, score)| RankedId { id: hit.id, score })
        .collect()
}
