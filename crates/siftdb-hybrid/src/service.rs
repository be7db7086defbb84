//! The ingestion-and-search facade tying every stage together:
//! parse -> chunk -> keywords -> embed -> dual index write, and the
//! corresponding query, listing, deletion and health operations.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use siftdb_core::chunker::SemanticChunker;
use siftdb_core::collection::validate_collection_name;
use siftdb_core::config::SearchConfig;
use siftdb_core::traits::Embedder;
use siftdb_core::types::{
    DocumentChunk, HealthReport, HealthStatus, IndexInfo, IngestReport, SearchMode, SearchResponse,
};
use siftdb_core::{Error, Result};
use siftdb_embed::{global_embedder, KeywordExtractor};
use siftdb_parse::DocumentParser;
use siftdb_text::LexicalIndex;
use siftdb_vector::{VectorRecord, VectorStore};

use crate::engine::HybridSearchEngine;

const KEYWORDS_PER_CHUNK: usize = 10;

pub struct SearchService {
    parser: DocumentParser,
    chunker: SemanticChunker,
    keywords: KeywordExtractor,
    embedder: Arc<dyn Embedder>,
    vector: Arc<VectorStore>,
    lexical: Arc<LexicalIndex>,
    engine: HybridSearchEngine,
    config: SearchConfig,
}

impl SearchService {
    pub async fn new(config: SearchConfig) -> Result<Self> {
        let data_dir = config.data_dir();
        let artifacts_dir = config.artifacts_dir();

        let embedder = global_embedder(&config.embedding)?;
        let vector = Arc::new(VectorStore::open(&data_dir.join("vector")).await?);
        let lexical = Arc::new(LexicalIndex::new(data_dir.join("lexical"))?);
        let parser = DocumentParser::new(artifacts_dir.as_deref());
        let chunker = SemanticChunker::new(config.chunking.clamped());
        let keywords = KeywordExtractor::new(Arc::clone(&embedder));
        let engine = HybridSearchEngine::new(
            Arc::clone(&vector),
            Arc::clone(&lexical),
            Arc::clone(&embedder),
            config.fusion.clone(),
        );
        info!(model = embedder.id(), dim = embedder.dim(), "search service ready");
        Ok(Self { parser, chunker, keywords, embedder, vector, lexical, engine, config })
    }

    /// Parse, chunk, embed and index one document into `index`. Creating the
    /// index on first use. Each ingestion mints fresh chunk ids, so repeating
    /// an ingest adds a new generation rather than overwriting the last.
    ///
    /// Validation comes first and storage last: a bad index name fails before
    /// parsing, and a document that fails extraction or produces no chunks
    /// never creates an empty index.
    pub async fn ingest(&self, index: &str, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
        validate_collection_name(index)?;

        let doc = self.parser.extract(bytes, filename)?;
        let candidates = self.chunker.chunk(&doc);
        if candidates.is_empty() {
            warn!(index, filename, "document produced no chunks");
            return Ok(IngestReport { chunks_created: 0 });
        }

        let ingest_id = ingest_id(bytes);
        let total = candidates.len();
        let chunks: Vec<DocumentChunk> = candidates
            .into_iter()
            .enumerate()
            .map(|(ordinal, candidate)| {
                let keywords = self
                    .keywords
                    .extract_keywords(&candidate.content, KEYWORDS_PER_CHUNK)
                    .into_iter()
                    .map(|(term, _)| term)
                    .collect();
                DocumentChunk {
                    id: format!("{}:{}:{}", doc.doc_id, ingest_id, ordinal),
                    doc_id: doc.doc_id.clone(),
                    section: candidate.section,
                    page: candidate.page,
                    chunk_index: ordinal,
                    total_chunks: total,
                    content: candidate.content,
                    keywords,
                }
            })
            .collect();

        let vectors = self.embed_chunks(&chunks).await?;
        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord {
                chunk_id: chunk.id.clone(),
                doc_id: chunk.doc_id.clone(),
                section: chunk.section.clone(),
                page: chunk.page,
                chunk_index: chunk.chunk_index,
                content: chunk.content.clone(),
                vector,
            })
            .collect();

        self.vector
            .create_collection(index, self.embedder.dim(), self.embedder.id())
            .await?;
        self.lexical.create_collection(index)?;
        self.vector.upsert(index, &records).await?;
        self.lexical.add_documents(index, &chunks)?;
        info!(index, filename, chunks = chunks.len(), "document ingested");
        Ok(IngestReport { chunks_created: chunks.len() })
    }

    pub async fn search(
        &self,
        index: &str,
        query: &str,
        mode: SearchMode,
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<SearchResponse> {
        self.engine.search(index, query, mode, top_k, min_score).await
    }

    pub async fn list_indices(&self) -> Result<Vec<IndexInfo>> {
        let names = self.vector.list_collections().await?;
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let document_count = self.vector.document_count(&name).await?;
            indices.push(IndexInfo { name, document_count });
        }
        Ok(indices)
    }

    /// Remove an index from both engines. Deleting an unknown index is an
    /// error, so callers learn about typos instead of silently succeeding.
    pub async fn delete_index(&self, index: &str) -> Result<()> {
        let vector_existed = self.vector.delete_collection(index).await?;
        let lexical_existed = self.lexical.delete_collection(index)?;
        if !vector_existed && !lexical_existed {
            return Err(Error::validation(format!("index '{index}' does not exist")));
        }
        info!(index, "index deleted");
        Ok(())
    }

    /// Probe storage and the embedding model.
    pub async fn health(&self) -> HealthReport {
        let vector_store = match self.vector.ping().await {
            Ok(()) => HealthStatus::Ok,
            Err(e) => {
                warn!(error = %e, "vector store health probe failed");
                HealthStatus::Error
            }
        };
        let embedder = match self.embedder.embed_batch(&["ping".to_string()]) {
            Ok(vectors) if vectors.first().map(|v| v.len()) == Some(self.embedder.dim()) => {
                HealthStatus::Ok
            }
            Ok(_) => HealthStatus::Error,
            Err(e) => {
                warn!(error = %e, "embedder health probe failed");
                HealthStatus::Error
            }
        };
        HealthReport { vector_store, embedder, model: self.embedder.id().to_string() }
    }

    /// Embed chunk contents in configured batch sizes, off the async runtime.
    async fn embed_chunks(&self, chunks: &[DocumentChunk]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.embedding.batch_size.max(1);
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedder = Arc::clone(&self.embedder);
            let embedded = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
                .await
                .map_err(|e| Error::storage(format!("embedding task failed: {e}")))?
                .map_err(|e| Error::storage(format!("chunk embedding failed: {e}")))?;
            debug!(batch = embedded.len(), "chunk batch embedded");
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

/// Short ingestion batch id: content hash salted with wall-clock time, so
/// re-ingesting identical bytes still yields distinct chunk ids.
fn ingest_id(bytes: &[u8]) -> String {
    let millis = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut hasher = blake3::Hasher::new();
    hasher.update(bytes);
    hasher.update(&millis.to_le_bytes());
    hasher.finalize().to_hex()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_ids_are_short_hex() {
        let id = ingest_id(b"hello");
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
