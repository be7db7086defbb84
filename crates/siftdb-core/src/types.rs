//! Domain types shared by the parsing, indexing and search engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ChunkId = String;

/// Source document formats the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Html,
    Text,
}

impl DocumentFormat {
    /// Infer the format from a filename extension. Anything unrecognized is
    /// treated as plain text.
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Docx,
            "pptx" | "ppt" => DocumentFormat::Pptx,
            "html" | "htm" | "xhtml" => DocumentFormat::Html,
            _ => DocumentFormat::Text,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Html => "html",
            DocumentFormat::Text => "text",
        };
        f.write_str(s)
    }
}

/// Opaque reference to an embedded image. Carried through as metadata for
/// external collaborators, never interpreted by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub content_address: String,
}

/// One structural unit of an extracted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub body: String,
    pub page: Option<u32>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

impl Section {
    pub fn new(title: impl Into<String>, body: impl Into<String>, page: Option<u32>) -> Self {
        Self { title: title.into(), body: body.into(), page, images: Vec::new() }
    }
}

/// A parsed source document: ordered sections plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub doc_id: String,
    pub filename: String,
    pub format: DocumentFormat,
    pub sections: Vec<Section>,
}

/// A chunk candidate produced by the chunker. Ids are assigned later, when
/// the chunk is bound to an ingestion batch and a collection.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub section: String,
    pub page: Option<u32>,
    pub content: String,
}

/// The atomic unit of indexing and retrieval. Immutable once created;
/// re-ingestion mints new chunks with fresh ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub section: String,
    pub page: Option<u32>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Indicates which engine produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Lexical,
}

/// The minimal surface returned by both index engines. `score` is
/// engine-specific but higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// Query-time projection of a chunk plus its fused relevance score.
/// Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: ChunkId,
    pub text: String,
    pub score: f32,
    pub doc_id: String,
    pub section: String,
    pub page: Option<u32>,
}

/// Search response: the top-k page plus the number of candidates that
/// cleared the score threshold before truncation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_results: usize,
}

/// Retrieval mode for the hybrid engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Semantic,
    Lexical,
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "semantic" => Ok(SearchMode::Semantic),
            "lexical" => Ok(SearchMode::Lexical),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(crate::Error::validation(format!(
                "unknown search mode '{other}', expected semantic, lexical or hybrid"
            ))),
        }
    }
}

/// Summary returned by `ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub chunks_created: usize,
}

/// One entry of `list_indices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub document_count: usize,
}

/// Health status of one subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub vector_store: HealthStatus,
    pub embedder: HealthStatus,
    pub model: String,
}
