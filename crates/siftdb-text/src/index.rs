//! Collection-scoped lexical index.
//!
//! Each collection is one tantivy index in its own directory under the
//! storage root. Additions are incremental: the index is opened in place and
//! new documents are committed without re-indexing existing ones. Writers
//! within one collection are serialized behind a per-collection lock;
//! collections are fully independent.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, TantivyDocument};
use tracing::{debug, warn};

use siftdb_core::collection::validate_collection_name;
use siftdb_core::types::DocumentChunk;
use siftdb_core::{Error, Result};

use crate::schema::{build_schema, register_tokenizer};

/// Per-term boost for the keywords field relative to the body text.
const KEYWORDS_BOOST: f32 = 2.0;
const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub id: String,
    pub score: f32,
    pub doc_id: String,
    pub section: String,
    pub page: Option<u32>,
    pub text: String,
}

pub struct LexicalIndex {
    root: PathBuf,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

struct Fields {
    id: Field,
    doc_id: Field,
    section: Field,
    page: Field,
    text: Field,
    keywords: Field,
}

impl LexicalIndex {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::storage(format!("cannot create lexical root {}: {e}", root.display())))?;
        Ok(Self { root, write_locks: Mutex::new(HashMap::new()) })
    }

    /// Create (or open) the collection. Idempotent.
    pub fn create_collection(&self, name: &str) -> Result<()> {
        validate_collection_name(name)?;
        self.open_index(name)?;
        Ok(())
    }

    pub fn collection_exists(&self, name: &str) -> bool {
        self.collection_dir(name).join("meta.json").exists()
    }

    /// Add a batch of chunks. The batch is committed as one unit: a
    /// concurrent reader sees either none of it or all of it.
    pub fn add_documents(&self, name: &str, chunks: &[DocumentChunk]) -> Result<()> {
        validate_collection_name(name)?;
        if chunks.is_empty() {
            return Ok(());
        }
        let lock = self.write_lock(name);
        let _guard = lock.lock().map_err(|_| Error::storage("lexical writer lock poisoned"))?;

        let index = self.open_index(name)?;
        let fields = Self::fields(&index)?;
        let mut writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| Error::storage(format!("lexical writer for '{name}': {e}")))?;
        for chunk in chunks {
            let mut document = doc!(
                fields.id => chunk.id.clone(),
                fields.doc_id => chunk.doc_id.clone(),
                fields.section => chunk.section.clone(),
                fields.text => chunk.content.clone(),
                fields.keywords => chunk.keywords.join(" "),
            );
            if let Some(page) = chunk.page {
                document.add_u64(fields.page, u64::from(page));
            }
            writer
                .add_document(document)
                .map_err(|e| Error::storage(format!("lexical add in '{name}': {e}")))?;
        }
        writer
            .commit()
            .map_err(|e| Error::storage(format!("lexical commit in '{name}': {e}")))?;
        debug!(collection = name, chunks = chunks.len(), "lexical batch committed");
        Ok(())
    }

    /// BM25 query over text + boosted keywords.
    pub fn query(&self, name: &str, query_text: &str, top_k: usize) -> Result<Vec<LexicalHit>> {
        validate_collection_name(name)?;
        if !self.collection_exists(name) {
            return Err(Error::storage(format!("lexical collection '{name}' does not exist")));
        }
        let index = self.open_index(name)?;
        let fields = Self::fields(&index)?;
        let reader = index
            .reader()
            .map_err(|e| Error::storage(format!("lexical reader for '{name}': {e}")))?;
        let searcher = reader.searcher();

        let mut parser = QueryParser::for_index(&index, vec![fields.text, fields.keywords]);
        parser.set_field_boost(fields.keywords, KEYWORDS_BOOST);
        let (query, parse_errors) = parser.parse_query_lenient(query_text);
        if !parse_errors.is_empty() {
            debug!(collection = name, ?parse_errors, "lenient query parse");
        }

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(top_k.max(1)))
            .map_err(|e| Error::storage(format!("lexical search in '{name}': {e}")))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let document: TantivyDocument = searcher
                .doc(addr)
                .map_err(|e| Error::storage(format!("lexical doc fetch in '{name}': {e}")))?;
            let get_str = |field: Field| {
                document.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string()
            };
            let page = document
                .get_first(fields.page)
                .and_then(|v| v.as_u64())
                .and_then(|p| u32::try_from(p).ok());
            hits.push(LexicalHit {
                id: get_str(fields.id),
                score,
                doc_id: get_str(fields.doc_id),
                section: get_str(fields.section),
                page,
                text: get_str(fields.text),
            });
        }
        Ok(hits)
    }

    /// Remove the collection directory. Returns whether it existed.
    pub fn delete_collection(&self, name: &str) -> Result<bool> {
        validate_collection_name(name)?;
        let dir = self.collection_dir(name);
        if !dir.exists() {
            return Ok(false);
        }
        let lock = self.write_lock(name);
        let _guard = lock.lock().map_err(|_| Error::storage("lexical writer lock poisoned"))?;
        std::fs::remove_dir_all(&dir)
            .map_err(|e| Error::storage(format!("failed to delete lexical collection '{name}': {e}")))?;
        Ok(true)
    }

    pub fn list_collections(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| Error::storage(format!("cannot list lexical root: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::storage(e.to_string()))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn collection_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn open_index(&self, name: &str) -> Result<Index> {
        let dir = self.collection_dir(name);
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::storage(format!("cannot create lexical dir for '{name}': {e}")))?;
        let mmap = MmapDirectory::open(&dir)
            .map_err(|e| Error::storage(format!("cannot open lexical dir for '{name}': {e}")))?;
        let index = Index::open_or_create(mmap, build_schema())
            .map_err(|e| Error::storage(format!("cannot open lexical index '{name}': {e}")))?;
        register_tokenizer(&index);
        Ok(index)
    }

    fn fields(index: &Index) -> Result<Fields> {
        let schema = index.schema();
        let get = |n: &str| {
            schema.get_field(n).map_err(|e| Error::storage(format!("missing field {n}: {e}")))
        };
        Ok(Fields {
            id: get("id")?,
            doc_id: get("doc_id")?,
            section: get("section")?,
            page: get("page")?,
            text: get("text")?,
            keywords: get("keywords")?,
        })
    }

    fn write_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = match self.write_locks.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("lexical lock table poisoned, recovering");
                poisoned.into_inner()
            }
        };
        locks.entry(name.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}
