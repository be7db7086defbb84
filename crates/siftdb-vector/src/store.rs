//! Collection-scoped persistent vector store on LanceDB.
//!
//! One Lance table per collection plus a `_collections` meta table holding
//! the declared dimension and model id. Every public operation validates the
//! collection name before touching storage; dimension mismatches are
//! rejected with a typed `Validation` error rather than corrupting the
//! table. Batch upserts land as a single Lance fragment, so a concurrent
//! query sees a batch entirely or not at all.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use arrow_array::{
    Array, FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, DistanceType};
use tracing::debug;

use siftdb_core::collection::validate_collection_name;
use siftdb_core::{Error, Result};

use crate::schema::{collection_schema, meta_schema, META_TABLE};

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk_id: String,
    pub doc_id: String,
    pub section: String,
    pub page: Option<u32>,
    pub chunk_index: usize,
    pub content: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: String,
    pub score: f32,
    pub doc_id: String,
    pub section: String,
    pub page: Option<u32>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMeta {
    pub name: String,
    pub dimension: usize,
    pub model_id: String,
}

pub struct VectorStore {
    db: Connection,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl VectorStore {
    pub async fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| Error::storage(format!("cannot create vector root {}: {e}", root.display())))?;
        let db = connect(root.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot open vector store: {e}")))?;
        Ok(Self { db, write_locks: Mutex::new(HashMap::new()) })
    }

    /// Declare a collection with a fixed dimension and source model.
    /// Re-creating with identical parameters is a no-op; re-creating with a
    /// different dimension or model is rejected, since an index must never
    /// mix embedding spaces.
    pub async fn create_collection(&self, name: &str, dim: usize, model_id: &str) -> Result<()> {
        validate_collection_name(name)?;
        if dim == 0 {
            return Err(Error::validation("vector dimension must be > 0"));
        }
        if let Some(meta) = self.collection_meta(name).await? {
            if meta.dimension != dim || meta.model_id != model_id {
                return Err(Error::validation(format!(
                    "collection '{name}' already exists with dimension {} from model '{}', refusing {} from '{}'",
                    meta.dimension, meta.model_id, dim, model_id
                )));
            }
            return Ok(());
        }

        let schema = collection_schema(dim);
        let empty = RecordBatchIterator::new(vec![].into_iter(), schema);
        self.db
            .create_table(name, Box::new(empty))
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot create collection '{name}': {e}")))?;
        self.put_meta(name, dim, model_id).await?;
        debug!(collection = name, dim, model = model_id, "vector collection created");
        Ok(())
    }

    /// Append a batch of records. The whole batch becomes visible at once.
    pub async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        validate_collection_name(name)?;
        if records.is_empty() {
            return Ok(());
        }
        let meta = self
            .collection_meta(name)
            .await?
            .ok_or_else(|| Error::storage(format!("vector collection '{name}' does not exist")))?;
        for record in records {
            if record.vector.len() != meta.dimension {
                return Err(Error::validation(format!(
                    "vector for chunk '{}' has dimension {}, collection '{name}' requires {}",
                    record.chunk_id,
                    record.vector.len(),
                    meta.dimension
                )));
            }
        }

        let lock = self.write_lock(name);
        let _guard = lock.lock().await;

        let batch = records_to_batch(records, meta.dimension)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self
            .db
            .open_table(name)
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot open collection '{name}': {e}")))?;
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| Error::storage(format!("vector write to '{name}': {e}")))?;
        debug!(collection = name, records = records.len(), "vector batch written");
        Ok(())
    }

    /// Nearest-neighbor query by cosine similarity. `filter` is an optional
    /// SQL-style predicate over the metadata columns.
    pub async fn query(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        validate_collection_name(name)?;
        let meta = self
            .collection_meta(name)
            .await?
            .ok_or_else(|| Error::storage(format!("vector collection '{name}' does not exist")))?;
        if vector.len() != meta.dimension {
            return Err(Error::validation(format!(
                "query vector has dimension {}, collection '{name}' requires {}",
                vector.len(),
                meta.dimension
            )));
        }

        let table = self
            .db
            .open_table(name)
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot open collection '{name}': {e}")))?;
        let mut query = table
            .vector_search(vector.to_vec())
            .map_err(|e| Error::storage(format!("vector query in '{name}': {e}")))?
            .distance_type(DistanceType::Cosine)
            .limit(top_k.max(1));
        if let Some(predicate) = filter {
            query = query.only_if(predicate);
        }
        let mut stream = query
            .execute()
            .await
            .map_err(|e| Error::storage(format!("vector query in '{name}': {e}")))?;

        let mut hits = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| Error::storage(format!("vector result stream: {e}")))?
        {
            let column_str = |column: &str, i: usize| -> String {
                batch
                    .column_by_name(column)
                    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                    .map(|a| a.value(i).to_string())
                    .unwrap_or_default()
            };
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<arrow_array::Float32Array>())
                .cloned();
            let pages = batch
                .column_by_name("page")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .cloned();
            for i in 0..batch.num_rows() {
                let score = distances.as_ref().map(|d| 1.0 - d.value(i)).unwrap_or(0.0);
                let page = pages.as_ref().and_then(|p| {
                    if p.is_null(i) {
                        None
                    } else {
                        u32::try_from(p.value(i)).ok()
                    }
                });
                hits.push(VectorHit {
                    chunk_id: column_str("id", i),
                    score,
                    doc_id: column_str("doc_id", i),
                    section: column_str("section", i),
                    page,
                    content: column_str("content", i),
                });
            }
        }
        Ok(hits)
    }

    /// Drop the collection table and its meta row. Returns whether the
    /// collection existed.
    pub async fn delete_collection(&self, name: &str) -> Result<bool> {
        validate_collection_name(name)?;
        let lock = self.write_lock(name);
        let _guard = lock.lock().await;

        let existed = self.collection_meta(name).await?.is_some();
        let table_names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot list tables: {e}")))?;
        if table_names.contains(&name.to_string()) {
            self.db
                .drop_table(name, &[])
                .await
                .map_err(|e| Error::storage(format!("cannot drop collection '{name}': {e}")))?;
        }
        if existed {
            let meta = self
                .db
                .open_table(META_TABLE)
                .execute()
                .await
                .map_err(|e| Error::storage(format!("cannot open meta table: {e}")))?;
            meta.delete(&format!("name = '{name}'"))
                .await
                .map_err(|e| Error::storage(format!("cannot delete meta row for '{name}': {e}")))?;
        }
        Ok(existed)
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot list tables: {e}")))?
            .into_iter()
            .filter(|n| n != META_TABLE)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Number of distinct source documents in a collection.
    pub async fn document_count(&self, name: &str) -> Result<usize> {
        validate_collection_name(name)?;
        let table = self
            .db
            .open_table(name)
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot open collection '{name}': {e}")))?;
        let mut stream = table
            .query()
            .select(Select::Columns(vec!["doc_id".to_string()]))
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot scan collection '{name}': {e}")))?;
        let mut doc_ids = std::collections::HashSet::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| Error::storage(format!("scan stream: {e}")))?
        {
            if let Some(column) =
                batch.column_by_name("doc_id").and_then(|c| c.as_any().downcast_ref::<StringArray>())
            {
                for i in 0..batch.num_rows() {
                    doc_ids.insert(column.value(i).to_string());
                }
            }
        }
        Ok(doc_ids.len())
    }

    /// Declared dimension and model of a collection, if it exists.
    pub async fn collection_meta(&self, name: &str) -> Result<Option<CollectionMeta>> {
        let table_names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot list tables: {e}")))?;
        if !table_names.contains(&META_TABLE.to_string()) {
            return Ok(None);
        }
        let table = self
            .db
            .open_table(META_TABLE)
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot open meta table: {e}")))?;
        let mut stream = table
            .query()
            .only_if(format!("name = '{name}'"))
            .execute()
            .await
            .map_err(|e| Error::storage(format!("meta table query: {e}")))?;
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| Error::storage(format!("meta table stream: {e}")))?
        {
            if batch.num_rows() == 0 {
                continue;
            }
            let names = batch
                .column_by_name("name")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| Error::storage("meta table missing 'name' column"))?;
            let dims = batch
                .column_by_name("dimension")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| Error::storage("meta table missing 'dimension' column"))?;
            let models = batch
                .column_by_name("model_id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| Error::storage("meta table missing 'model_id' column"))?;
            return Ok(Some(CollectionMeta {
                name: names.value(0).to_string(),
                dimension: usize::try_from(dims.value(0)).unwrap_or(0),
                model_id: models.value(0).to_string(),
            }));
        }
        Ok(None)
    }

    /// Cheap connectivity probe for health checks.
    pub async fn ping(&self) -> Result<()> {
        self.db
            .table_names()
            .execute()
            .await
            .map(|_| ())
            .map_err(|e| Error::storage(format!("vector store unreachable: {e}")))
    }

    async fn put_meta(&self, name: &str, dim: usize, model_id: &str) -> Result<()> {
        self.ensure_meta_table().await?;
        let table = self
            .db
            .open_table(META_TABLE)
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot open meta table: {e}")))?;
        let batch = RecordBatch::try_new(
            meta_schema(),
            vec![
                Arc::new(StringArray::from(vec![name.to_string()])),
                Arc::new(Int32Array::from(vec![dim as i32])),
                Arc::new(StringArray::from(vec![model_id.to_string()])),
                Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
            ],
        )
        .map_err(|e| Error::storage(format!("meta record batch: {e}")))?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), meta_schema()));
        // Upsert via merge_insert: name is unique.
        let mut merge = table.merge_insert(&["name"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(reader)
            .await
            .map_err(|e| Error::storage(format!("meta upsert for '{name}': {e}")))?;
        Ok(())
    }

    async fn ensure_meta_table(&self) -> Result<()> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot list tables: {e}")))?;
        if names.contains(&META_TABLE.to_string()) {
            return Ok(());
        }
        let empty = RecordBatchIterator::new(vec![].into_iter(), meta_schema());
        self.db
            .create_table(META_TABLE, Box::new(empty))
            .execute()
            .await
            .map_err(|e| Error::storage(format!("cannot create meta table: {e}")))?;
        Ok(())
    }

    fn write_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.write_locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(name.to_string()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
    }
}

fn records_to_batch(records: &[VectorRecord], dim: usize) -> Result<RecordBatch> {
    let schema = collection_schema(dim);
    let mut ids = Vec::with_capacity(records.len());
    let mut doc_ids = Vec::with_capacity(records.len());
    let mut sections = Vec::with_capacity(records.len());
    let mut contents = Vec::with_capacity(records.len());
    let mut chunk_indices = Vec::with_capacity(records.len());
    let mut pages: Vec<Option<i32>> = Vec::with_capacity(records.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
    for record in records {
        ids.push(record.chunk_id.clone());
        doc_ids.push(record.doc_id.clone());
        sections.push(record.section.clone());
        contents.push(record.content.clone());
        chunk_indices.push(record.chunk_index as i32);
        pages.push(record.page.map(|p| p as i32));
        vectors.push(Some(record.vector.iter().map(|&x| Some(x)).collect()));
    }
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(doc_ids)),
            Arc::new(StringArray::from(sections)),
            Arc::new(StringArray::from(contents)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(Int32Array::from(pages)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                vectors.into_iter(),
                dim as i32,
            )),
        ],
    )
    .map_err(|e| Error::storage(format!("vector record batch: {e}")))
}
