use siftdb_core::Error;
use siftdb_vector::{VectorRecord, VectorStore};
use tempfile::TempDir;

fn record(chunk_id: &str, doc_id: &str, vector: Vec<f32>) -> VectorRecord {
    VectorRecord {
        chunk_id: chunk_id.to_string(),
        doc_id: doc_id.to_string(),
        section: "Intro".to_string(),
        page: None,
        chunk_index: 0,
        content: format!("content of {chunk_id}"),
        vector,
    }
}

fn unit(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot] = 1.0;
    v
}

#[tokio::test]
async fn round_trip_nearest_neighbor() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(dir.path()).await.unwrap();
    store.create_collection("notes", 4, "fake-hash:d4").await.unwrap();

    store
        .upsert(
            "notes",
            &[
                record("doc:a:0", "doc", unit(4, 0)),
                record("doc:a:1", "doc", unit(4, 1)),
                record("doc:a:2", "doc", unit(4, 2)),
            ],
        )
        .await
        .unwrap();

    let hits = store.query("notes", &unit(4, 1), 2, None).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk_id, "doc:a:1");
    // Exact match under cosine: distance 0, score 1.
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    assert!(hits[0].content.contains("doc:a:1"));
}

#[tokio::test]
async fn rejects_wrong_dimension_on_write() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(dir.path()).await.unwrap();
    store.create_collection("notes", 768, "model-x").await.unwrap();

    let err = store
        .upsert("notes", &[record("doc:a:0", "doc", unit(384, 0))])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn rejects_wrong_dimension_on_query() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(dir.path()).await.unwrap();
    store.create_collection("notes", 8, "model-x").await.unwrap();

    let err = store.query("notes", &unit(4, 0), 5, None).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn recreate_with_same_parameters_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(dir.path()).await.unwrap();
    store.create_collection("notes", 4, "model-x").await.unwrap();
    store.create_collection("notes", 4, "model-x").await.unwrap();

    let err = store.create_collection("notes", 8, "model-x").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let err = store.create_collection("notes", 4, "model-y").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn delete_and_list() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(dir.path()).await.unwrap();
    store.create_collection("alpha", 4, "m").await.unwrap();
    store.create_collection("beta", 4, "m").await.unwrap();

    assert_eq!(store.list_collections().await.unwrap(), vec!["alpha", "beta"]);

    assert!(store.delete_collection("alpha").await.unwrap());
    assert_eq!(store.list_collections().await.unwrap(), vec!["beta"]);
    assert!(store.collection_meta("alpha").await.unwrap().is_none());

    // Second delete is a no-op.
    assert!(!store.delete_collection("alpha").await.unwrap());
}

#[tokio::test]
async fn survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = VectorStore::open(dir.path()).await.unwrap();
        store.create_collection("notes", 4, "model-x").await.unwrap();
        store
            .upsert("notes", &[record("doc:a:0", "doc", unit(4, 0))])
            .await
            .unwrap();
    }

    let store = VectorStore::open(dir.path()).await.unwrap();
    let meta = store.collection_meta("notes").await.unwrap().unwrap();
    assert_eq!(meta.dimension, 4);
    assert_eq!(meta.model_id, "model-x");
    let hits = store.query("notes", &unit(4, 0), 1, None).await.unwrap();
    assert_eq!(hits[0].chunk_id, "doc:a:0");
    assert_eq!(store.document_count("notes").await.unwrap(), 1);
}

#[tokio::test]
async fn invalid_name_rejected_before_storage() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(dir.path()).await.unwrap();
    let err = store.create_collection("tg", 4, "m").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(store.list_collections().await.unwrap().is_empty());
}
