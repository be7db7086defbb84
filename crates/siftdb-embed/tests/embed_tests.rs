use siftdb_core::config::EmbeddingConfig;
use siftdb_core::traits::Embedder;
use siftdb_embed::{global_embedder, HashEmbedder, KeywordExtractor};
use std::sync::Arc;

#[test]
fn global_embedder_initializes_once_and_is_shared() {
    std::env::set_var("SIFTDB_USE_FAKE_EMBEDDINGS", "1");
    let cfg = EmbeddingConfig::default();
    let a = global_embedder(&cfg).expect("embedder");
    let b = global_embedder(&cfg).expect("embedder again");
    assert!(Arc::ptr_eq(&a, &b), "singleton returns the same instance");
    assert_eq!(a.dim(), 384);
    assert!(a.id().starts_with("fake-hash"));
}

#[test]
fn batch_embedding_preserves_input_order() {
    let embedder = HashEmbedder::new(64);
    let texts: Vec<String> = (0..5).map(|i| format!("text number {i}")).collect();
    let batch = embedder.embed_batch(&texts).expect("embed");
    assert_eq!(batch.len(), 5);
    for (i, text) in texts.iter().enumerate() {
        let single = embedder.embed_batch(std::slice::from_ref(text)).expect("single");
        assert_eq!(batch[i], single[0], "batch position {i} matches single embedding");
    }
}

#[test]
fn keyword_extractor_prefers_salient_phrases() {
    let extractor = KeywordExtractor::new(Arc::new(HashEmbedder::new(128)));
    let text = "tantivy builds an inverted index. tantivy scores documents with bm25. \
                the inverted index supports incremental updates.";
    let keywords = extractor.extract_keywords(text, 10);
    assert!(keywords.len() <= 10);
    let phrases: Vec<&str> = keywords.iter().map(|(p, _)| p.as_str()).collect();
    assert!(
        phrases.iter().any(|p| p.contains("tantivy") || p.contains("inverted")),
        "expected a salient term in {phrases:?}"
    );
}
