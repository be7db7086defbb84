#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Embedding backends and keyword extraction.
//!
//! The real backend loads a BGE-M3 (XLM-RoBERTa) checkpoint through candle.
//! Tests and development flows select [`HashEmbedder`] instead, either via
//! `EmbeddingConfig::use_fake` or `SIFTDB_USE_FAKE_EMBEDDINGS=1`, matching
//! the deterministic-fake idiom the storage tests rely on.

mod device;
pub mod keywords;
mod model;
mod pool;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;
use twox_hash::XxHash64;

use siftdb_core::config::EmbeddingConfig;
use siftdb_core::traits::Embedder;
use siftdb_core::{Error, Result};

pub use keywords::KeywordExtractor;
pub use model::BgeM3Embedder;

/// Deterministic hashing embedder for tests and offline development.
/// Same text always maps to the same L2-normalized vector.
pub struct HashEmbedder {
    id: String,
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { id: format!("fake-hash:d{dim}"), dim }
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        8192
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let mut v = vec![0f32; self.dim];
            for (i, token) in text.to_lowercase().split_whitespace().enumerate() {
                let mut hasher = XxHash64::with_seed(0);
                token.hash(&mut hasher);
                let h = hasher.finish();
                let idx = (h as usize) % self.dim;
                let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
                v[idx] += val + (i as f32 % 3.0) * 0.01;
            }
            let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
            for x in &mut v {
                *x /= norm;
            }
            out.push(v);
        }
        Ok(out)
    }
}

static EMBEDDER: OnceCell<Arc<dyn Embedder>> = OnceCell::new();

/// Process-wide embedder singleton. The model is loaded exactly once, on the
/// first call; concurrent callers block on the same initialization. A missing
/// model artifact is a fatal `ModelLoad` configuration error.
pub fn global_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    EMBEDDER.get_or_try_init(|| build_embedder(config)).cloned()
}

fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if use_fake(config) {
        info!("using deterministic hash embedder");
        return Ok(Arc::new(HashEmbedder::new(384)));
    }
    let model = BgeM3Embedder::load(config.model_dir.as_deref())
        .map_err(|e| Error::model_load(e.to_string()))?;
    info!(model = model.id(), dim = model.dim(), "embedding model loaded");
    Ok(Arc::new(model))
}

fn use_fake(config: &EmbeddingConfig) -> bool {
    if config.use_fake {
        return true;
    }
    std::env::var("SIFTDB_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(384);
        let texts = vec!["hybrid retrieval".to_string()];
        let a = embedder.embed_batch(&texts).expect("embed");
        let b = embedder.embed_batch(&texts).expect("embed again");
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 384);
        let norm: f32 = a[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3, "vector is L2-normalized, got {norm}");
    }

    #[test]
    fn similar_texts_score_higher_than_unrelated_ones() {
        let embedder = HashEmbedder::new(384);
        let vs = embedder
            .embed_batch(&[
                "the methods we used".to_string(),
                "methods used in the study".to_string(),
                "completely unrelated zebra juggling".to_string(),
            ])
            .expect("embed");
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&vs[0], &vs[1]) > dot(&vs[0], &vs[2]));
    }
}
