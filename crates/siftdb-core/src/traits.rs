//! Capability interfaces at the seams between crates.

/// A dense embedding backend. Implementations must be deterministic for a
/// fixed configuration and input, and must return L2-normalized vectors of
/// `dim()` length.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model configuration (e.g. `bge-m3:d1024`).
    fn id(&self) -> &str;
    /// Output dimensionality.
    fn dim(&self) -> usize;
    /// Maximum input length in tokens.
    fn max_len(&self) -> usize;
    /// Compute embeddings for a batch of input texts.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}
