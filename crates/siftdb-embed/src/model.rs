//! BGE-M3 embedding backend via candle.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use siftdb_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;

const MAX_LEN: usize = 256;
const PAD_ID: u32 = 1;

pub struct BgeM3Embedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
}

impl BgeM3Embedder {
    /// Load tokenizer, config and weights from `model_dir` (or the standard
    /// lookup locations). Any missing artifact is an error for the caller to
    /// surface at startup.
    pub fn load(model_dir: Option<&str>) -> Result<Self> {
        let device = select_device();
        let model_dir = resolve_model_dir(model_dir)?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer from {}: {e}", tokenizer_path.display()))?;

        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig =
            serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let dim = config.hidden_size;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> =
            weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;

        debug!(dir = %model_dir.display(), dim, "BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device, id: format!("bge-m3:d{dim}"), dim })
    }

    fn forward_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let batch = texts.len();

        let mut all_ids: Vec<Vec<u32>> = Vec::with_capacity(batch);
        let mut all_masks: Vec<Vec<u32>> = Vec::with_capacity(batch);
        let mut max_tokens = 1usize;
        for text in texts {
            let enc = self
                .tokenizer
                .encode(text.as_str(), true)
                .map_err(|e| anyhow!("tokenization failed: {e}"))?;
            let mut ids = enc.get_ids().to_vec();
            let mut mask = enc.get_attention_mask().to_vec();
            if ids.len() > MAX_LEN {
                ids.truncate(MAX_LEN);
                mask.truncate(MAX_LEN);
            }
            max_tokens = max_tokens.max(ids.len());
            all_ids.push(ids);
            all_masks.push(mask);
        }
        for (ids, mask) in all_ids.iter_mut().zip(all_masks.iter_mut()) {
            while ids.len() < max_tokens {
                ids.push(PAD_ID);
                mask.push(0);
            }
        }

        let flat_ids: Vec<u32> = all_ids.into_iter().flatten().collect();
        let flat_masks: Vec<u32> = all_masks.into_iter().flatten().collect();
        let input_ids = Tensor::from_iter(flat_ids, &self.device)?.reshape((batch, max_tokens))?;
        let attention_mask =
            Tensor::from_iter(flat_masks, &self.device)?.reshape((batch, max_tokens))?;
        let token_type_ids = Tensor::zeros((batch, max_tokens), DType::I64, &self.device)?;

        let hidden =
            self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let out: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > 200 * batch as u128 {
            warn!(batch, elapsed_ms = elapsed.as_millis() as u64, "slow embedding batch");
        }
        Ok(out)
    }
}

impl Embedder for BgeM3Embedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        MAX_LEN
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.forward_batch(texts)
    }
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = PathBuf::from(dir);
        if p.exists() {
            return Ok(p);
        }
        return Err(anyhow!("configured model_dir {} does not exist", p.display()));
    }
    if let Ok(dir) = std::env::var("SIFTDB_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() {
            return Ok(p);
        }
    }
    for candidate in ["models/bge-m3", "../models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }
    Err(anyhow!("could not locate BGE-M3 model directory; set embedding.model_dir or SIFTDB_MODEL_DIR"))
}
