use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use ragchat_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

/// BGE-M3 dense embeddings from local XLM-RoBERTa weights.
///
/// The model directory must hold `tokenizer.json`, `config.json` and either
/// `model.safetensors` or `pytorch_model.bin`.
pub struct BgeM3Embedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    id: String,
}

impl BgeM3Embedder {
    pub fn from_dir(model_dir: &Path, max_len: usize) -> Result<Self> {
        if !model_dir.is_dir() {
            bail!("BGE-M3 model directory not found: {}", model_dir.display());
        }
        let device = select_device();
        info!("Loading BGE-M3 model from {}", model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let dim = config.hidden_size;
        info!(dim, "BGE-M3 model loaded");

        Ok(Self { model, tokenizer, device, dim, max_len: max_len.max(1), id: format!("bge-m3:d{dim}") })
    }

    fn forward(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        if let Some(bad) = rows.iter().find(|r| r.len() != self.dim) {
            bail!("embedding dim {} != expected {}", bad.len(), self.dim);
        }
        Ok(rows)
    }
}

impl Embedder for BgeM3Embedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let start = Instant::now();
        let out = self.forward(texts)?;
        debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return candle_core::safetensors::load(&safetensors, device)
            .with_context(|| format!("loading {}", safetensors.display()));
    }
    let pickle: PathBuf = model_dir.join("pytorch_model.bin");
    let tensors = candle_core::pickle::read_all(&pickle).with_context(|| format!("loading {}", pickle.display()))?;
    Ok(tensors.into_iter().collect())
}
