use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use edurag_core::config::{expand_path, EmbeddingConfig};
use edurag_core::traits::Embedder;

mod device;
mod pool;
mod tokenize;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

pub const MINILM_DIM: usize = 384;
const PAD_ID: u32 = 0;

/// Sentence-transformers MiniLM (BERT) loaded from a local directory holding
/// `config.json`, `tokenizer.json` and `model.safetensors` (or `pytorch_model.bin`).
pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl MiniLmEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_dir = resolve_model_dir(config)?;
        Self::from_dir(&model_dir, config.max_len)
    }

    pub fn from_dir(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(MINILM_DIM);

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config)?;
        info!(dim, max_len, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len })
    }
}

impl Embedder for MiniLmEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, PAD_ID, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let out: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        debug!(batch = texts.len(), ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return candle_core::safetensors::load(&safetensors, device)
            .with_context(|| format!("reading {}", safetensors.display()));
    }
    let pickle = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&pickle).with_context(|| format!("reading {}", pickle.display()))?;
    Ok(weights.into_iter().collect())
}

/// Deterministic bag-of-words embedder: every whitespace token is hashed into a
/// bucket, the vector is L2-normalised. Needs no model files.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// The embedder selected by configuration: the hashing fake when `use_fake` is
/// set (or `APP_USE_FAKE_EMBEDDINGS=1`), the MiniLM model otherwise.
pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if config.use_fake || env_fake {
        warn!(dim = MINILM_DIM, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(MINILM_DIM)));
    }
    Ok(Box::new(MiniLmEmbedder::new(config)?))
}

/// First existing directory among `model_dir` from config, `APP_MODEL_DIR`,
/// `MODEL_DIR`, then `models/<model>` and `../models/<model>`.
pub fn resolve_model_dir(config: &EmbeddingConfig) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = &config.model_dir {
        candidates.push(expand_path(dir));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            candidates.push(expand_path(dir));
        }
    }
    candidates.push(Path::new("models").join(&config.model));
    candidates.push(Path::new("../models").join(&config.model));

    for dir in &candidates {
        if dir.is_dir() {
            debug!(dir = %dir.display(), "resolved model dir");
            return Ok(dir.clone());
        }
    }
    Err(anyhow!(
        "Could not locate the {} model directory (tried: {})",
        config.model,
        candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
    ))
}
