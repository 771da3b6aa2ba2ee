use crate::embedder::EmbeddingModel;
use crate::error::{RagError, Result};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::info;

pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Longest input, in word pieces, the sentence model was trained on.
const MAX_SEQUENCE_LENGTH: usize = 256;

struct Loaded {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// Sentence embeddings from a BERT-family model run locally with Candle.
///
/// Token embeddings are mean-pooled over the attention mask and
/// L2-normalized, matching how sentence-transformers serves MiniLM.
pub struct MiniLmEmbedder {
    model_id: String,
    inner: Arc<Loaded>,
}

impl MiniLmEmbedder {
    /// Download (first use only) and load `model_id` from the HuggingFace Hub.
    ///
    /// Blocks on network and disk; call it off the async runtime.
    pub fn load(model_id: &str) -> Result<Self> {
        Self::try_load(model_id)
            .map_err(|e| RagError::EmbeddingUnavailable(format!("{}: {:#}", model_id, e)))
    }

    fn try_load(model_id: &str) -> anyhow::Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .context("Failed to download model config")?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context("Failed to download tokenizer")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("Failed to download model weights")?;

        let config: Config = serde_json::from_str(
            &std::fs::read_to_string(config_path).context("Failed to read config file")?,
        )
        .context("Failed to parse model config")?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .context("Failed to load model weights")?
        };
        let model = BertModel::load(vb, &config).context("Failed to create BERT model")?;

        info!(model = model_id, "embedding model loaded");
        Ok(Self {
            model_id: model_id.to_string(),
            inner: Arc::new(Loaded {
                model,
                tokenizer,
                device,
            }),
        })
    }
}

impl Loaded {
    fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let batch_size = encodings.len();
        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        let mut ids = vec![0u32; batch_size * max_len];
        let mut mask = vec![0u32; batch_size * max_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let offset = row * max_len;
            let len = encoding.get_ids().len();
            ids[offset..offset + len].copy_from_slice(encoding.get_ids());
            mask[offset..offset + len].copy_from_slice(encoding.get_attention_mask());
        }

        let token_ids = Tensor::from_vec(ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (batch_size, max_len), &self.device)?;
        let token_type_ids = token_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = mean_pool(&hidden, &attention_mask)?;
        let normalized = l2_normalize(&pooled)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> anyhow::Result<Tensor> {
    let mask = attention_mask
        .unsqueeze(2)?
        .expand(hidden.shape())?
        .to_dtype(hidden.dtype())?;

    let summed = (hidden * &mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    Ok(summed.broadcast_div(&counts)?)
}

fn l2_normalize(vectors: &Tensor) -> anyhow::Result<Tensor> {
    let norms = vectors.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
    Ok(vectors.broadcast_div(&norms)?)
}

#[async_trait]
impl EmbeddingModel for MiniLmEmbedder {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || inner.embed_batch(texts))
            .await
            .context("Embedding task panicked")?
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}
