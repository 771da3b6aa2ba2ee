use crate::error::{RagError, Result};
use crate::llm::LlmClientConfig;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use serde::Deserialize;
use serde_json::json;
use std::hash::Hasher;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// An external model mapping text to fixed-dimension vectors.
///
/// Implementations return one vector per input, in input order.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn name(&self) -> &str;
}

/// Adapter over an [`EmbeddingModel`] that checks what the model hands back.
///
/// The vector dimension is recorded on the first non-empty call and every
/// later vector must match it.
pub struct Embedder {
    model: Arc<dyn EmbeddingModel>,
    dimension: OnceLock<usize>,
}

impl Embedder {
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            model,
            dimension: OnceLock::new(),
        }
    }

    /// Dimension observed so far, if the model has been called.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self
            .model
            .embed(texts)
            .await
            .map_err(|e| RagError::EmbeddingUnavailable(format!("{:#}", e)))?;

        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "model {} returned {} vectors for {} inputs",
                self.model.name(),
                vectors.len(),
                texts.len()
            )));
        }

        let observed = vectors[0].len();
        if observed == 0 {
            return Err(RagError::InvalidConfig(format!(
                "model {} returned zero-dimensional vectors",
                self.model.name()
            )));
        }
        let expected = *self.dimension.get_or_init(|| observed);
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RagError::InvalidConfig(format!(
                "embedding dimension changed from {} to {}",
                expected,
                bad.len()
            )));
        }

        debug!(count = vectors.len(), dimension = expected, "embedded texts");
        Ok(vectors)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::EmbeddingUnavailable("no vector returned".into()))
    }
}

lazy_static! {
    static ref STOP_WORDS: FxHashSet<&'static str> = {
        let words = vec![
            "a", "an", "and", "are", "as", "at", "be", "by", "for", "from",
            "has", "he", "in", "is", "it", "its", "of", "on", "that", "the",
            "to", "was", "were", "will", "with"
        ];
        words.into_iter().collect()
    };
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").unwrap();
}

/// Local bag-of-words embedder using the hashing trick.
///
/// Each normalized, non-stop-word token is hashed into one of `dimension`
/// buckets with a hash-derived sign; the term-frequency vector is then
/// L2-normalized. Deterministic across runs and needs no network.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::InvalidConfig(
                "hashing embedder dimension must be positive".into(),
            ));
        }
        Ok(Self { dimension })
    }

    fn tokenize(text: &str) -> Vec<String> {
        let text = text.nfc().collect::<String>().to_lowercase();
        let text = NON_WORD.replace_all(&text, " ");

        text.split_whitespace()
            .filter(|&token| !STOP_WORDS.contains(token))
            .map(|token| token.to_string())
            .collect()
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut term_freq: FxHashMap<String, f32> = FxHashMap::default();
        for token in Self::tokenize(text) {
            *term_freq.entry(token).or_insert(0.0) += 1.0;
        }

        let mut vector = vec![0.0f32; self.dimension];
        for (term, freq) in &term_freq {
            let mut hasher = FxHasher::default();
            hasher.write(term.as_bytes());
            let hash = hasher.finish();
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign * freq;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingModel for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    /// Vectors in input order; the service may list them out of order.
    fn into_vectors(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|item| item.index);
        self.data.into_iter().map(|item| item.embedding).collect()
    }
}

/// Embeddings served by an Azure OpenAI deployment.
pub struct AzureOpenAiEmbedder {
    client: Client,
    config: LlmClientConfig,
}

impl AzureOpenAiEmbedder {
    /// `config.model_name` is the embeddings deployment name.
    pub fn new(config: LlmClientConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model_name,
            self.config.api_version
        )
    }
}

#[async_trait]
impl EmbeddingModel for AzureOpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.config.api_key)
            .json(&json!({ "input": texts }))
            .send()
            .await
            .context("Failed to reach embeddings endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("embeddings endpoint returned {}: {}", status, body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embeddings response")?;
        Ok(parsed.into_vectors())
    }

    fn name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns vectors of a growing dimension on every call.
    struct DriftingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingModel for DriftingModel {
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            let dim = 2 + self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0; dim]).collect())
        }

        fn name(&self) -> &str {
            "drifting"
        }
    }

    struct OfflineModel;

    #[async_trait]
    impl EmbeddingModel for OfflineModel {
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Err(anyhow!("connection refused"))
        }

        fn name(&self) -> &str {
            "offline"
        }
    }

    struct ShortModel;

    #[async_trait]
    impl EmbeddingModel for ShortModel {
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.5, 0.5]])
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_input_skips_model() {
        let embedder = Embedder::new(Arc::new(OfflineModel));
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
        assert_eq!(embedder.dimension(), None);
    }

    #[tokio::test]
    async fn test_model_failure_is_embedding_unavailable() {
        let embedder = Embedder::new(Arc::new(OfflineModel));
        let err = embedder.embed(&strings(&["hello"])).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_count_mismatch_is_embedding_unavailable() {
        let embedder = Embedder::new(Arc::new(ShortModel));
        let err = embedder.embed(&strings(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_dimension_drift_is_rejected() {
        let embedder = Embedder::new(Arc::new(DriftingModel {
            calls: AtomicUsize::new(0),
        }));
        embedder.embed(&strings(&["first"])).await.unwrap();
        assert_eq!(embedder.dimension(), Some(2));

        let err = embedder.embed(&strings(&["second"])).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
        assert_eq!(embedder.dimension(), Some(2));
    }

    #[tokio::test]
    async fn test_hashing_embedder_preserves_order_and_dimension() {
        let embedder = Embedder::new(Arc::new(HashingEmbedder::new(64).unwrap()));
        let vectors = embedder
            .embed(&strings(&["The dog ran", "a bird flew", "The dog ran"]))
            .await
            .unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 64));
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
        assert_eq!(embedder.dimension(), Some(64));
    }

    #[test]
    fn test_hashing_vectors_are_normalized() {
        let model = HashingEmbedder::new(32).unwrap();
        let vector = model.embed_text("Rust makes systems programming pleasant");
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let empty = model.embed_text("the of and");
        assert!(empty.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_punctuation() {
        let tokens = HashingEmbedder::tokenize("The Dog ran, to the PARK!");
        assert_eq!(tokens, vec!["dog", "ran", "park"]);
    }

    #[test]
    fn test_embedding_response_is_reordered_by_index() {
        let raw = r#"{"data":[
            {"object":"embedding","index":2,"embedding":[0.3]},
            {"object":"embedding","index":0,"embedding":[0.1]},
            {"object":"embedding","index":1,"embedding":[0.2]}
        ]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_vectors(), vec![vec![0.1], vec![0.2], vec![0.3]]);
    }

    #[test]
    fn test_zero_dimension_is_rejected() {
        assert!(matches!(HashingEmbedder::new(0), Err(RagError::InvalidConfig(_))));
    }
}
