use crate::chunker::{chunk_words, Chunk};
use crate::config::RagConfig;
use crate::embedder::{Embedder, EmbeddingModel};
use crate::error::{RagError, Result};
use crate::llm::{AnswerSynthesizer, CompletionRequest, LlmClientConfig};
use crate::vector_db::VectorIndex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A chunk returned for a question, with its distance to the question.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// A document together with the chunks and index derived from it.
///
/// Vector `i` of `index` was embedded from `chunks[i]`.
struct IndexedDocument {
    document: String,
    chunks: Vec<Chunk>,
    index: VectorIndex,
}

impl IndexedDocument {
    fn new(document: String, chunks: Vec<Chunk>, index: VectorIndex) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(RagError::InvalidConfig(format!(
                "index holds {} vectors for {} chunks",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            document,
            chunks,
            index,
        })
    }
}

enum SessionState {
    Empty,
    Ready(IndexedDocument),
}

/// Question answering over one ingested document.
///
/// Created empty; `ingest` replaces the document wholesale and `answer`
/// retrieves from whatever was ingested last.
pub struct Session {
    id: Uuid,
    config: RagConfig,
    embedder: Embedder,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    state: SessionState,
}

impl Session {
    pub fn new(
        config: RagConfig,
        model: Arc<dyn EmbeddingModel>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            config,
            embedder: Embedder::new(model),
            synthesizer,
            state: SessionState::Empty,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    /// Chunks of the current document; empty before the first ingest.
    pub fn chunks(&self) -> &[Chunk] {
        match &self.state {
            SessionState::Ready(doc) => &doc.chunks,
            SessionState::Empty => &[],
        }
    }

    pub fn document(&self) -> Option<&str> {
        match &self.state {
            SessionState::Ready(doc) => Some(&doc.document),
            SessionState::Empty => None,
        }
    }

    /// Drop the current document and return to the empty state.
    pub fn reset(&mut self) {
        self.state = SessionState::Empty;
    }

    /// Chunk, embed and index `text`, replacing any previous document.
    ///
    /// On failure the previous document stays in place.
    pub async fn ingest(&mut self, text: impl Into<String>) -> Result<&[Chunk]> {
        let document = text.into();
        let chunks = chunk_words(&document, self.config.chunk_size, self.config.overlap)?;
        debug!(session = %self.id, chunks = chunks.len(), "chunked document");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        let index = VectorIndex::build(vectors).map_err(|e| {
            if chunks.is_empty() {
                warn!(session = %self.id, "document contains no text");
                RagError::InvalidConfig("document contains no text".into())
            } else {
                e
            }
        })?;

        let indexed = IndexedDocument::new(document, chunks, index)?;
        info!(
            session = %self.id,
            chunks = indexed.chunks.len(),
            dimension = indexed.index.dimension(),
            "document ingested"
        );
        self.state = SessionState::Ready(indexed);
        Ok(self.chunks())
    }

    /// The chunks nearest to `question`, closest first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let doc = match &self.state {
            SessionState::Ready(doc) => doc,
            SessionState::Empty => return Err(RagError::NotReady),
        };

        let query = self.embedder.embed_one(question).await?;
        let neighbors = doc.index.search(&query, self.config.top_k)?;

        let retrieved = neighbors
            .into_iter()
            .filter(|n| self.config.max_distance.map_or(true, |max| n.distance <= max))
            .filter_map(|n| {
                doc.chunks.get(n.index).map(|chunk| RetrievedChunk {
                    chunk: chunk.clone(),
                    distance: n.distance,
                })
            })
            .collect::<Vec<_>>();

        debug!(
            session = %self.id,
            hits = ?retrieved.iter().map(|r| r.chunk.index).collect::<Vec<_>>(),
            "retrieved chunks"
        );
        Ok(retrieved)
    }

    /// Answer `question` from the ingested document.
    ///
    /// The synthesizer is called once; its failure leaves the session intact.
    pub async fn answer(&self, question: &str, client: &LlmClientConfig) -> Result<String> {
        let retrieved = self.retrieve(question).await?;
        let context = retrieved
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let request = CompletionRequest::new(
            client.clone(),
            &context,
            question,
            self.config.temperature,
            self.config.max_output_tokens,
        );

        let answer = self.synthesizer.complete(&request).await.map_err(|e| {
            warn!(session = %self.id, error = %e, "answer synthesis failed");
            RagError::SynthesisUnavailable(format!("{:#}", e))
        })?;

        info!(session = %self.id, context_chunks = retrieved.len(), "answered question");
        Ok(answer)
    }
}
