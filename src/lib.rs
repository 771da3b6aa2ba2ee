//! Question answering over a single PDF or text document.
//!
//! Text is split into overlapping word windows, embedded, and indexed for
//! exact nearest-neighbour search. Questions retrieve the closest chunks and
//! hand them, with the question, to an answer synthesizer.

pub mod chunker;
pub mod config;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod minilm;
pub mod retriever;
pub mod utils;
pub mod vector_db;

pub use chunker::{chunk_words, Chunk};
pub use config::{Config, EmbedderKind, RagConfig};
pub use embedder::{AzureOpenAiEmbedder, Embedder, EmbeddingModel, HashingEmbedder};
pub use error::{RagError, Result};
pub use minilm::MiniLmEmbedder;
pub use llm::{AnswerSynthesizer, AzureOpenAiSynthesizer, CompletionRequest, LlmClientConfig};
pub use retriever::{RetrievedChunk, Session};
pub use vector_db::{Neighbor, VectorIndex};
