use thiserror::Error;

/// Errors surfaced by the retrieval core.
#[derive(Error, Debug)]
pub enum RagError {
    /// Bad chunking, index or model parameters. Caller error, not retryable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding model could not be loaded or failed to run.
    #[error("Embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A question was asked before any document was ingested.
    #[error("Please upload a document first.")]
    NotReady,

    /// The answer synthesizer (LLM endpoint) call failed.
    #[error("Could not get an answer from the language model: {0}")]
    SynthesisUnavailable(String),
}

impl RagError {
    /// Whether the same call can succeed later without changing configuration.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::NotReady | RagError::SynthesisUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_message_is_guidance() {
        let err = RagError::NotReady;
        assert!(err.to_string().contains("upload a document"));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(RagError::NotReady.is_retryable());
        assert!(RagError::SynthesisUnavailable("401".into()).is_retryable());
        assert!(!RagError::InvalidConfig("overlap".into()).is_retryable());
        assert!(!RagError::EmbeddingUnavailable("offline".into()).is_retryable());
    }
}
