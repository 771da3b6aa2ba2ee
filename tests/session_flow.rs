use async_trait::async_trait;
use docqa::{
    AnswerSynthesizer, CompletionRequest, EmbeddingModel, LlmClientConfig, RagConfig, RagError,
    Session,
};
use std::sync::{Arc, Mutex};

/// Counts occurrences of a fixed vocabulary, one dimension per word.
struct KeywordModel {
    vocabulary: Vec<&'static str>,
}

impl KeywordModel {
    fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
        }
    }
}

#[async_trait]
impl EmbeddingModel for KeywordModel {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let words: Vec<String> = text
                    .split_whitespace()
                    .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
                    .collect();
                self.vocabulary
                    .iter()
                    .map(|v| words.iter().filter(|w| w.as_str() == *v).count() as f32)
                    .collect()
            })
            .collect())
    }

    fn name(&self) -> &str {
        "keywords"
    }
}

#[derive(Default)]
struct RecordingSynthesizer {
    requests: Mutex<Vec<CompletionRequest>>,
}

#[async_trait]
impl AnswerSynthesizer for RecordingSynthesizer {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok("The dog ran.".to_string())
    }
}

fn credentials() -> LlmClientConfig {
    LlmClientConfig {
        api_key: "test-key".into(),
        endpoint: "https://example.invalid".into(),
        api_version: "2024-02-01".into(),
        model_name: "test-deployment".into(),
    }
}

fn animal_session(synthesizer: Arc<RecordingSynthesizer>) -> Session {
    let config = RagConfig {
        chunk_size: 4,
        overlap: 1,
        ..RagConfig::default()
    };
    let model = Arc::new(KeywordModel::new(&["cat", "dog", "bird", "fish", "swam"]));
    Session::new(config, model, synthesizer).unwrap()
}

#[tokio::test]
async fn test_question_about_dog_retrieves_second_chunk() {
    let synthesizer = Arc::new(RecordingSynthesizer::default());
    let mut session = animal_session(synthesizer.clone());

    let chunks: Vec<String> = session
        .ingest("The cat sat. The dog ran. The bird flew.")
        .await
        .unwrap()
        .iter()
        .map(|c| c.text.clone())
        .collect();
    assert_eq!(chunks, vec!["The cat sat. The", "The dog ran. The", "The bird flew."]);

    let hits = session.retrieve("Where did the dog go?").await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk.index, 1);
    assert_eq!(hits[0].distance, 0.0);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    let answer = session.answer("Where did the dog go?", &credentials()).await.unwrap();
    assert_eq!(answer, "The dog ran.");

    let requests = synthesizer.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .user_message
        .contains("Context: The dog ran. The The cat sat. The The bird flew."));
    assert!(requests[0].user_message.contains("Question: Where did the dog go?"));
    assert_eq!(requests[0].client.model_name, "test-deployment");
}

#[tokio::test]
async fn test_answer_before_ingest_is_not_ready() {
    let synthesizer = Arc::new(RecordingSynthesizer::default());
    let session = animal_session(synthesizer.clone());

    let err = session.answer("Anything?", &credentials()).await.unwrap_err();
    assert!(matches!(err, RagError::NotReady));
    assert!(synthesizer.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_reingest_replaces_previous_document() {
    let synthesizer = Arc::new(RecordingSynthesizer::default());
    let mut session = animal_session(synthesizer);

    session
        .ingest("The cat sat. The dog ran. The bird flew.")
        .await
        .unwrap();
    session.ingest("A fish swam.").await.unwrap();

    assert_eq!(session.chunks().len(), 1);
    assert_eq!(session.document(), Some("A fish swam."));

    let hits = session.retrieve("What did the dog do?").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.index, 0);
    assert_eq!(hits[0].chunk.text, "A fish swam.");
}

#[tokio::test]
async fn test_top_k_limits_context() {
    let config = RagConfig {
        chunk_size: 4,
        overlap: 1,
        top_k: 1,
        ..RagConfig::default()
    };
    let synthesizer = Arc::new(RecordingSynthesizer::default());
    let model = Arc::new(KeywordModel::new(&["cat", "dog", "bird"]));
    let mut session = Session::new(config, model, synthesizer.clone()).unwrap();
    session
        .ingest("The cat sat. The dog ran. The bird flew.")
        .await
        .unwrap();

    session.answer("bird", &credentials()).await.unwrap();
    let requests = synthesizer.requests.lock().unwrap();
    assert!(requests[0].user_message.contains("Context: The bird flew.\n"));
}
