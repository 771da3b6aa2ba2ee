use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// System instruction sent with every question.
pub const SYSTEM_MESSAGE: &str =
    "You are a helpful assistant. Answer only using the provided context.";

/// Where and how to reach the completion endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmClientConfig {
    pub api_key: String,
    pub endpoint: String,
    pub api_version: String,
    pub model_name: String,
}

impl std::fmt::Debug for LlmClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClientConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl LlmClientConfig {
    /// Read credentials from `AZURE_API_KEY`, `AZURE_API_BASE` and
    /// `AZURE_API_VERSION`. `AZURE_DEPLOYMENT` overrides `default_model`.
    pub fn from_env(default_model: &str) -> anyhow::Result<Self> {
        let api_key = env::var("AZURE_API_KEY").context("AZURE_API_KEY is not set")?;
        let endpoint = env::var("AZURE_API_BASE").context("AZURE_API_BASE is not set")?;
        let api_version =
            env::var("AZURE_API_VERSION").context("AZURE_API_VERSION is not set")?;
        let model_name =
            env::var("AZURE_DEPLOYMENT").unwrap_or_else(|_| default_model.to_string());

        let config = Self {
            api_key,
            endpoint,
            api_version,
            model_name,
        };
        config.check()?;
        Ok(config)
    }

    /// Same credentials, different deployment.
    pub fn with_model(&self, model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..self.clone()
        }
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty()
            || self.endpoint.trim().is_empty()
            || self.api_version.trim().is_empty()
        {
            return Err(anyhow!(
                "Please provide the API key, endpoint and API version of the completion service"
            ));
        }
        Ok(())
    }
}

/// One completion call: credentials, prompt and sampling parameters.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub client: LlmClientConfig,
    pub system_message: String,
    pub user_message: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl CompletionRequest {
    pub fn new(
        client: LlmClientConfig,
        context: &str,
        question: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            client,
            system_message: SYSTEM_MESSAGE.to_string(),
            user_message: construct_prompt(context, question),
            temperature,
            max_output_tokens,
        }
    }
}

fn construct_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following context, please answer the question.\n\
         Context: {context}\n\
         Question: {question}\n\
         Answer:"
    )
}

/// Produces an answer text from a completion request.
///
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat completions against an Azure OpenAI deployment.
pub struct AzureOpenAiSynthesizer {
    client: Client,
}

impl AzureOpenAiSynthesizer {
    /// `timeout` bounds the whole round trip of each request.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    fn url(config: &LlmClientConfig) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            config.endpoint.trim_end_matches('/'),
            config.model_name,
            config.api_version
        )
    }
}

#[async_trait]
impl AnswerSynthesizer for AzureOpenAiSynthesizer {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        request.client.check()?;

        let body = ChatRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_message,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_message,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let response = self
            .client
            .post(Self::url(&request.client))
            .header("api-key", &request.client.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach completion endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion endpoint returned {}: {}", status, text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("completion response contained no message"))
    }
}
