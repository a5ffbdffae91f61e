//! LLM provider seam.
//!
//! [`LlmClient`] is the only thing the chat service knows about the model
//! provider. [`AzureOpenAiClient`] is the production implementation; tests
//! substitute scripted clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use kb_chat_core::models::ChatMessage;

use crate::config::{Credentials, LlmConfig};

/// One provider call: the ordered messages plus sampling limits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token accounting reported by the provider. Absent counts are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Usage,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// A chat-completion provider. Implementations hold no per-call state and
/// are shared across requests as `Arc<dyn LlmClient>`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;

    /// Model (deployment) name reported back to callers.
    fn model(&self) -> &str;
}

/// Azure OpenAI chat-completions client.
pub struct AzureOpenAiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    deployment: String,
}

impl AzureOpenAiClient {
    pub fn new(credentials: &Credentials, config: &LlmConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: completions_url(&credentials.endpoint, &config.deployment, &config.api_version),
            api_key: credentials.api_key.clone(),
            deployment: config.deployment.clone(),
        })
    }
}

/// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}`
pub fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Extracts `choices[0].message.content` and the usage block from a
/// chat-completions response body.
pub fn parse_completion(body: &str) -> Result<Completion, LlmError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| LlmError::MalformedResponse("missing choices[0].message.content".into()))?;

    Ok(Completion {
        content,
        usage: parsed.usage.unwrap_or_default(),
    })
}

#[async_trait]
impl LlmClient for AzureOpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_completion(&body)
    }

    fn model(&self) -> &str {
        &self.deployment
    }
}
