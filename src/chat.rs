//! Chat service: the three request flows behind the HTTP endpoints.
//!
//! | Flow | System message | Temperature |
//! |------|----------------|-------------|
//! | [`ChatService::chat`] | `system_prompt`, else the named template | creative or `0.0` |
//! | [`ChatService::chat_with_template`] | rendered template | creative or `0.0` |
//! | [`ChatService::rag_chat`] | persona + retrieved context | `0.0` |
//!
//! The service holds only shared, read-only state, so one instance serves
//! any number of concurrent requests.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use kb_chat_core::corpus::Corpus;
use kb_chat_core::models::{ChatMessage, Role};
use kb_chat_core::persona::AgentType;
use kb_chat_core::prompt::{assemble_messages, finalize_output, last_user_message, render_template};
use kb_chat_core::rank::{rank, Retrieval, DEFAULT_TOP_K};

use crate::config::Config;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Usage};
use crate::templates::TemplateRegistry;

/// Body of `/api/openai/chat` and `/api/openai/chat-with-template`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// `null` and absent both mean `false`.
    #[serde(default)]
    pub creative: Option<bool>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub prompt_template: Option<String>,
}

/// Body of `/api/rag/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct RagChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Absent means `true`; an explicit `null` means `false`.
    #[serde(default = "default_use_knowledge_base")]
    pub use_knowledge_base: Option<bool>,
    #[serde(default)]
    pub agent_type: Option<String>,
}

fn default_use_knowledge_base() -> Option<bool> {
    Some(true)
}

impl ChatRequest {
    pub fn is_creative(&self) -> bool {
        self.creative.unwrap_or(false)
    }
}

impl RagChatRequest {
    pub fn uses_knowledge_base(&self) -> bool {
        self.use_knowledge_base.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagChatResponse {
    pub content: String,
    pub model: String,
    pub sources_used: bool,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("prompt template '{0}' not found")]
    TemplateNotFound(String),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error(transparent)]
    Provider(#[from] LlmError),
}

impl ChatError {
    /// True for errors caused by the request rather than the provider.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ChatError::Provider(_))
    }
}

/// Request-independent knobs, taken from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatSettings {
    pub max_tokens: u32,
    pub creative_temperature: f32,
    pub top_k: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            creative_temperature: 0.9,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl From<&Config> for ChatSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_tokens: config.llm.max_tokens,
            creative_temperature: config.llm.creative_temperature,
            top_k: config.knowledge_base.top_k,
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    corpus: Arc<Corpus>,
    templates: Arc<TemplateRegistry>,
    llm: Arc<dyn LlmClient>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        corpus: Arc<Corpus>,
        templates: Arc<TemplateRegistry>,
        llm: Arc<dyn LlmClient>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            corpus,
            templates,
            llm,
            settings,
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    fn temperature(&self, creative: bool) -> f32 {
        if creative {
            self.settings.creative_temperature
        } else {
            0.0
        }
    }

    fn template_body(&self, name: &str) -> Result<&str, ChatError> {
        self.templates
            .content(name)
            .ok_or_else(|| ChatError::TemplateNotFound(name.to_string()))
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
    ) -> Result<crate::llm::Completion, ChatError> {
        let request = CompletionRequest {
            messages,
            temperature,
            max_tokens: self.settings.max_tokens,
        };
        self.llm.complete(&request).await.map_err(|e| {
            tracing::warn!(error = %e, "provider call failed");
            ChatError::Provider(e)
        })
    }

    /// Plain chat: optional system message, then the request messages as sent.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let system = match request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            Some(prompt) => Some(prompt.to_string()),
            None => match request.prompt_template.as_deref() {
                Some(name) => Some(self.template_body(name)?.to_string()),
                None => None,
            },
        };

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.extend(system.map(ChatMessage::system));
        messages.extend(request.messages.iter().cloned());

        let completion = self
            .complete(messages, self.temperature(request.is_creative()))
            .await?;
        Ok(ChatResponse {
            content: completion.content,
            model: self.model().to_string(),
            usage: completion.usage,
        })
    }

    /// Renders the named template with the last message as `{query}` and
    /// the last system message as `{context}`.
    pub async fn chat_with_template(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ChatError> {
        let name = request
            .prompt_template
            .as_deref()
            .ok_or(ChatError::MissingField("prompt_template"))?;
        let template = self.template_body(name)?;

        let query = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let context = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let messages = vec![
            ChatMessage::system(render_template(template, query, context)),
            ChatMessage::user(query),
        ];

        let completion = self
            .complete(messages, self.temperature(request.is_creative()))
            .await?;
        Ok(ChatResponse {
            content: completion.content,
            model: self.model().to_string(),
            usage: completion.usage,
        })
    }

    /// Retrieval-augmented chat: rank, assemble the persona prompt, call the
    /// provider, then apply the persona's output policy.
    pub async fn rag_chat(&self, request: &RagChatRequest) -> Result<RagChatResponse, ChatError> {
        let agent_type = AgentType::parse(request.agent_type.as_deref());

        let retrieval = match last_user_message(&request.messages) {
            Some(query) if request.uses_knowledge_base() => rank(
                query,
                &self.corpus,
                self.settings.top_k,
                request.agent_type.as_deref(),
            ),
            _ => Retrieval::none(),
        };

        let messages = assemble_messages(agent_type, &request.messages, &retrieval);
        tracing::debug!(
            agent_type = agent_type.as_str(),
            matched = retrieval.matched,
            messages = messages.len(),
            "rag chat"
        );

        let completion = self.complete(messages, 0.0).await?;
        Ok(RagChatResponse {
            content: finalize_output(agent_type, &completion.content),
            model: self.model().to_string(),
            sources_used: retrieval.matched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use async_trait::async_trait;
    use kb_chat_core::models::{Fragment, Template, TemplateKind};
    use kb_chat_core::prompt::CONTEXT_HEADER;
    use std::sync::Mutex;

    /// Replies with a fixed text and records every request it receives.
    struct ScriptedLlm {
        reply: Result<String, String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(body: &str) -> Self {
            Self {
                reply: Err(body.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> CompletionRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(Completion {
                    content: text.clone(),
                    usage: Usage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                        total_tokens: 15,
                    },
                }),
                Err(body) => Err(LlmError::Status {
                    status: 503,
                    body: body.clone(),
                }),
            }
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn registry() -> TemplateRegistry {
        TemplateRegistry::from_templates([Template {
            name: "advisor".into(),
            content: "Answer {query} using {context}. Literal {{braces}}.".into(),
            source: "prompts/advisor.prompt.md".into(),
            kind: TemplateKind::File,
        }])
    }

    fn service(llm: Arc<ScriptedLlm>, corpus: Corpus) -> ChatService {
        ChatService::new(
            Arc::new(corpus),
            Arc::new(registry()),
            llm,
            ChatSettings::default(),
        )
    }

    fn fee_corpus() -> Corpus {
        Corpus::from_fragments(vec![
            Fragment::new("Licensing", "category 3A license capital", 1, "licensing.pdf").unwrap(),
            Fragment::new("Schedule", "category 3A license", 4, "DFSA_Fee_Module.pdf").unwrap(),
        ])
    }

    #[tokio::test]
    async fn chat_prefers_system_prompt_over_template() {
        let llm = Arc::new(ScriptedLlm::replying("ok"));
        let svc = service(llm.clone(), Corpus::default_corpus());

        let resp = svc
            .chat(&ChatRequest {
                messages: vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
                system_prompt: Some("Be brief.".into()),
                prompt_template: Some("missing".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(resp.model, "test-model");
        assert_eq!(resp.usage.total_tokens, 15);

        let sent = llm.last();
        assert_eq!(sent.messages[0], ChatMessage::system("Be brief."));
        assert_eq!(sent.messages.len(), 3);
        assert_eq!(sent.temperature, 0.0);
        assert_eq!(sent.max_tokens, 2048);
    }

    #[tokio::test]
    async fn chat_uses_template_and_creative_temperature() {
        let llm = Arc::new(ScriptedLlm::replying("ok"));
        let svc = service(llm.clone(), Corpus::default_corpus());

        svc.chat(&ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            creative: Some(true),
            prompt_template: Some("advisor".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        let sent = llm.last();
        assert_eq!(sent.messages[0].role, Role::System);
        assert!(sent.messages[0].content.starts_with("Answer {query}"));
        assert_eq!(sent.temperature, 0.9);
    }

    #[tokio::test]
    async fn chat_with_unknown_template_is_client_error() {
        let llm = Arc::new(ScriptedLlm::replying("ok"));
        let svc = service(llm.clone(), Corpus::default_corpus());

        let err = svc
            .chat(&ChatRequest {
                messages: vec![ChatMessage::user("hi")],
                prompt_template: Some("nope".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::TemplateNotFound(ref n) if n == "nope"));
        assert!(err.is_client_error());
        assert!(llm.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_with_template_renders_query_and_context() {
        let llm = Arc::new(ScriptedLlm::replying("ok"));
        let svc = service(llm.clone(), Corpus::default_corpus());

        svc.chat_with_template(&ChatRequest {
            messages: vec![
                ChatMessage::system("fee rules"),
                ChatMessage::user("which license?"),
            ],
            prompt_template: Some("advisor".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        let sent = llm.last();
        assert_eq!(
            sent.messages,
            vec![
                ChatMessage::system("Answer which license? using fee rules. Literal {braces}."),
                ChatMessage::user("which license?"),
            ]
        );
    }

    #[tokio::test]
    async fn chat_with_template_requires_template_name() {
        let llm = Arc::new(ScriptedLlm::replying("ok"));
        let svc = service(llm, Corpus::default_corpus());

        let err = svc
            .chat_with_template(&ChatRequest {
                messages: vec![ChatMessage::user("q")],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MissingField("prompt_template")));
    }

    #[tokio::test]
    async fn rag_chat_injects_fee_first_context_and_strips_markdown() {
        let llm = Arc::new(ScriptedLlm::replying("**RECOMMENDED LICENSE:** Category 3A"));
        let svc = service(llm.clone(), fee_corpus());

        let resp = svc
            .rag_chat(&RagChatRequest {
                messages: vec![
                    ChatMessage::system("ignored"),
                    ChatMessage::user("category 3A license capital"),
                ],
                use_knowledge_base: Some(true),
                agent_type: Some("license_recommendation".into()),
            })
            .await
            .unwrap();
        assert_eq!(resp.content, "RECOMMENDED LICENSE: Category 3A");
        assert!(resp.sources_used);

        let sent = llm.last();
        assert_eq!(sent.temperature, 0.0);
        assert_eq!(sent.messages.len(), 2);
        let system = &sent.messages[0].content;
        assert!(system.contains("DFSA Licensing Assistant"));
        let context = system.split(CONTEXT_HEADER).nth(1).unwrap();
        assert!(context.starts_with("[Schedule]"));
        assert_eq!(sent.messages[1], ChatMessage::user("category 3A license capital"));
    }

    #[tokio::test]
    async fn rag_chat_keeps_markdown_for_other_personas() {
        let llm = Arc::new(ScriptedLlm::replying("**bold**"));
        let svc = service(llm.clone(), fee_corpus());

        let resp = svc
            .rag_chat(&RagChatRequest {
                messages: vec![ChatMessage::user("license")],
                use_knowledge_base: Some(true),
                agent_type: Some("regulatory_advisor".into()),
            })
            .await
            .unwrap();
        assert_eq!(resp.content, "**bold**");
        let context = llm.last().messages[0].content.clone();
        let context = context.split(CONTEXT_HEADER).nth(1).unwrap().to_string();
        assert!(context.starts_with("[Licensing]"));
    }

    #[tokio::test]
    async fn rag_chat_without_knowledge_base_or_query_skips_retrieval() {
        let llm = Arc::new(ScriptedLlm::replying("plain"));
        let svc = service(llm.clone(), fee_corpus());

        let resp = svc
            .rag_chat(&RagChatRequest {
                messages: vec![ChatMessage::user("license")],
                use_knowledge_base: Some(false),
                agent_type: None,
            })
            .await
            .unwrap();
        assert!(!resp.sources_used);
        assert_eq!(
            llm.last().messages[0],
            ChatMessage::system("You are a helpful AI assistant.")
        );

        let resp = svc
            .rag_chat(&RagChatRequest {
                messages: vec![ChatMessage::assistant("license")],
                use_knowledge_base: Some(true),
                agent_type: None,
            })
            .await
            .unwrap();
        assert!(!resp.sources_used);
    }

    #[tokio::test]
    async fn provider_failure_is_surfaced() {
        let llm = Arc::new(ScriptedLlm::failing("quota exceeded"));
        let svc = service(llm, Corpus::default_corpus());

        let err = svc
            .rag_chat(&RagChatRequest {
                messages: vec![ChatMessage::user("pricing")],
                use_knowledge_base: Some(true),
                agent_type: None,
            })
            .await
            .unwrap_err();
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn rag_request_defaults_to_knowledge_base() {
        let req: RagChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert!(req.uses_knowledge_base());
        assert!(req.agent_type.is_none());

        let req: RagChatRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"hi"}],"use_knowledge_base":null}"#,
        )
        .unwrap();
        assert!(!req.uses_knowledge_base());
    }

    #[test]
    fn null_creative_means_not_creative() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"hi"}],"creative":null}"#,
        )
        .unwrap();
        assert!(!req.is_creative());
        let req: ChatRequest =
            serde_json::from_str(r#"{"messages":[],"creative":true}"#).unwrap();
        assert!(req.is_creative());
    }
}
