//! HTTP client wrapper for the OpenRouter chat-completions API.

use crate::chat::{ChatError, context::PromptContext};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// Sampling temperature used for every completion; answers should stay close
/// to the document rather than improvise.
const TEMPERATURE: f32 = 0.3;

/// Lightweight HTTP client for OpenRouter completions.
pub struct OpenRouterService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) max_completion_tokens: u32,
}

/// Abstraction over the completion backend used by the HTTP surface.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Request a single answer for the assembled context. No retries, no streaming.
    async fn ask(&self, context: &PromptContext) -> Result<String, ChatError>;
}

impl OpenRouterService {
    /// Construct a new client from the supplied configuration.
    pub fn new(config: &Config) -> Result<Self, ChatError> {
        let client = Client::builder().user_agent("xraydesk/0.1").build()?;
        Ok(Self {
            client,
            base_url: config.openrouter_base_url.trim_end_matches('/').to_string(),
            api_key: config.openrouter_api_key.clone(),
            model: config.chat_model.clone(),
            max_completion_tokens: config.completion_max_tokens,
        })
    }

    /// Send one completion request and return the generated answer verbatim.
    pub async fn ask(&self, context: &PromptContext) -> Result<String, ChatError> {
        let prompt = build_prompt(context);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": TEMPERATURE,
            "max_tokens": self.max_completion_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Title", "xraydesk")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = ChatError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Completion request failed");
            return Err(error);
        }

        let payload: CompletionResponse = response.json().await?;
        let answer = payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ChatError::EmptyResponse)?;

        tracing::debug!(
            model = %self.model,
            context_tokens = context.token_estimate,
            "Completion received"
        );
        Ok(answer)
    }
}

#[async_trait]
impl ChatApi for OpenRouterService {
    async fn ask(&self, context: &PromptContext) -> Result<String, ChatError> {
        OpenRouterService::ask(self, context).await
    }
}

/// Render the full prompt sent to the completion API.
///
/// Mirrors the structured prompt the UI always used: document information
/// block, the user question, then answering instructions.
fn build_prompt(context: &PromptContext) -> String {
    let document_block = if context.document_context.is_empty() {
        "No document context available. Answer the question based on general knowledge."
    } else {
        context.document_context.as_str()
    };

    format!(
        "You are an AI assistant helping analyze a document. You have access to the following document information:\n\
         \n\
         {document_block}\n\
         \n\
         User Question: {question}\n\
         \n\
         Instructions:\n\
         - Answer the question directly and concisely\n\
         - Use Document Content for specific details\n\
         - Use Summary for general overview\n\
         - Don't add unnecessary disclaimers or explanations\n\
         - If you don't have the information, simply say \"I don't have enough information to answer that question\"\n\
         - Keep responses focused and to the point\n\
         \n\
         Response:",
        question = context.question,
    )
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}
