//! Async HTTP client for OpenAI-compatible chat-completion endpoints.
//!
//! This is the only provider-aware component. The orchestrator talks to the
//! dyn-compatible [`CompletionClient`] trait; swapping providers means
//! replacing [`OpenAiCompatClient`] (or pointing it at a different base URL).
//! Provider failures always surface as [`AgentError::Llm`] — they are never
//! conflated with tool errors and never shown to the model.

use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::AgentError;
use crate::{ChatCompletion, ChatRequest, ToolCall, UsageInfo};

/// Gemini's OpenAI-compatibility bridge, the default provider endpoint.
pub const GEMINI_OPENAI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";

/// Boxed future returned by [`CompletionClient::complete`].
pub type CompletionFuture<'a> = BoxFuture<'a, Result<ChatCompletion, AgentError>>;

/// A chat-completion provider.
///
/// Uses a boxed future so that the trait is dyn-compatible (object-safe);
/// the orchestrator holds a `&dyn CompletionClient`.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> CompletionFuture<'_>;
}

// ── Raw response types ─────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl OpenAiCompatClient {
    /// Create a new client against the default (Gemini bridge) endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AgentError> {
        Self::with_url(api_key, GEMINI_OPENAI_URL)
    }

    /// Create a new client against a custom endpoint URL.
    pub fn with_url(api_key: impl Into<String>, url: impl Into<String>) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .user_agent("taskpilot/0.3")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AgentError::Llm(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: url.into(),
        })
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, AgentError> {
        let msg_count = body.messages.len();
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}, temp={}",
            body.model, msg_count, tool_count, body.max_tokens, body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::Llm(format!("failed to read response: {e}")))?;

        let elapsed = start.elapsed();
        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            elapsed.as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(AgentError::Llm(format!("provider HTTP {status}: {text}")));
        }

        let parsed: RawChatResponse = serde_json::from_str(&text)
            .map_err(|e| AgentError::Llm(format!("failed to parse response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(AgentError::Llm(format!("provider error: {}", err.message)));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        let choice = parsed.choices.and_then(|c| c.into_iter().next());

        match choice {
            Some(c) => {
                let content_len = c.message.content.as_ref().map_or(0, |s| s.len());
                let tc_count = c.message.tool_calls.as_ref().map_or(0, |t| t.len());
                debug!("LLM output: {content_len} chars text, {tc_count} tool call(s)");
                Ok(ChatCompletion {
                    content: c.message.content,
                    tool_calls: c.message.tool_calls.unwrap_or_default(),
                    usage: parsed.usage,
                    finish_reason: c.finish_reason,
                })
            }
            None => {
                debug!("LLM output: empty (no choices)");
                Ok(ChatCompletion {
                    content: None,
                    tool_calls: vec![],
                    usage: parsed.usage,
                    finish_reason: None,
                })
            }
        }
    }
}

impl CompletionClient for OpenAiCompatClient {
    fn complete(&self, request: &ChatRequest) -> CompletionFuture<'_> {
        // Own a copy so the future borrows only the client.
        let request = request.clone();
        Box::pin(async move { self.chat(&request).await })
    }
}

// ── Tests ──────────────────────────────────────────────────────────
