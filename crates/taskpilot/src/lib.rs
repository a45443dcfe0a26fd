//! Stateless tool-calling agent core for a task-management chat assistant.
//!
//! `taskpilot` turns a user message plus conversation history into a sequence
//! of LLM completions interleaved with externally-executed tool operations
//! (task CRUD, summaries, prioritization). The core abstraction is the
//! [`Orchestrator`](agent::orchestrator::Orchestrator) — a per-run loop that
//! sends messages + tool definitions to the model, executes requested tool
//! calls via the [`ToolRegistry`](tools::core::ToolRegistry), appends results,
//! and repeats until the model produces a text-only response or the tool-call
//! budget is exhausted.
//!
//! Every run is stateless: the caller supplies the loaded history, the run
//! owns its working copy, and the full audit trail of tool executions is
//! returned for persistence. One short-lived credential is minted per run and
//! injected into every tool call — the model never sees it.
//!
//! # Getting started
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskpilot::agent::config::AgentConfig;
//! use taskpilot::agent::orchestrator::Orchestrator;
//! use taskpilot::api::client::OpenAiCompatClient;
//! use taskpilot::auth::{CredentialMinter, CredentialVerifier};
//! use taskpilot::tools::tasks::{task_toolset, InMemoryTaskStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = std::env::var("GEMINI_API_KEY").unwrap();
//!     let client = OpenAiCompatClient::new(api_key)?;
//!
//!     let store = Arc::new(InMemoryTaskStore::new());
//!     let secret = "change-me";
//!     let registry = task_toolset(store, CredentialVerifier::new(secret));
//!     let minter = CredentialMinter::new(secret);
//!
//!     let outcome = Orchestrator::new(&client, &registry, &minter, AgentConfig::default())
//!         .run(user_id, "create a task to buy milk due tomorrow", &[])
//!         .await
//!         .map_err(|e| e.to_string())?;
//!
//!     println!("{}", outcome.final_text);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **The agent loop:** [`Orchestrator`](agent::orchestrator::Orchestrator)
//!   and [`AgentConfig`](agent::config::AgentConfig). The loop deduplicates
//!   repeated tool requests, bounds executions per run, and feeds tool errors
//!   back to the model instead of failing.
//! - **Defining tools:** the [`Tool`](tools::core::Tool) trait and
//!   [`ToolRegistry`](tools::core::ToolRegistry). The built-in task tools
//!   live in [`tools::tasks`].
//! - **Invocation mechanics:** [`tools::invoke`] handles name resolution,
//!   argument parsing/coercion, schema validation, credential injection,
//!   and timeouts.
//! - **Result shapes:** [`normalize`] converts heterogeneous tool outputs
//!   into a canonical JSON value before they re-enter the conversation.
//! - **Talking to the model:** [`api::client`] is the only provider-aware
//!   component. Swapping providers means replacing that adapter.
//! - **Errors:** [`error`] separates the recoverable tool-error taxonomy
//!   from the fatal run errors, and documents how each propagates.

pub mod agent;
pub mod api;
pub mod auth;
pub mod error;
pub mod nlp;
pub mod normalize;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default model for completion calls.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between strong Rust types
/// and the `serde_json::Value` that the function-calling API expects.
///
/// # Example
///
/// ```
/// use taskpilot::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct CreateArgs {
///     title: String,
///     #[serde(default)]
///     description: Option<String>,
/// }
///
/// let schema = json_schema_for::<CreateArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"title".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A turn in the conversation.
///
/// A tool-role message always refers back, via `tool_call_id`, to a tool call
/// requested by a preceding assistant-role message.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// An assistant turn carrying tool-call requests, with optional text
    /// alongside (some models narrate while requesting tools).
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool-call request returned by the model. The `id` correlates the
/// eventual tool result back to this specific request within a round.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    /// Convenience constructor, mainly for tests and scripted clients.
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionCallData {
    pub name: String,
    /// Raw JSON arguments string as produced by the model. May be malformed;
    /// the invoker owns parsing and coercion.
    pub arguments: String,
}

// ── Request / response types ───────────────────────────────────────

/// Chat completion request body (OpenAI-compatible wire shape).
#[derive(Serialize, Clone, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

/// Clean return type from a completion call: either a final text answer,
/// a set of requested tool invocations, or both.
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// A completion carrying only text (no tool-call requests).
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A completion requesting tool calls.
    pub fn with_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Default::default()
        }
    }
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}
