//! The per-run agent loop.
//!
//! [`Orchestrator::run`] drives one chat turn: it sends the conversation and
//! tool definitions to the model, executes requested tool calls through the
//! invoker, appends results, and repeats until the model answers with plain
//! text or a bound is hit. Each run is stateless — the caller supplies the
//! history, the run owns its working copy, and everything that happened comes
//! back in the [`RunOutcome`].
//!
//! Two safety rails bound every run: executed tool calls are capped by
//! `max_tool_calls` (counted per call, not per round), and a repeated request
//! with an identical name and canonicalized arguments is never executed twice
//! within a run.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::config::AgentConfig;
use crate::api::client::CompletionClient;
use crate::auth::CredentialMinter;
use crate::error::{AgentError, TimeoutStage};
use crate::tools::core::ToolRegistry;
use crate::tools::invoke::{InvocationStatus, invoke};
use crate::{ChatRequest, Message, ToolCall};

/// Reply used when the tool-call budget runs out mid-request.
const BUDGET_EXHAUSTED_REPLY: &str = "I wasn't able to finish everything within \
the limit on task operations for a single request. Here's what I completed so \
far; please try the rest as a smaller, more specific request.";

// ── Outcome types ──────────────────────────────────────────────────

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationReason {
    /// The model produced a text-only response.
    Completed,
    /// Every request in a round was a duplicate of an already-executed call.
    Stalled,
    /// The executed-tool-call budget ran out.
    MaxIterationsExceeded,
    /// The caller's stop signal fired.
    Cancelled,
    /// Caller-side label for a run that returned `Err`; `run` itself never
    /// produces this variant.
    FatalError,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::Completed => write!(f, "completed"),
            TerminationReason::Stalled => write!(f, "stalled"),
            TerminationReason::MaxIterationsExceeded => write!(f, "maxIterationsExceeded"),
            TerminationReason::Cancelled => write!(f, "cancelled"),
            TerminationReason::FatalError => write!(f, "fatalError"),
        }
    }
}

/// Audit entry for one executed tool call. Errors are recorded the same as
/// successes — nothing is silently dropped.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    /// Arguments as executed (parsed and coerced), or the raw string for
    /// requests that never parsed.
    pub arguments: Value,
    pub result: Value,
    pub status: InvocationStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub final_text: String,
    pub audit_trail: Vec<ToolCallRecord>,
    pub iterations_used: u32,
    pub termination_reason: TerminationReason,
}

// ── Run state ──────────────────────────────────────────────────────

/// Working state owned by a single `run` call. Concurrent runs share nothing.
struct RunState {
    messages: Vec<Message>,
    /// Signatures of every executed call; only ever grows.
    executed: HashSet<(String, String)>,
    iterations: u32,
    audit: Vec<ToolCallRecord>,
    /// Most recent non-empty assistant text, for best-effort final replies.
    last_text: String,
}

impl RunState {
    fn new(system_prompt: Option<&str>, history: &[Message], user_message: &str) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(prompt) = system_prompt {
            messages.push(Message::system(prompt));
        }
        messages.extend_from_slice(history);
        messages.push(Message::user(user_message));
        Self {
            messages,
            executed: HashSet::new(),
            iterations: 0,
            audit: Vec::new(),
            last_text: String::new(),
        }
    }

    fn finish(self, reason: TerminationReason, final_text: String) -> RunOutcome {
        info!(
            "Agent run finished: {reason} ({} tool call(s))",
            self.iterations
        );
        RunOutcome {
            final_text,
            audit_trail: self.audit,
            iterations_used: self.iterations,
            termination_reason: reason,
        }
    }
}

/// Canonical identity of a tool-call request: the name plus the arguments
/// re-serialized with sorted keys, so formatting and key order don't defeat
/// duplicate detection.
fn canonical_signature(name: &str, raw_arguments: &str) -> (String, String) {
    let canonical = match serde_json::from_str::<Value>(raw_arguments.trim()) {
        Ok(v) => v.to_string(),
        Err(_) => raw_arguments.trim().to_string(),
    };
    (name.to_string(), canonical)
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Drives agent runs. Borrows the client, registry, and minter so one set of
/// collaborators serves many concurrent runs.
///
/// # Example
///
/// ```ignore
/// let orchestrator = Orchestrator::new(&client, &registry, &minter, config)
///     .with_stop_signal(move || shutdown.load(Ordering::Relaxed));
/// let outcome = orchestrator.run(user_id, "what's due today?", &history).await?;
/// ```
pub struct Orchestrator<'a> {
    client: &'a dyn CompletionClient,
    registry: &'a ToolRegistry,
    minter: &'a CredentialMinter,
    config: AgentConfig,
    stop_signal: Option<Box<dyn Fn() -> bool + Send + Sync + 'a>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        client: &'a dyn CompletionClient,
        registry: &'a ToolRegistry,
        minter: &'a CredentialMinter,
        config: AgentConfig,
    ) -> Self {
        Self {
            client,
            registry,
            minter,
            config,
            stop_signal: None,
        }
    }

    /// Install a cancellation probe. It is checked at the top of each loop
    /// iteration and before each tool execution; when it returns `true` the
    /// run stops with [`TerminationReason::Cancelled`] and the audit trail
    /// collected so far. Already-executed calls are not rolled back.
    pub fn with_stop_signal(mut self, signal: impl Fn() -> bool + Send + Sync + 'a) -> Self {
        self.stop_signal = Some(Box::new(signal));
        self
    }

    fn cancelled(&self) -> bool {
        self.stop_signal.as_ref().is_some_and(|s| s())
    }

    /// Run one chat turn for `user_id`.
    ///
    /// Fatal failures (provider errors, suspension-point timeouts) return
    /// `Err` and are never retried here; retry policy belongs to the caller.
    /// Everything else, including every tool failure, is an `Ok` outcome.
    pub async fn run(
        &self,
        user_id: Uuid,
        user_message: &str,
        history: &[Message],
    ) -> Result<RunOutcome, AgentError> {
        let credential = self
            .minter
            .mint(user_id)
            .map_err(|e| AgentError::Credential(e.to_string()))?;

        let mut state = RunState::new(
            self.config.system_prompt.as_deref(),
            history,
            user_message,
        );
        let tool_defs = self.registry.definitions();

        info!(
            "Agent run: {} tool(s) available, max {} call(s)",
            tool_defs.len(),
            self.config.max_tool_calls
        );

        loop {
            if self.cancelled() {
                let text = state.last_text.clone();
                return Ok(state.finish(TerminationReason::Cancelled, text));
            }
            if state.iterations >= self.config.max_tool_calls {
                return Ok(state.finish(
                    TerminationReason::MaxIterationsExceeded,
                    BUDGET_EXHAUSTED_REPLY.to_string(),
                ));
            }

            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: state.messages.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                tools: Some(tool_defs.clone()),
                tool_choice: Some("auto".to_string()),
            };

            let completion = match tokio::time::timeout(
                self.config.llm_timeout,
                self.client.complete(&request),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(AgentError::Timeout {
                        stage: TimeoutStage::Completion,
                        timeout: self.config.llm_timeout,
                    });
                }
            };

            if let Some(text) = completion.content.as_deref()
                && !text.is_empty()
            {
                state.last_text = text.to_string();
            }

            if completion.tool_calls.is_empty() {
                let text = completion.content.unwrap_or_default();
                return Ok(state.finish(TerminationReason::Completed, text));
            }

            // Drop requests whose signature already executed, in this round
            // or any earlier one, before the assistant turn is appended — the
            // conversation never shows a request whose result was elided.
            let mut survivors: Vec<(ToolCall, (String, String))> = Vec::new();
            for call in completion.tool_calls {
                let signature =
                    canonical_signature(&call.function.name, &call.function.arguments);
                let duplicate = state.executed.contains(&signature)
                    || survivors.iter().any(|(_, s)| *s == signature);
                if duplicate {
                    warn!(
                        "Skipping duplicate tool call {}({})",
                        call.function.name, call.function.arguments
                    );
                    continue;
                }
                survivors.push((call, signature));
            }

            if survivors.is_empty() {
                debug!("Round contained only duplicate tool calls; stalling");
                let text = state.last_text.clone();
                return Ok(state.finish(TerminationReason::Stalled, text));
            }

            state.messages.push(Message::assistant_tool_calls(
                completion.content,
                survivors.iter().map(|(c, _)| c.clone()).collect(),
            ));

            for (call, signature) in survivors {
                if self.cancelled() {
                    let text = state.last_text.clone();
                    return Ok(state.finish(TerminationReason::Cancelled, text));
                }
                if state.iterations >= self.config.max_tool_calls {
                    return Ok(state.finish(
                        TerminationReason::MaxIterationsExceeded,
                        BUDGET_EXHAUSTED_REPLY.to_string(),
                    ));
                }

                let started_at = Utc::now();
                let start = std::time::Instant::now();
                let invocation = invoke(
                    self.registry,
                    &call.function.name,
                    &call.function.arguments,
                    &credential,
                    self.config.tool_timeout,
                )
                .await?;

                state.messages.push(Message::tool_result(
                    call.id.as_str(),
                    invocation.payload.to_string(),
                ));
                state.audit.push(ToolCallRecord {
                    tool_name: call.function.name.clone(),
                    arguments: invocation.arguments,
                    result: invocation.payload,
                    status: invocation.status,
                    started_at,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
                state.executed.insert(signature);
                state.iterations += 1;
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
