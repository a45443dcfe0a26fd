//! Agent run configuration.

use std::time::Duration;

use crate::DEFAULT_MODEL;

/// Ceiling on executed tool calls per run (counted per call, not per round).
pub const DEFAULT_MAX_TOOL_CALLS: u32 = 10;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Deadline for one completion call.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);
/// Deadline for one tool execution.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a friendly task-management assistant. You help the user create, \
organize, and prioritize their tasks using the available tools.

Guidelines:
- Task ids are integers. When the user refers to a task by name, call \
list_tasks first to find its id before updating or deleting.
- If the user does not state a priority, omit it and let the tool infer \
one from the wording.
- Due dates accept natural phrases ('tomorrow', 'next week', 'in 3 days') \
as well as ISO dates.
- After changing anything, tell the user exactly what changed.
- Keep replies short. Do not invent tasks or ids.";

/// Configuration for an [`Orchestrator`](crate::agent::orchestrator::Orchestrator).
///
/// # Example
///
/// ```
/// use taskpilot::agent::config::AgentConfig;
/// use std::time::Duration;
///
/// let config = AgentConfig::new("gemini-2.5-pro")
///     .with_max_tool_calls(5)
///     .with_tool_timeout(Duration::from_secs(10));
/// assert_eq!(config.max_tool_calls, 5);
/// ```
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub max_tool_calls: u32,
    pub max_tokens: u32,
    pub temperature: f32,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
    /// Prepended as the system turn. `None` skips the system turn entirely.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    pub fn with_max_tool_calls(mut self, max: u32) -> Self {
        self.max_tool_calls = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Run without a system turn.
    pub fn without_system_prompt(mut self) -> Self {
        self.system_prompt = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tool_calls, DEFAULT_MAX_TOOL_CALLS);
        assert!(config.system_prompt.is_some());
    }

    #[test]
    fn builders() {
        let config = AgentConfig::new("m")
            .with_max_tool_calls(3)
            .with_max_tokens(500)
            .with_temperature(0.1)
            .with_llm_timeout(Duration::from_secs(5))
            .with_tool_timeout(Duration::from_secs(2))
            .with_system_prompt("custom");
        assert_eq!(config.max_tool_calls, 3);
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.system_prompt.as_deref(), Some("custom"));

        let config = config.without_system_prompt();
        assert!(config.system_prompt.is_none());
    }
}
