//! Error taxonomy.
//!
//! Two disjoint families. [`ToolError`] covers everything that can go wrong
//! while executing a single tool call; these are *recoverable* and are fed
//! back to the model as tool-result payloads so it can adjust. [`AgentError`]
//! covers failures of the run itself (completion-provider errors, expired
//! deadlines), which abort the run and propagate to the caller unmodified.
//! The two are never conflated: a tool failure never kills a run, and a
//! provider failure is never shown to the model.

use std::time::Duration;

use thiserror::Error;

/// Recoverable failure of a single tool invocation.
///
/// Rendered into a JSON payload and appended to the conversation as the
/// tool's result; the run continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// Credential missing, malformed, expired, or signed with the wrong key.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Credential valid, but the caller may not perform this operation.
    #[error("access denied: {0}")]
    Authorization(String),

    /// Target row absent, or owned by another user. The two cases are
    /// deliberately indistinguishable.
    #[error("not found: {0}")]
    NotFound(String),

    /// Arguments were well-formed but violate a domain rule.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Arguments could not be parsed, coerced, or schema-validated.
    #[error("malformed arguments: {0}")]
    MalformedArguments(String),

    /// The model requested a tool name with no registered handler.
    #[error("unknown tool '{0}'")]
    ToolNotFound(String),
}

impl ToolError {
    /// Stable machine-readable kind, included in error payloads so the
    /// model (and tests) can discriminate without parsing prose.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Authentication(_) => "authentication_error",
            ToolError::Authorization(_) => "authorization_error",
            ToolError::NotFound(_) => "not_found",
            ToolError::Validation(_) => "validation_error",
            ToolError::MalformedArguments(_) => "malformed_arguments",
            ToolError::ToolNotFound(_) => "tool_not_found",
        }
    }

    /// The JSON payload appended to the conversation in place of a result.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        })
    }
}

/// Which suspension point exceeded its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutStage {
    /// The completion call to the model provider.
    Completion,
    /// A tool execution, by name.
    Tool(String),
}

impl std::fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutStage::Completion => write!(f, "completion call"),
            TimeoutStage::Tool(name) => write!(f, "tool '{name}'"),
        }
    }
}

/// Fatal failure of an agent run. Aborts the loop; never shown to the model.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The completion provider failed (network, HTTP status, unusable
    /// response body). Never retried here; retry policy belongs to the
    /// caller.
    #[error("completion provider error: {0}")]
    Llm(String),

    /// A suspension point exceeded its configured deadline.
    #[error("{stage} timed out after {}s", timeout.as_secs())]
    Timeout {
        stage: TimeoutStage,
        timeout: Duration,
    },

    /// Minting the per-run credential failed. Practically unreachable with
    /// an HMAC secret, but the signing library is fallible.
    #[error("credential minting failed: {0}")]
    Credential(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_payload_has_kind_and_message() {
        let err = ToolError::NotFound("Task 7 not found".into());
        let payload = err.to_payload();
        assert_eq!(payload["kind"], "not_found");
        assert_eq!(payload["error"], "not found: Task 7 not found");
    }

    #[test]
    fn kinds_are_distinct() {
        let errors = [
            ToolError::Authentication("x".into()),
            ToolError::Authorization("x".into()),
            ToolError::NotFound("x".into()),
            ToolError::Validation("x".into()),
            ToolError::MalformedArguments("x".into()),
            ToolError::ToolNotFound("x".into()),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn timeout_display_names_the_stage() {
        let err = AgentError::Timeout {
            stage: TimeoutStage::Tool("create_task".into()),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "tool 'create_task' timed out after 30s");

        let err = AgentError::Timeout {
            stage: TimeoutStage::Completion,
            timeout: Duration::from_secs(120),
        };
        assert_eq!(err.to_string(), "completion call timed out after 120s");
    }
}
