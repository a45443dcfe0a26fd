//! Tool invocation pipeline.
//!
//! [`invoke`] is the single path from a model-issued tool-call request to a
//! result payload: resolve the handler, parse and coerce the raw argument
//! string, validate against the tool's declared schema, inject the per-run
//! credential, execute under a deadline, and normalize the output.
//!
//! Recoverable failures ([`ToolError`]) become error-status invocations whose
//! payloads are fed back to the model. Only an expired deadline escapes as a
//! fatal [`AgentError::Timeout`].

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::auth::Credential;
use crate::error::{AgentError, TimeoutStage, ToolError};
use crate::normalize::normalize;
use crate::tools::core::{Tool, ToolRegistry};

/// Whether an invocation produced a result or an error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Success,
    Error,
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationStatus::Success => write!(f, "success"),
            InvocationStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one tool invocation. The payload is what gets appended to the
/// conversation as the tool's result — a normalized value on success, a
/// `{"error": ..., "kind": ...}` object otherwise.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub status: InvocationStatus,
    pub payload: Value,
    /// The argument object as executed (parsed and coerced). For requests
    /// that never parsed, the raw string is preserved for the audit trail.
    pub arguments: Value,
}

impl Invocation {
    fn error(err: &ToolError, arguments: Value) -> Self {
        Self {
            status: InvocationStatus::Error,
            payload: err.to_payload(),
            arguments,
        }
    }
}

/// Execute one tool-call request end to end.
///
/// Never panics; the only fatal outcome is [`AgentError::Timeout`] when the
/// handler outlives `timeout`.
pub async fn invoke(
    registry: &ToolRegistry,
    name: &str,
    raw_arguments: &str,
    credential: &Credential,
    timeout: Duration,
) -> Result<Invocation, AgentError> {
    // Models hallucinate tool names; answer with an error payload, not a
    // crash.
    let Some(tool) = registry.get(name) else {
        let err = ToolError::ToolNotFound(name.to_string());
        info!("[tool] {name}: unknown tool");
        return Ok(Invocation::error(
            &err,
            Value::String(raw_arguments.to_string()),
        ));
    };

    let mut arguments = match parse_arguments(raw_arguments) {
        Ok(v) => v,
        Err(err) => {
            return Ok(Invocation::error(
                &err,
                Value::String(raw_arguments.to_string()),
            ));
        }
    };

    if let Err(err) = coerce_id_fields(&mut arguments) {
        return Ok(Invocation::error(&err, arguments));
    }

    if let Err(err) = validate_arguments(tool, &arguments) {
        return Ok(Invocation::error(&err, arguments));
    }

    log_tool_call(name, &arguments);
    let start = std::time::Instant::now();

    let outcome = tokio::time::timeout(timeout, tool.execute(credential, &arguments)).await;

    let result = match outcome {
        Ok(r) => r,
        Err(_) => {
            info!(
                "Tool {name} timed out after {:.1}s (limit: {:.0}s)",
                start.elapsed().as_secs_f64(),
                timeout.as_secs_f64(),
            );
            return Err(AgentError::Timeout {
                stage: TimeoutStage::Tool(name.to_string()),
                timeout,
            });
        }
    };

    let elapsed = start.elapsed();
    match result {
        Ok(raw) => {
            let payload = normalize(&raw).into_value();
            debug!(
                "Tool {name} completed in {:.0}ms",
                elapsed.as_secs_f64() * 1000.0,
            );
            trace!("Tool {name} result: {payload}");
            Ok(Invocation {
                status: InvocationStatus::Success,
                payload,
                arguments,
            })
        }
        Err(err) => {
            info!(
                "Tool {name} failed after {:.0}ms: {err}",
                elapsed.as_secs_f64() * 1000.0,
            );
            Ok(Invocation::error(&err, arguments))
        }
    }
}

/// Parse the raw argument string into an object. Tolerates an empty string,
/// `null`, and double-encoded JSON (a string whose content is itself JSON) —
/// all shapes observed from real models.
fn parse_arguments(raw: &str) -> Result<Value, ToolError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let mut value: Value = serde_json::from_str(trimmed)
        .map_err(|e| ToolError::MalformedArguments(format!("invalid JSON: {e}")))?;

    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner)
            .map_err(|e| ToolError::MalformedArguments(format!("invalid JSON: {e}")))?;
    }

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        other => Err(ToolError::MalformedArguments(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Coerce identifier fields that arrive as strings (`"task_id": "42"`) into
/// integers. A string that does not parse is a malformed request.
fn coerce_id_fields(arguments: &mut Value) -> Result<(), ToolError> {
    let Value::Object(map) = arguments else {
        return Ok(());
    };
    for (key, value) in map.iter_mut() {
        if !(key == "id" || key.ends_with("_id")) {
            continue;
        }
        if let Value::String(s) = value {
            let parsed: i64 = s.trim().parse().map_err(|_| {
                ToolError::MalformedArguments(format!("field '{key}' must be an integer, got {s:?}"))
            })?;
            *value = Value::Number(parsed.into());
        }
    }
    Ok(())
}

/// Validate the argument object against the tool's declared JSON Schema.
fn validate_arguments(tool: &dyn Tool, arguments: &Value) -> Result<(), ToolError> {
    let schema = tool.definition().function.parameters;

    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(_) => return Ok(()), // If schema itself is invalid, skip validation.
    };

    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ToolError::MalformedArguments(errors.join("; ")))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
fn log_tool_call(name: &str, arguments: &Value) {
    let rendered = arguments.to_string();
    let preview: String = rendered.chars().take(120).collect();
    info!(
        "[tool] {}({preview}{})",
        name,
        if rendered.len() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {rendered}");
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolDef;
    use crate::auth::CredentialMinter;
    use crate::tools::core::ToolFuture;
    use serde_json::json;
    use uuid::Uuid;

    struct EchoTool;

    impl Tool for EchoTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                "echo",
                "Echo the input",
                json!({
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" },
                        "task_id": { "type": "integer" }
                    },
                    "required": ["text"]
                }),
            )
        }

        fn execute(&self, _credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
            let args = arguments.clone();
            Box::pin(async move { Ok(args) })
        }
    }

    struct WrappedTool;

    impl Tool for WrappedTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                "wrapped",
                "Returns a wrapped content block",
                json!({"type": "object", "properties": {}}),
            )
        }

        fn execute(&self, _credential: &Credential, _arguments: &Value) -> ToolFuture<'_> {
            Box::pin(async {
                Ok(json!({"type": "text", "text": "{\"id\": 4, \"title\": \"x\"}"}))
            })
        }
    }

    struct SlowTool;

    impl Tool for SlowTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                "slow",
                "Sleeps",
                json!({"type": "object", "properties": {}}),
            )
        }

        fn execute(&self, _credential: &Credential, _arguments: &Value) -> ToolFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!(null))
            })
        }
    }

    struct DenyTool;

    impl Tool for DenyTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                "deny",
                "Always denies",
                json!({"type": "object", "properties": {}}),
            )
        }

        fn execute(&self, _credential: &Credential, _arguments: &Value) -> ToolFuture<'_> {
            Box::pin(async { Err(ToolError::NotFound("Task 99 not found".into())) })
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with(EchoTool)
            .with(WrappedTool)
            .with(SlowTool)
            .with(DenyTool)
    }

    fn credential() -> Credential {
        CredentialMinter::new("test-secret")
            .mint(Uuid::new_v4())
            .unwrap()
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn unknown_tool_yields_error_payload() {
        let inv = invoke(&registry(), "missing", "{}", &credential(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(inv.status, InvocationStatus::Error);
        assert_eq!(inv.payload["kind"], "tool_not_found");
    }

    #[tokio::test]
    async fn malformed_json_yields_error_payload() {
        let inv = invoke(&registry(), "echo", "{not json", &credential(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(inv.status, InvocationStatus::Error);
        assert_eq!(inv.payload["kind"], "malformed_arguments");
    }

    #[tokio::test]
    async fn string_id_fields_are_coerced() {
        let inv = invoke(
            &registry(),
            "echo",
            r#"{"text": "hi", "task_id": "42"}"#,
            &credential(),
            TIMEOUT,
        )
        .await
        .unwrap();
        assert_eq!(inv.status, InvocationStatus::Success);
        assert_eq!(inv.payload["task_id"], 42);
        assert_eq!(inv.arguments["task_id"], 42);
    }

    #[tokio::test]
    async fn non_numeric_id_is_malformed() {
        let inv = invoke(
            &registry(),
            "echo",
            r#"{"text": "hi", "task_id": "abc"}"#,
            &credential(),
            TIMEOUT,
        )
        .await
        .unwrap();
        assert_eq!(inv.status, InvocationStatus::Error);
        assert_eq!(inv.payload["kind"], "malformed_arguments");
        assert!(inv.payload["error"].as_str().unwrap().contains("task_id"));
    }

    #[tokio::test]
    async fn schema_violation_is_malformed() {
        // Missing the required "text" field.
        let inv = invoke(&registry(), "echo", "{}", &credential(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(inv.status, InvocationStatus::Error);
        assert_eq!(inv.payload["kind"], "malformed_arguments");
    }

    #[tokio::test]
    async fn double_encoded_arguments_are_unwrapped() {
        let raw = serde_json::to_string(&json!({"text": "hi"}).to_string()).unwrap();
        let inv = invoke(&registry(), "echo", &raw, &credential(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(inv.status, InvocationStatus::Success);
        assert_eq!(inv.payload["text"], "hi");
    }

    #[tokio::test]
    async fn wrapped_results_are_normalized() {
        let inv = invoke(&registry(), "wrapped", "{}", &credential(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(inv.status, InvocationStatus::Success);
        assert_eq!(inv.payload, json!({"id": 4, "title": "x"}));
    }

    #[tokio::test]
    async fn domain_error_is_not_fatal() {
        let inv = invoke(&registry(), "deny", "{}", &credential(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(inv.status, InvocationStatus::Error);
        assert_eq!(inv.payload["kind"], "not_found");
    }

    #[tokio::test]
    async fn deadline_overrun_is_fatal() {
        let err = invoke(&registry(), "slow", "{}", &credential(), TIMEOUT)
            .await
            .unwrap_err();
        match err {
            AgentError::Timeout { stage, .. } => {
                assert_eq!(stage, TimeoutStage::Tool("slow".into()));
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn empty_arguments_become_empty_object() {
        // "deny" has no required fields, so an empty raw string is fine.
        let inv = invoke(&registry(), "deny", "", &credential(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(inv.arguments, json!({}));
    }
}
