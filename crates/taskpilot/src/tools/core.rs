//! Tool abstraction for the function-calling agent.
//!
//! The [`Tool`] trait defines the interface every tool must implement: a
//! static API definition (name, description, JSON Schema) and an async
//! `execute` method that receives the per-run credential and the parsed,
//! validated argument object. Tools are collected into a [`ToolRegistry`],
//! built once at startup and passed by reference into the orchestrator —
//! there is no ambient global registry.

use std::collections::HashMap;
use std::fmt;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::ToolDef;
use crate::auth::Credential;
use crate::error::ToolError;

/// Boxed future returned by [`Tool::execute`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type ToolFuture<'a> = BoxFuture<'a, Result<Value, ToolError>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool the model can invoke via function-calling.
///
/// Implementors provide:
/// - A static definition ([`Tool::definition`]) describing the tool's name,
///   description, and JSON Schema parameters. The credential is *not* part
///   of the schema — the model never sees it.
/// - An async [`Tool::execute`] receiving the credential and the argument
///   object (already parsed, coerced, and schema-validated by the invoker).
///
/// Domain failures are returned as [`ToolError`], which the orchestrator
/// feeds back to the model as an error payload; they never abort a run.
///
/// # Example
///
/// ```ignore
/// struct DeleteTask { store: Arc<dyn TaskStore>, verifier: CredentialVerifier }
///
/// impl Tool for DeleteTask {
///     fn definition(&self) -> ToolDef { /* ... */ }
///
///     fn execute(&self, credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
///         let credential = credential.clone();
///         let arguments = arguments.clone();
///         Box::pin(async move {
///             let user_id = self.verifier.verify(&credential)?;
///             // parse args, delete row, return JSON
///             todo!()
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The tool definition sent to the model API.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the per-run credential and the validated
    /// argument object.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible (object-safe).
    fn execute(&self, credential: &Credential, arguments: &Value) -> ToolFuture<'_>;

    /// The tool's name (convenience — delegates to definition).
    fn name(&self) -> String {
        self.definition().function.name.clone()
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// An explicit name-to-handler map, dispatched by the invoker.
///
/// Built once at startup; the orchestrator borrows it for the duration of
/// a run. Registration replaces any existing tool with the same name.
///
/// # Example
///
/// ```ignore
/// let registry = ToolRegistry::new()
///     .with(ListTasks::new(store.clone(), verifier.clone()))
///     .with(CreateTask::new(store.clone(), verifier.clone()))
///     .with_if(enable_summaries, TaskSummary::new(store, verifier));
///
/// let defs = registry.definitions();
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Conditionally register a tool (builder pattern).
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Return all tool definitions for the model API.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialMinter, CredentialVerifier};
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
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            )
        }

        fn execute(&self, _credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
            let text = arguments
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Box::pin(async move { Ok(json!({"echo": text})) })
        }
    }

    struct FailTool;

    impl Tool for FailTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                "fail",
                "Always fails",
                json!({"type": "object", "properties": {}}),
            )
        }

        fn execute(&self, _credential: &Credential, _arguments: &Value) -> ToolFuture<'_> {
            Box::pin(async { Err(ToolError::Validation("intentional failure".into())) })
        }
    }

    fn credential() -> Credential {
        CredentialMinter::new("test-secret")
            .mint(Uuid::new_v4())
            .unwrap()
    }

    #[test]
    fn tool_name_from_definition() {
        assert_eq!(EchoTool.name(), "echo");
    }

    #[test]
    fn registry_register_and_definitions() {
        let registry = ToolRegistry::new().with(EchoTool).with(FailTool);
        assert_eq!(registry.len(), 2);

        let names: Vec<String> = registry
            .definitions()
            .iter()
            .map(|d| d.function.name.clone())
            .collect();
        assert!(names.contains(&"echo".to_string()));
        assert!(names.contains(&"fail".to_string()));
    }

    #[test]
    fn registry_lookup() {
        let registry = ToolRegistry::new().with(EchoTool);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn with_if_false_skips_tool() {
        let registry = ToolRegistry::new().with_if(false, EchoTool);
        assert!(registry.is_empty());
    }

    #[test]
    fn registration_replaces_same_name() {
        struct EchoTwo;
        impl Tool for EchoTwo {
            fn definition(&self) -> ToolDef {
                ToolDef::new("echo", "Replacement", json!({"type": "object"}))
            }
            fn execute(&self, _credential: &Credential, _arguments: &Value) -> ToolFuture<'_> {
                Box::pin(async { Ok(json!("two")) })
            }
        }

        let registry = ToolRegistry::new().with(EchoTool).with(EchoTwo);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("echo").map(|t| t.definition().function.description),
            Some("Replacement".to_string())
        );
    }

    #[tokio::test]
    async fn execute_success_and_failure() {
        let cred = credential();
        let echo = EchoTool;
        let result = echo
            .execute(&cred, &json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"echo": "hi"}));

        let fail = FailTool;
        let err = fail.execute(&cred, &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[test]
    fn verifier_round_trip_through_tool() {
        // Tools verify the credential themselves; sanity-check the pieces
        // compose.
        let verifier = CredentialVerifier::new("test-secret");
        let user = Uuid::new_v4();
        let cred = CredentialMinter::new("test-secret").mint(user).unwrap();
        assert_eq!(verifier.verify(&cred).unwrap(), user);
    }
}
