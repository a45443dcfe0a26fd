//! Tool-result normalization.
//!
//! Tool handlers and transport layers produce heterogeneous shapes: plain
//! JSON values, lists of them, or wrapped content blocks of the form
//! `{"type": "text", "text": "<json or prose>"}` as emitted by MCP-style
//! servers. Before a result re-enters the conversation it is normalized to
//! a single canonical value so the model always sees consistent shapes.
//!
//! Normalization is total: it never errors and never panics. Unparseable
//! wrapped text degrades to [`NormalizedResult::Text`] rather than being
//! dropped.

use serde_json::Value;

/// Canonical form of a tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResult {
    /// Structured data: objects, arrays, numbers, booleans, null.
    Json(Value),
    /// Free-form text that is not JSON.
    Text(String),
}

impl NormalizedResult {
    /// Collapse back into a single `serde_json::Value` for serialization
    /// into a tool-role message.
    pub fn into_value(self) -> Value {
        match self {
            NormalizedResult::Json(v) => v,
            NormalizedResult::Text(s) => Value::String(s),
        }
    }
}

/// Normalize a raw tool result. Idempotent: normalizing an already
/// normalized value yields the same result.
pub fn normalize(raw: &Value) -> NormalizedResult {
    match raw {
        Value::Array(items) => {
            let converted = items
                .iter()
                .map(|item| normalize(item).into_value())
                .collect();
            NormalizedResult::Json(Value::Array(converted))
        }
        Value::Object(map) => {
            // Wrapped content block: a string `text` field plus a `type`
            // marker. Unwrap and re-normalize so nesting reaches a fixed
            // point.
            if let (Some(text), true) = (
                map.get("text").and_then(Value::as_str),
                map.contains_key("type"),
            ) {
                return match serde_json::from_str::<Value>(text) {
                    Ok(parsed) => normalize(&parsed),
                    Err(_) => NormalizedResult::Text(text.to_string()),
                };
            }
            NormalizedResult::Json(raw.clone())
        }
        Value::String(s) => NormalizedResult::Text(s.clone()),
        _ => NormalizedResult::Json(raw.clone()),
    }
}
