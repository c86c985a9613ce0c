//! Tool definitions and call results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition advertised by a downstream server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool name as the downstream server reports it.
    pub name: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for input parameters.
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolDef {
    /// Create a new tool definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Namespace this tool under its owning server's name.
    #[must_use]
    pub fn namespaced(&self, server_name: &str) -> String {
        format!("{server_name}_{}", self.name)
    }
}

/// One content item in a tool result.
///
/// Downstream servers return a content array with typed items; anything we
/// produce ourselves is a plain text item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContent {
    /// Content type tag ("text", "image", ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Text payload for text items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ToolContent {
    /// Create a text content item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

/// Uniform result shape for every tool call that crosses the bridge.
///
/// Success and failure both come back as a content list; `is_error` is the
/// only signal callers need to branch on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Content items returned by the tool (or a single error text item).
    pub content: Vec<ToolContent>,

    /// Whether the call failed.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Create a success result.
    #[must_use]
    pub const fn success(content: Vec<ToolContent>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Create a success result holding a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::success(vec![ToolContent::text(text)])
    }

    /// Create an error result with a single text item.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(message)],
            is_error: true,
        }
    }

    /// Parse a raw downstream response body (`content` array plus optional
    /// `isError` flag) into the uniform shape. Unknown content items are
    /// preserved as their JSON text.
    #[must_use]
    pub fn from_response(value: &Value) -> Self {
        let is_error = value
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let content = value
            .get("content")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        serde_json::from_value::<ToolContent>(item.clone())
                            .unwrap_or_else(|_| ToolContent::text(item.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { content, is_error }
    }

    /// Concatenated text of all text content items.
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespaced_tool_name() {
        let tool = ToolDef::new("forecast");
        assert_eq!(tool.namespaced("weather"), "weather_forecast");
    }

    #[test]
    fn test_tool_def_builders() {
        let tool = ToolDef::new("forecast")
            .with_description("Five-day forecast")
            .with_input_schema(json!({"type": "object"}));

        assert_eq!(tool.name, "forecast");
        assert_eq!(tool.description.as_deref(), Some("Five-day forecast"));
        assert!(tool.input_schema.is_some());
    }

    #[test]
    fn test_error_result() {
        let result = ToolCallResult::error("failed to invoke forecast: timeout");
        assert!(result.is_error);
        assert_eq!(
            result.joined_text(),
            "failed to invoke forecast: timeout"
        );
    }

    #[test]
    fn test_from_response_success() {
        let raw = json!({
            "content": [{"type": "text", "text": "72F and sunny"}]
        });
        let result = ToolCallResult::from_response(&raw);
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "72F and sunny");
    }

    #[test]
    fn test_from_response_error_flag() {
        let raw = json!({
            "content": [{"type": "text", "text": "city not found"}],
            "isError": true
        });
        let result = ToolCallResult::from_response(&raw);
        assert!(result.is_error);
    }

    #[test]
    fn test_from_response_preserves_unknown_items() {
        let raw = json!({
            "content": [{"oddity": 42}]
        });
        let result = ToolCallResult::from_response(&raw);
        assert_eq!(result.content.len(), 1);
        assert!(result.content[0].text.as_deref().unwrap().contains("42"));
    }

    #[test]
    fn test_serialization_uses_wire_names() {
        let result = ToolCallResult::error("nope");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"isError\":true"));
        assert!(json.contains("\"type\":\"text\""));
    }
}
