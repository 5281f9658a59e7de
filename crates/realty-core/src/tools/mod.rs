//! Agent tools: thin wrappers around the external vendor APIs.
//!
//! Provides:
//!   1. make_inspection_call    - Retell outbound call, inspector script
//!   2. make_negotiation_call   - Retell outbound call, negotiator script
//!   3. get_call_result         - Poll a call until it ends, return transcript
//!   4. check_call_status       - One-shot status check
//!   5. web_extractor           - TinyFish structured web extraction
//!
//! Every tool returns a [`ToolResult`] and never an error: crew agents read
//! tool output as plain text, so failures must be ordinary payloads.

pub mod extraction;
pub mod voice;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;

pub use extraction::WebExtractor;
pub use voice::{RetellClient, VoiceApi, VoiceCallTools};

/// Result of a tool operation: `success`, an optional `error`, and the
/// operation-specific fields flattened next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ToolResult {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            fields: serde_json::Map::new(),
        }
    }

    /// Attach a field to the payload.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        self.fields.insert(
            key.to_string(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Compact JSON text, as handed back to an agent.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"success\":{},\"error\":\"unserializable tool result\"}}", self.success)
        })
    }
}

/// A capability an agent can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON object describing the accepted arguments.
    fn parameters(&self) -> serde_json::Value;

    async fn invoke(&self, args: serde_json::Value) -> ToolResult;
}

/// Tools indexed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the voice-call tools and the web extractor, built from
    /// the given settings.
    pub fn standard(settings: &Settings) -> Self {
        let mut registry = Self::new();
        let voice = Arc::new(VoiceCallTools::from_settings(&settings.voice));
        for tool in voice::call_tools(voice) {
            registry.register(tool);
        }
        registry.register(Arc::new(WebExtractor::from_settings(&settings.extraction)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        tracing::debug!("[ToolRegistry] Registered tool: {}", tool.name());
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted tool names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Prompt section listing the given tools with their arguments.
    pub fn describe(&self, names: &[String]) -> String {
        let mut out = String::new();
        for name in names {
            if let Some(tool) = self.tools.get(name) {
                out.push_str(&format!(
                    "- {}: {}\n  Arguments: {}\n",
                    tool.name(),
                    tool.description(),
                    tool.parameters()
                ));
            }
        }
        out
    }
}

// ─── Argument helpers ─────────────────────────────────────────────────────

pub(crate) fn required_str(args: &serde_json::Value, key: &str) -> Result<String, ToolResult> {
    match args.get(key) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ToolResult::error(format!("Missing required argument: {}", key))),
    }
}

pub(crate) fn optional_str(args: &serde_json::Value, key: &str) -> Option<String> {
    match args.get(key) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn optional_bool(args: &serde_json::Value, key: &str) -> Option<bool> {
    match args.get(key) {
        Some(serde_json::Value::Bool(b)) => Some(*b),
        Some(serde_json::Value::String(s)) => match s.to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn optional_u64(args: &serde_json::Value, key: &str) -> Option<u64> {
    match args.get(key) {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_flattens_fields() {
        let result = ToolResult::success()
            .with("call_id", "call_123")
            .with("in_progress", true);
        let json = result.to_json();
        assert_eq!(json["success"], true);
        assert_eq!(json["call_id"], "call_123");
        assert_eq!(json["in_progress"], true);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_tool_result_error_round_trip() {
        let text = ToolResult::error("boom").with("url", "https://example.com").to_json_string();
        let parsed: ToolResult = serde_json::from_str(&text).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("boom"));
        assert_eq!(parsed.get_str("url"), Some("https://example.com"));
    }

    #[test]
    fn test_standard_registry_has_all_tools() {
        let registry = ToolRegistry::standard(&Settings::default());
        assert_eq!(
            registry.names(),
            vec![
                "check_call_status",
                "get_call_result",
                "make_inspection_call",
                "make_negotiation_call",
                "web_extractor",
            ]
        );
        let described = registry.describe(&["web_extractor".to_string()]);
        assert!(described.contains("web_extractor"));
        assert!(described.contains("goal"));
    }

    #[test]
    fn test_argument_helpers() {
        let args = serde_json::json!({
            "to_number": "+15125550123",
            "max_wait_seconds": "30",
            "use_stealth": "yes",
            "blank": "  "
        });
        assert_eq!(required_str(&args, "to_number").unwrap(), "+15125550123");
        assert!(required_str(&args, "blank").is_err());
        assert_eq!(optional_u64(&args, "max_wait_seconds"), Some(30));
        assert_eq!(optional_bool(&args, "use_stealth"), Some(true));
        assert!(optional_str(&args, "missing").is_none());
    }
}
