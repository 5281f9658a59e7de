//! Language-model caller used by crew agents.
//!
//! Calls the model API directly over HTTP. Two wire formats are supported:
//! OpenAI-compatible chat completions (OpenRouter, OpenAI, most gateways)
//! and the Anthropic Messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmSettings;
use crate::error::RealtyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// One completion request: a system prompt plus the conversation so far.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<UsageInfo>,
}

/// Anything that can answer a chat request.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, RealtyError>;
}

/// HTTP model client configured from [`LlmSettings`].
pub struct LlmCaller {
    client: reqwest::Client,
    settings: LlmSettings,
}

impl LlmCaller {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(settings.request_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            settings,
        }
    }

    fn api_key(&self) -> Result<&str, RealtyError> {
        self.settings.api_key.as_deref().ok_or_else(|| {
            RealtyError::Config(
                "OPENROUTER_API_KEY (or REALTY_LLM_API_KEY) environment variable not set"
                    .to_string(),
            )
        })
    }

    /// POST {base_url}/chat/completions with a bearer token.
    async fn call_openai_compatible(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatResponse, RealtyError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        tracing::info!("[LlmCaller] Calling chat completions: {} (model: {})", url, request.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(&openai_body(request))
            .send()
            .await?;

        let json = read_json(response).await?;
        Ok(parse_openai_response(&json, &request.model))
    }

    /// POST {base_url}/v1/messages with `x-api-key` and `anthropic-version`.
    async fn call_anthropic_compatible(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatResponse, RealtyError> {
        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));
        tracing::info!("[LlmCaller] Calling messages API: {} (model: {})", url, request.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key()?)
            .header("anthropic-version", "2023-06-01")
            .json(&anthropic_body(request))
            .send()
            .await?;

        let json = read_json(response).await?;
        Ok(parse_anthropic_response(&json, &request.model))
    }
}

#[async_trait]
impl ChatModel for LlmCaller {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, RealtyError> {
        match self.settings.adapter.as_str() {
            "openai" | "openrouter" => self.call_openai_compatible(request).await,
            "anthropic" | "claude" => self.call_anthropic_compatible(request).await,
            other => Err(RealtyError::Config(format!(
                "Unknown LLM adapter type: '{}'",
                other
            ))),
        }
    }
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, RealtyError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(RealtyError::Llm(format!("API returned {}: {}", status, text)));
    }
    serde_json::from_str(&text)
        .map_err(|e| RealtyError::Llm(format!("Failed to parse response JSON: {}", e)))
}

fn temperature_value(temperature: f64) -> serde_json::Value {
    serde_json::Number::from_f64(temperature)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::json!(0))
}

fn openai_body(request: &ChatRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !request.system.is_empty() {
        messages.push(serde_json::json!({ "role": "system", "content": request.system }));
    }
    messages.extend(
        request
            .messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role, "content": m.content })),
    );

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
    });
    if let Some(temp) = request.temperature {
        body["temperature"] = temperature_value(temp);
    }
    body
}

fn anthropic_body(request: &ChatRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": request.model,
        "max_tokens": 8192,
        "messages": request.messages,
    });
    if !request.system.is_empty() {
        body["system"] = serde_json::Value::String(request.system.clone());
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = temperature_value(temp);
    }
    body
}

fn parse_openai_response(json: &serde_json::Value, requested_model: &str) -> ChatResponse {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let usage = json.get("usage").map(|u| UsageInfo {
        input_tokens: u
            .get("prompt_tokens")
            .or_else(|| u.get("input_tokens"))
            .and_then(|v| v.as_u64()),
        output_tokens: u
            .get("completion_tokens")
            .or_else(|| u.get("output_tokens"))
            .and_then(|v| v.as_u64()),
    });

    ChatResponse {
        content,
        model: response_model(json, requested_model),
        usage,
    }
}

fn parse_anthropic_response(json: &serde_json::Value, requested_model: &str) -> ChatResponse {
    let content = json
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    let usage = json.get("usage").map(|u| UsageInfo {
        input_tokens: u.get("input_tokens").and_then(|v| v.as_u64()),
        output_tokens: u.get("output_tokens").and_then(|v| v.as_u64()),
    });

    ChatResponse {
        content,
        model: response_model(json, requested_model),
        usage,
    }
}

fn response_model(json: &serde_json::Value, requested_model: &str) -> String {
    json.get("model")
        .and_then(|m| m.as_str())
        .unwrap_or(requested_model)
        .to_string()
}
