//! Agent runtime: the tool-use loop behind every crew task.
//!
//! The agent answers in a plain-text protocol:
//!
//! ```text
//! Thought: I should check the listing page
//! Action: web_extractor
//! Action Input: {"url": "https://...", "goal": "..."}
//! ```
//!
//! The tool result comes back as `Observation: <json>` and the loop goes on
//! until the agent replies with `Final Answer: ...`.

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::schema::AgentDef;
use super::template::strip_code_fences;
use crate::error::RealtyError;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::tools::ToolRegistry;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// One parsed agent reply.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    Action {
        tool: String,
        input: Result<serde_json::Value, String>,
    },
    Final(String),
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*Action:\s*(.+?)\s*$").expect("static regex"))
}

fn action_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)Action Input:\s*(.*)").expect("static regex"))
}

/// Parse a reply. An action that appears before any `Final Answer:` wins;
/// a reply with neither marker is taken as the final answer.
pub fn parse_reply(reply: &str) -> AgentStep {
    let final_pos = reply.find("Final Answer:");
    let action = action_re().captures(reply);

    if let Some(caps) = action {
        let action_pos = caps.get(0).map(|m| m.start()).unwrap_or(0);
        if final_pos.map_or(true, |f| action_pos < f) {
            let tool = caps[1].trim_matches(|c| c == '`' || c == '"').to_string();
            let raw_input = action_input_re()
                .captures(reply)
                .map(|c| c[1].to_string())
                .unwrap_or_default();
            // Drop anything the model invented after its input
            let raw_input = raw_input.split("Observation:").next().unwrap_or("");
            let body = strip_code_fences(raw_input);
            let input = if body.is_empty() {
                Ok(serde_json::json!({}))
            } else {
                serde_json::from_str::<serde_json::Value>(body)
                    .map_err(|e| format!("Action Input is not valid JSON: {}", e))
                    .and_then(|v| {
                        if v.is_object() {
                            Ok(v)
                        } else {
                            Err("Action Input must be a JSON object".to_string())
                        }
                    })
            };
            return AgentStep::Action { tool, input };
        }
    }

    match final_pos {
        Some(pos) => AgentStep::Final(reply[pos + "Final Answer:".len()..].trim().to_string()),
        None => AgentStep::Final(reply.trim().to_string()),
    }
}

/// Sliding one-minute window of model calls.
struct RateLimiter {
    max_rpm: Option<u32>,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    fn new(max_rpm: Option<u32>) -> Self {
        Self {
            max_rpm: max_rpm.filter(|n| *n > 0),
            calls: Mutex::new(VecDeque::new()),
        }
    }

    async fn acquire(&self, agent: &str) {
        let Some(max) = self.max_rpm else { return };
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                while calls.front().is_some_and(|t| now.duration_since(*t) >= RATE_WINDOW) {
                    calls.pop_front();
                }
                if (calls.len() as u32) < max {
                    calls.push_back(now);
                    return;
                }
                match calls.front() {
                    Some(oldest) => RATE_WINDOW.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };
            tracing::info!("[Agent] {} hit max_rpm, waiting {:?}", agent, wait);
            tokio::time::sleep(wait).await;
        }
    }
}

/// A crew agent bound to a model and its tools.
pub struct Agent {
    id: String,
    def: AgentDef,
    model_name: String,
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    limiter: RateLimiter,
    retry_backoff: Duration,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        def: AgentDef,
        model_name: impl Into<String>,
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        retry_backoff: Duration,
    ) -> Self {
        let limiter = RateLimiter::new(def.max_rpm);
        Self {
            id: id.into(),
            def,
            model_name: model_name.into(),
            model,
            tools,
            limiter,
            retry_backoff,
        }
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}\n",
            self.def.role,
            self.def.backstory.trim(),
            self.def.goal.trim()
        );

        if self.def.tools.is_empty() {
            prompt.push_str(
                "\nWhen you have the answer, reply in this format:\n\n\
                 Thought: I now know the final answer\n\
                 Final Answer: <the complete answer, meeting the expected criteria>\n",
            );
        } else {
            prompt.push_str(
                "\nYou ONLY have access to the following tools, and should NEVER make up tools \
                 that are not listed here:\n\n",
            );
            prompt.push_str(&self.tools.describe(&self.def.tools));
            prompt.push_str(
                "\nTo use a tool, reply with exactly:\n\n\
                 Thought: <what you are about to do>\n\
                 Action: <one of the tool names above>\n\
                 Action Input: <JSON object with the tool arguments>\n\n\
                 You will then receive the tool result as \"Observation: ...\". \
                 Once you know the answer, reply with:\n\n\
                 Thought: I now know the final answer\n\
                 Final Answer: <the complete answer, meeting the expected criteria>\n",
            );
        }
        prompt
    }

    /// One model call with rate limiting and retries.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, RealtyError> {
        let request = ChatRequest {
            model: self.model_name.clone(),
            system: self.system_prompt(),
            messages: messages.to_vec(),
            temperature: self.def.temperature,
        };

        let mut attempt = 0;
        loop {
            self.limiter.acquire(&self.id).await;
            match self.model.complete(&request).await {
                Ok(response) => return Ok(response.content),
                Err(e @ RealtyError::Config(_)) => return Err(e),
                Err(e) if attempt < self.def.max_retry_limit => {
                    attempt += 1;
                    let delay = self.retry_backoff * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        "[Agent] {} model call failed (attempt {}/{}): {}. Retrying in {:?}",
                        self.id,
                        attempt,
                        self.def.max_retry_limit + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(RealtyError::Llm(format!(
                        "agent '{}' failed after {} attempts: {}",
                        self.id,
                        attempt + 1,
                        e
                    )))
                }
            }
        }
    }

    /// Draft a plan, refining it until the model declares it READY.
    async fn plan(&self, task_prompt: &str) -> Result<String, RealtyError> {
        let mut messages = vec![ChatMessage::user(format!(
            "Before starting, think through how you will complete this task. \
             Write a short step-by-step plan, including which tools you will use.\n\n\
             {}\n\n\
             End your plan with READY if it is complete, or NOT READY if it still needs work.",
            task_prompt
        ))];

        let mut plan = self.chat(&messages).await?;
        let mut attempts = 1;
        while !plan_is_ready(&plan) && attempts < self.def.max_reasoning_attempts {
            messages.push(ChatMessage::assistant(plan.clone()));
            messages.push(ChatMessage::user(
                "Refine the plan: fill in the gaps you found. End with READY when it is complete.",
            ));
            plan = self.chat(&messages).await?;
            attempts += 1;
        }

        tracing::debug!("[Agent] {} planned in {} attempt(s)", self.id, attempts);
        Ok(strip_ready_marker(&plan))
    }

    async fn use_tool(&self, tool: &str, input: Result<serde_json::Value, String>) -> String {
        if !self.def.tools.iter().any(|t| t == tool) {
            return format!(
                "Error: tool '{}' is not available. Available tools: {}",
                tool,
                self.def.tools.join(", ")
            );
        }
        let Some(handle) = self.tools.get(tool) else {
            return format!("Error: tool '{}' is not registered", tool);
        };
        let args = match input {
            Ok(args) => args,
            Err(msg) => return format!("Error: {}", msg),
        };
        tracing::info!("[Agent] {} -> {}", self.id, tool);
        handle.invoke(args).await.to_json_string()
    }

    /// Run a task prompt to its final answer.
    pub async fn execute(&self, task_prompt: &str) -> Result<String, RealtyError> {
        let prompt = if self.def.reasoning {
            let plan = self.plan(task_prompt).await?;
            format!("Your plan:\n{}\n\n{}", plan, task_prompt)
        } else {
            task_prompt.to_string()
        };

        let mut messages = vec![ChatMessage::user(prompt)];

        for iteration in 0..self.def.max_iter {
            let reply = self.chat(&messages).await?;
            match parse_reply(&reply) {
                AgentStep::Final(answer) => {
                    tracing::debug!(
                        "[Agent] {} finished after {} iteration(s)",
                        self.id,
                        iteration + 1
                    );
                    return Ok(answer);
                }
                AgentStep::Action { tool, input } => {
                    let observation = self.use_tool(&tool, input).await;
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(format!("Observation: {}", observation)));
                }
            }
        }

        tracing::warn!(
            "[Agent] {} reached max_iter ({}), forcing a final answer",
            self.id,
            self.def.max_iter
        );
        messages.push(ChatMessage::user(
            "You have used the maximum number of tool calls. Do not call any more tools. \
             Give your best Final Answer now.",
        ));
        let reply = self.chat(&messages).await?;
        Ok(match parse_reply(&reply) {
            AgentStep::Final(answer) => answer,
            AgentStep::Action { .. } => reply.trim().to_string(),
        })
    }
}

fn plan_is_ready(plan: &str) -> bool {
    let upper = plan.trim_end().trim_end_matches('.').to_uppercase();
    upper.ends_with("READY") && !upper.ends_with("NOT READY")
}

fn strip_ready_marker(plan: &str) -> String {
    let trimmed = plan.trim_end().trim_end_matches('.');
    let upper = trimmed.to_uppercase();
    if upper.ends_with("READY") && !upper.ends_with("NOT READY") {
        trimmed[..trimmed.len() - "READY".len()].trim_end().to_string()
    } else {
        plan.trim().to_string()
    }
}
