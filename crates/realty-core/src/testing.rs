//! Test doubles shared by the crate's unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::RealtyError;
use crate::llm::{ChatModel, ChatRequest, ChatResponse};

/// Chat model answering through a closure; records every request.
pub struct FnModel<F> {
    respond: F,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl<F> FnModel<F>
where
    F: Fn(&ChatRequest) -> Result<String, RealtyError> + Send + Sync,
{
    pub fn new(respond: F) -> Arc<Self> {
        Arc::new(Self {
            respond,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl<F> ChatModel for FnModel<F>
where
    F: Fn(&ChatRequest) -> Result<String, RealtyError> + Send + Sync,
{
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, RealtyError> {
        self.requests.lock().unwrap().push(request.clone());
        let content = (self.respond)(request)?;
        Ok(ChatResponse {
            content,
            model: request.model.clone(),
            usage: None,
        })
    }
}

/// First user message of a request: the task prompt.
pub fn task_prompt(request: &ChatRequest) -> &str {
    request
        .messages
        .first()
        .map(|m| m.content.as_str())
        .unwrap_or("")
}
