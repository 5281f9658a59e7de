//! Core error type for Realty Agents.
//!
//! `RealtyError` covers failures that abort a flow or a CLI command. Tool
//! calls never return it: vendor and configuration problems inside a tool are
//! reported as a failed [`crate::tools::ToolResult`] instead.

use crate::models::FlowPhase;

#[derive(Debug, thiserror::Error)]
pub enum RealtyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Crew error: {0}")]
    Crew(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid transition: cannot {action} while {phase}")]
    InvalidTransition { action: &'static str, phase: FlowPhase },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for RealtyError {
    fn from(e: std::io::Error) -> Self {
        RealtyError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for RealtyError {
    fn from(e: reqwest::Error) -> Self {
        RealtyError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for RealtyError {
    fn from(e: serde_json::Error) -> Self {
        RealtyError::Parse(e.to_string())
    }
}
