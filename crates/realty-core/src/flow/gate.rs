//! Human approval gate.
//!
//! After research the flow stops until somebody reviews the listings and
//! either approves a set of property ids or asks for another research pass.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RealtyError;

pub const APPROVAL_PROMPT: &str = "Review the properties above. Enter approved property IDs \
(e.g. ['prop_001','prop_002']) or type 'retry' to search again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved(Vec<String>),
    Retry,
}

/// Interpret free-text reviewer feedback.
///
/// - `retry` (any case) asks for a new research pass
/// - a JSON array of strings approves those ids; Python-style single quotes
///   are accepted
/// - a comma or whitespace separated list of ids approves those ids
/// - anything else approves nothing
pub fn parse_feedback(feedback: &str) -> ApprovalDecision {
    let text = feedback.trim();
    if text.eq_ignore_ascii_case("retry") {
        return ApprovalDecision::Retry;
    }

    if text.starts_with('[') {
        let ids = serde_json::from_str::<Vec<String>>(text)
            .or_else(|_| serde_json::from_str::<Vec<String>>(&text.replace('\'', "\"")))
            .unwrap_or_default();
        return ApprovalDecision::Approved(clean_ids(ids));
    }

    let tokens: Vec<String> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.trim_matches(|c| c == '"' || c == '\'').to_string())
        .collect();
    if !tokens.is_empty() && tokens.iter().all(|t| looks_like_id(t)) {
        return ApprovalDecision::Approved(clean_ids(tokens));
    }

    ApprovalDecision::Approved(Vec::new())
}

/// Ids carry at least one digit and no punctuation beyond `_`, `-` and `.`.
fn looks_like_id(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn clean_ids(ids: Vec<String>) -> Vec<String> {
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Source of approval decisions for a flow paused at the approval gate.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn review(
        &self,
        flow_id: &str,
        research_results: &str,
    ) -> Result<ApprovalDecision, RealtyError>;
}

/// Gate that replays canned feedback strings. Once exhausted it approves
/// nothing, so a flow driven by it always terminates.
#[derive(Debug, Default)]
pub struct ScriptedGate {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedGate {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl ApprovalGate for ScriptedGate {
    async fn review(
        &self,
        flow_id: &str,
        _research_results: &str,
    ) -> Result<ApprovalDecision, RealtyError> {
        let reply = self
            .replies
            .lock()
            .map_err(|e| RealtyError::Io(format!("Lock poisoned: {}", e)))?
            .pop_front()
            .unwrap_or_default();
        tracing::debug!("[ApprovalGate] {} <- {:?}", flow_id, reply);
        Ok(parse_feedback(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved(ids: &[&str]) -> ApprovalDecision {
        ApprovalDecision::Approved(ids.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_retry_is_case_insensitive() {
        assert_eq!(parse_feedback("retry"), ApprovalDecision::Retry);
        assert_eq!(parse_feedback("  RETRY \n"), ApprovalDecision::Retry);
    }

    #[test]
    fn test_json_and_python_style_lists() {
        assert_eq!(
            parse_feedback(r#"["prop_001", "prop_003"]"#),
            approved(&["prop_001", "prop_003"])
        );
        assert_eq!(
            parse_feedback("['prop_001','prop_002']"),
            approved(&["prop_001", "prop_002"])
        );
        assert_eq!(parse_feedback("[1, 2]"), approved(&[]));
    }

    #[test]
    fn test_plain_id_lists() {
        assert_eq!(parse_feedback("prop_001, prop_002"), approved(&["prop_001", "prop_002"]));
        assert_eq!(parse_feedback("prop_004"), approved(&["prop_004"]));
    }

    #[test]
    fn test_free_text_approves_nothing() {
        assert_eq!(parse_feedback("looks good to me"), approved(&[]));
        assert_eq!(parse_feedback(""), approved(&[]));
        assert_eq!(parse_feedback("please retry"), approved(&[]));
    }

    #[tokio::test]
    async fn test_scripted_gate_replays_then_approves_nothing() {
        let gate = ScriptedGate::new(["retry", "prop_001"]);
        assert_eq!(gate.review("f", "").await.unwrap(), ApprovalDecision::Retry);
        assert_eq!(gate.review("f", "").await.unwrap(), approved(&["prop_001"]));
        assert_eq!(gate.review("f", "").await.unwrap(), approved(&[]));
    }
}
