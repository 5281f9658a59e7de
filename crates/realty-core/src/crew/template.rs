//! Prompt template resolution and crew output helpers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::RealtyError;

/// Named string inputs handed to a crew at kickoff.
pub type CrewInputs = HashMap<String, String>;

/// Values visible to a task's prompt template.
pub struct TemplateContext<'a> {
    pub inputs: &'a CrewInputs,
    pub task_outputs: &'a HashMap<String, String>,
    pub assignment: Option<&'a str>,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"))
}

/// Resolve template variables in a string.
///
/// Supported patterns:
/// - `${inputs.<key>}` or `${<key>}`: crew inputs
/// - `${tasks.<name>.output}`: output of an earlier task
/// - `${assignment}`: the work item given to a delegated task
/// - `${ENV_VAR}` / `${ENV_VAR:-default}`: from environment
///
/// Unknown references are left in place.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    placeholder_re()
        .replace_all(template, |caps: &regex::Captures| {
            let expr = &caps[1];
            resolve(expr, ctx).unwrap_or_else(|| format!("${{{}}}", expr))
        })
        .to_string()
}

fn resolve(expr: &str, ctx: &TemplateContext<'_>) -> Option<String> {
    if expr == "assignment" {
        return ctx.assignment.map(str::to_string);
    }
    if let Some(key) = expr.strip_prefix("inputs.") {
        return ctx.inputs.get(key).cloned();
    }
    if let Some(name) = expr
        .strip_prefix("tasks.")
        .and_then(|rest| rest.strip_suffix(".output"))
    {
        return ctx.task_outputs.get(name).cloned();
    }
    if let Some(value) = ctx.inputs.get(expr) {
        return Some(value.clone());
    }
    match expr.split_once(":-") {
        Some((var, default)) => Some(std::env::var(var).unwrap_or_else(|_| default.to_string())),
        None => std::env::var(expr).ok(),
    }
}

/// Body of the first fenced code block, or the trimmed text when unfenced.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    // Skip the info string (```json)
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parse agent output as JSON, tolerating code fences and surrounding prose.
pub fn parse_json_output(text: &str) -> Option<serde_json::Value> {
    let body = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(body) {
        return Some(value);
    }
    let start = body.find(['{', '['])?;
    let end = body.rfind(['}', ']'])?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

/// Write a task output under `output_dir`, pretty printing it when it is JSON.
pub async fn write_output_file(
    output_dir: &Path,
    relative: &str,
    output: &str,
) -> Result<(), RealtyError> {
    let path = output_dir.join(relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = match parse_json_output(output) {
        Some(value) => serde_json::to_string_pretty(&value)?,
        None => strip_code_fences(output).to_string(),
    };
    tokio::fs::write(&path, body).await?;
    tracing::info!("[Crew] Wrote {}", path.display());
    Ok(())
}
