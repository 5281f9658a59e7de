//! Crew-level planning.
//!
//! With `planning: true` a planner agent sees every task of the crew once,
//! before the first one runs, and answers with a step-by-step plan per task:
//!
//! ```json
//! {"plans": [{"task": "scrape_listings", "plan": "1. Search ... 2. ..."}]}
//! ```
//!
//! Each task prompt then carries its own plan. An answer that is not in that
//! shape is used as one plan for every task.

use std::collections::HashMap;

use super::schema::{AgentDef, CrewDefinition};
use super::template::{parse_json_output, render, CrewInputs, TemplateContext};

pub const PLANNER_ID: &str = "crew_planner";

/// The planner agent's definition.
pub fn planner_def() -> AgentDef {
    let mut def = AgentDef::new(
        "Task Execution Planner",
        "Write a concise step-by-step plan for each task so the crew completes it well",
    );
    def.backstory = "You break work into clear, ordered steps that other agents can follow.".to_string();
    def
}

/// Prompt asking for one plan per task.
pub fn planning_prompt(crew: &CrewDefinition, inputs: &CrewInputs) -> String {
    let outputs = HashMap::new();
    let ctx = TemplateContext {
        inputs,
        task_outputs: &outputs,
        assignment: None,
    };

    let mut prompt = format!(
        "Current Task: Plan how the crew '{}' will complete its tasks, in order.\n\nTasks:\n",
        crew.name
    );
    for (n, task) in crew.tasks.iter().enumerate() {
        let role = crew
            .agents
            .get(&task.agent)
            .map(|a| a.role.as_str())
            .unwrap_or(task.agent.as_str());
        prompt.push_str(&format!(
            "{}. {} (agent: {})\n   {}\n",
            n + 1,
            task.name,
            role,
            render(task.description.trim(), &ctx).replace('\n', "\n   ")
        ));
        if !task.expected_output.trim().is_empty() {
            prompt.push_str(&format!("   Expected output: {}\n", task.expected_output.trim()));
        }
        if let Some(tools) = crew.agents.get(&task.agent).map(|a| &a.tools).filter(|t| !t.is_empty()) {
            prompt.push_str(&format!("   Tools: {}\n", tools.join(", ")));
        }
    }
    prompt.push_str(
        "\nYour Final Answer must be only JSON of the form:\n\
         {\"plans\": [{\"task\": \"<task name>\", \"plan\": \"<step-by-step plan for that task>\"}]}",
    );
    prompt
}

/// Plans produced by the planning pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrewPlan {
    by_task: HashMap<String, String>,
    shared: Option<String>,
}

impl CrewPlan {
    /// Interpret the planner's answer. Entries for unknown tasks are dropped.
    pub fn parse(answer: &str, crew: &CrewDefinition) -> Self {
        let mut by_task = HashMap::new();
        if let Some(value) = parse_json_output(answer) {
            let entries = match &value {
                serde_json::Value::Array(items) => Some(items),
                other => other.get("plans").and_then(|p| p.as_array()),
            };
            for entry in entries.into_iter().flatten() {
                let (Some(task), Some(plan)) = (
                    entry.get("task").and_then(|t| t.as_str()),
                    entry.get("plan").and_then(plan_text),
                ) else {
                    continue;
                };
                if crew.task(task).is_none() {
                    tracing::warn!("[Planner] Dropping plan for unknown task '{}'", task);
                    continue;
                }
                if !plan.trim().is_empty() {
                    by_task.insert(task.to_string(), plan.trim().to_string());
                }
            }
        }

        if by_task.is_empty() {
            let shared = answer.trim();
            if shared.is_empty() {
                return Self::default();
            }
            tracing::warn!("[Planner] Plan is not per task, sharing it with every task");
            return Self {
                by_task,
                shared: Some(shared.to_string()),
            };
        }
        Self {
            by_task,
            shared: None,
        }
    }

    pub fn for_task(&self, task: &str) -> Option<&str> {
        self.by_task
            .get(task)
            .map(String::as_str)
            .or(self.shared.as_deref())
    }
}

/// A plan may come back as a string or as a list of steps.
fn plan_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(steps) => Some(
            steps
                .iter()
                .enumerate()
                .map(|(n, step)| match step.as_str() {
                    Some(s) => format!("{}. {}", n + 1, s),
                    None => format!("{}. {}", n + 1, step),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}
