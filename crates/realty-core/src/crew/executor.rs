//! Crew executor: runs a crew definition against a chat model.
//!
//! The executor:
//! 1. Validates the crew and its tool bindings
//! 2. Builds one [`Agent`] per agent definition
//! 3. Runs the tasks sequentially, or manager-first with delegated work on
//!    a [`WorkerPool`]
//! 4. Plans every task up front when the crew asks for `planning`
//! 5. Passes output between tasks as context, via template substitution and,
//!    with `memory`, as a recap of all earlier outputs
//! 6. Writes task outputs that declare an `output_file`

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::agent::Agent;
use super::memory::CrewMemory;
use super::planner::{planner_def, planning_prompt, CrewPlan, PLANNER_ID};
use super::pool::WorkerPool;
use super::schema::{CrewDefinition, Process, TaskDef, TaskKind};
use super::template::{parse_json_output, render, write_output_file, CrewInputs, TemplateContext};
use crate::config::Settings;
use crate::error::RealtyError;
use crate::llm::ChatModel;
use crate::tools::ToolRegistry;

/// Output of one task run. Delegated tasks produce one entry per assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub task: String,
    pub agent: String,
    pub output: String,
}

/// Result of a whole crew run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewOutput {
    pub crew: String,
    /// Output of the last task
    pub raw: String,
    pub tasks: Vec<TaskOutput>,
}

/// One work item handed out by a manager task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub task: String,
    pub input: String,
}

/// Mutable bookkeeping for one kickoff.
#[derive(Default)]
struct RunState {
    /// Combined output per task name, for templates and output files
    outputs: HashMap<String, String>,
    /// Output of the previous step, handed to the next as context
    context: Option<String>,
    results: Vec<TaskOutput>,
    plan: Option<CrewPlan>,
    memory: Option<CrewMemory>,
}

impl RunState {
    fn new(crew: &CrewDefinition) -> Self {
        Self {
            memory: crew.memory.then(CrewMemory::new),
            ..Self::default()
        }
    }

    fn record(&mut self, crew: &CrewDefinition, task: &TaskDef, output: String) {
        self.outputs.insert(task.name.clone(), output.clone());
        self.context = Some(output.clone());
        self.push_result(crew, task, output);
    }

    fn push_result(&mut self, crew: &CrewDefinition, task: &TaskDef, output: String) {
        if let Some(memory) = self.memory.as_mut() {
            let role = crew
                .agents
                .get(&task.agent)
                .map(|a| a.role.as_str())
                .unwrap_or(task.agent.as_str());
            memory.remember(&task.name, role, &output);
        }
        self.results.push(TaskOutput {
            task: task.name.clone(),
            agent: task.agent.clone(),
            output,
        });
    }
}

/// The crew executor engine.
#[derive(Clone)]
pub struct CrewExecutor {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    default_model: String,
    manager_model: String,
    output_dir: PathBuf,
    retry_backoff: Duration,
}

impl CrewExecutor {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry, settings: &Settings) -> Self {
        Self {
            model,
            tools,
            default_model: settings.llm.default_model.clone(),
            manager_model: settings.llm.manager_model.clone(),
            output_dir: settings.output_dir.clone(),
            retry_backoff: Duration::from_secs(2),
        }
    }

    /// Base delay between model-call retries (doubled per attempt).
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn build_agents(&self, crew: &CrewDefinition) -> HashMap<String, Arc<Agent>> {
        crew.agents
            .iter()
            .map(|(id, def)| {
                let model_name = def.llm.clone().unwrap_or_else(|| self.default_model.clone());
                let agent = Agent::new(
                    id.clone(),
                    def.clone(),
                    model_name,
                    self.model.clone(),
                    self.tools.clone(),
                    self.retry_backoff,
                );
                (id.clone(), Arc::new(agent))
            })
            .collect()
    }

    /// The manage task's agent, running on the manager model.
    fn build_manager(&self, crew: &CrewDefinition, task: &TaskDef) -> Result<Agent, RealtyError> {
        let def = agent_def(crew, task)?.clone();
        let model_name = crew
            .manager_llm
            .clone()
            .unwrap_or_else(|| self.manager_model.clone());
        Ok(Agent::new(
            task.agent.clone(),
            def,
            model_name,
            self.model.clone(),
            self.tools.clone(),
            self.retry_backoff,
        ))
    }

    /// One planning pass over every task of the crew.
    async fn plan(&self, crew: &CrewDefinition, inputs: &CrewInputs) -> Result<CrewPlan, RealtyError> {
        let model_name = crew
            .planning_llm
            .clone()
            .unwrap_or_else(|| self.manager_model.clone());
        let planner = Agent::new(
            PLANNER_ID,
            planner_def(),
            model_name,
            self.model.clone(),
            ToolRegistry::new(),
            self.retry_backoff,
        );
        tracing::info!("[CrewExecutor] Planning crew '{}'", crew.name);
        let answer = planner.execute(&planning_prompt(crew, inputs)).await?;
        Ok(CrewPlan::parse(&answer, crew))
    }

    /// Run a crew to completion.
    pub async fn kickoff(
        &self,
        crew: &CrewDefinition,
        inputs: &CrewInputs,
    ) -> Result<CrewOutput, RealtyError> {
        crew.validate()?;
        crew.validate_tools(&self.tools)?;

        tracing::info!(
            "[CrewExecutor] Kicking off crew '{}' ({:?}, {} tasks)",
            crew.name,
            crew.process,
            crew.tasks.len()
        );

        let agents = self.build_agents(crew);
        let mut state = RunState::new(crew);
        if crew.planning {
            state.plan = Some(self.plan(crew, inputs).await?);
        }

        match crew.process {
            Process::Sequential => {
                self.run_steps(crew, &crew.tasks, &agents, inputs, &mut state)
                    .await?
            }
            Process::Hierarchical => {
                self.run_hierarchical(crew, &agents, inputs, &mut state)
                    .await?
            }
        }

        for task in &crew.tasks {
            if let (Some(file), Some(output)) = (&task.output_file, state.outputs.get(&task.name)) {
                write_output_file(&self.output_dir, file, output).await?;
            }
        }

        let raw = state
            .results
            .last()
            .map(|r| r.output.clone())
            .unwrap_or_default();
        tracing::info!("[CrewExecutor] Crew '{}' finished", crew.name);

        Ok(CrewOutput {
            crew: crew.name.clone(),
            raw,
            tasks: state.results,
        })
    }

    /// Run tasks in order. Consecutive `async_execution` tasks run together
    /// on the pool and share the same context.
    async fn run_steps(
        &self,
        crew: &CrewDefinition,
        tasks: &[TaskDef],
        agents: &HashMap<String, Arc<Agent>>,
        inputs: &CrewInputs,
        state: &mut RunState,
    ) -> Result<(), RealtyError> {
        let mut i = 0;
        while i < tasks.len() {
            if tasks[i].async_execution {
                let batch_end = tasks[i..]
                    .iter()
                    .position(|t| !t.async_execution)
                    .map_or(tasks.len(), |p| i + p);
                let batch = &tasks[i..batch_end];

                let mut jobs = Vec::with_capacity(batch.len());
                for task in batch {
                    let agent = agent_for(crew, agents, task)?;
                    let prompt = task_prompt(task, inputs, state, None);
                    tracing::info!("[CrewExecutor] {} → {} (async)", task.name, task.agent);
                    jobs.push(move || async move { agent.execute(&prompt).await });
                }
                let outputs = WorkerPool::new(crew.max_workers).run(jobs).await?;

                let mut combined = Vec::with_capacity(outputs.len());
                for (task, output) in batch.iter().zip(outputs) {
                    combined.push(format!("## {}\n{}", task.name, output));
                    state.record(crew, task, output);
                }
                state.context = Some(combined.join("\n\n"));
                i = batch_end;
            } else {
                let task = &tasks[i];
                let agent = agent_for(crew, agents, task)?;
                let prompt = task_prompt(task, inputs, state, None);
                tracing::info!("[CrewExecutor] {} → {}", task.name, task.agent);
                let output = agent.execute(&prompt).await.map_err(|e| {
                    tracing::error!("[CrewExecutor] Task '{}' failed: {}", task.name, e);
                    e
                })?;
                state.record(crew, task, output);
                i += 1;
            }
        }
        Ok(())
    }

    async fn run_hierarchical(
        &self,
        crew: &CrewDefinition,
        agents: &HashMap<String, Arc<Agent>>,
        inputs: &CrewInputs,
        state: &mut RunState,
    ) -> Result<(), RealtyError> {
        let manage = crew
            .manage_task()
            .ok_or_else(|| RealtyError::Crew(format!("crew '{}' has no manage task", crew.name)))?;
        let manager = self.build_manager(crew, manage)?;

        let mut prompt = task_prompt(manage, inputs, state, None);
        prompt.push_str(&assignment_instructions(crew));
        tracing::info!("[CrewExecutor] {} → {} (manager)", manage.name, manage.agent);
        let manager_output = manager.execute(&prompt).await?;

        let mut assignments = parse_assignments(&manager_output, crew);
        if assignments.is_empty() {
            tracing::warn!(
                "[CrewExecutor] Manager of '{}' produced no usable assignments, running each delegate task once",
                crew.name
            );
            assignments = fallback_assignments(crew, inputs);
        }
        state.record(crew, manage, manager_output);

        let mut jobs = Vec::with_capacity(assignments.len());
        for assignment in &assignments {
            let task = crew.task(&assignment.task).ok_or_else(|| {
                RealtyError::Crew(format!("unknown delegate task '{}'", assignment.task))
            })?;
            let agent = agent_for(crew, agents, task)?;
            let prompt = task_prompt(task, inputs, state, Some(&assignment.input));
            jobs.push(move || async move { agent.execute(&prompt).await });
        }

        let pool = WorkerPool::new(crew.max_workers);
        tracing::info!(
            "[CrewExecutor] Delegating {} assignment(s) to {} worker(s)",
            assignments.len(),
            pool.workers()
        );
        let outputs = pool.run(jobs).await?;

        let mut by_task: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        let mut combined = Vec::with_capacity(outputs.len());
        for (n, (assignment, output)) in assignments.iter().zip(outputs).enumerate() {
            combined.push(format!("## {} #{}\n{}", assignment.task, n + 1, output));
            by_task
                .entry(assignment.task.as_str())
                .or_default()
                .push(output.clone());
            if let Some(task) = crew.task(&assignment.task) {
                state.push_result(crew, task, output);
            }
        }
        for (task, outputs) in by_task {
            state.outputs.insert(task.to_string(), outputs.join("\n\n"));
        }
        state.context = Some(combined.join("\n\n"));

        let first_after = crew
            .tasks
            .iter()
            .rposition(|t| t.kind == TaskKind::Delegate)
            .map_or(crew.tasks.len(), |p| p + 1);
        self.run_steps(crew, &crew.tasks[first_after..], agents, inputs, state)
            .await
    }
}

fn agent_def<'a>(
    crew: &'a CrewDefinition,
    task: &TaskDef,
) -> Result<&'a super::schema::AgentDef, RealtyError> {
    crew.agents.get(&task.agent).ok_or_else(|| {
        RealtyError::Crew(format!(
            "task '{}' references unknown agent '{}'",
            task.name, task.agent
        ))
    })
}

fn agent_for(
    crew: &CrewDefinition,
    agents: &HashMap<String, Arc<Agent>>,
    task: &TaskDef,
) -> Result<Arc<Agent>, RealtyError> {
    agent_def(crew, task)?;
    agents
        .get(&task.agent)
        .cloned()
        .ok_or_else(|| RealtyError::Crew(format!("agent '{}' was not built", task.agent)))
}

/// Build the prompt for a task from its templates and the current context.
fn task_prompt(
    task: &TaskDef,
    inputs: &CrewInputs,
    state: &RunState,
    assignment: Option<&str>,
) -> String {
    let ctx = TemplateContext {
        inputs,
        task_outputs: &state.outputs,
        assignment,
    };

    let mut prompt = format!("Current Task: {}", render(task.description.trim(), &ctx));
    if !task.expected_output.trim().is_empty() {
        prompt.push_str(&format!(
            "\n\nThis is the expected criteria for your final answer: {}",
            render(task.expected_output.trim(), &ctx)
        ));
    }
    if let Some(plan) = state.plan.as_ref().and_then(|p| p.for_task(&task.name)) {
        prompt.push_str(&format!("\n\nPlan for this task:\n{}", plan));
    }
    if let Some(assignment) = assignment {
        prompt.push_str(&format!("\n\nYour assignment:\n{}", assignment));
    }
    if let Some(memory) = state
        .memory
        .as_ref()
        .and_then(|m| m.recall(state.context.as_deref()))
    {
        prompt.push_str(&format!(
            "\n\nWhat earlier tasks in this crew produced:\n{}",
            memory
        ));
    }
    if let Some(context) = state.context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!(
            "\n\nThis is the context you're working with:\n{}",
            context
        ));
    }
    prompt
}

fn assignment_instructions(crew: &CrewDefinition) -> String {
    let mut out = String::from("\n\nYou coordinate these tasks:\n");
    for task in crew.delegate_tasks() {
        let summary = task.description.trim().lines().next().unwrap_or("");
        out.push_str(&format!("- {}: {}\n", task.name, summary));
    }
    out.push_str(
        "\nYour Final Answer must be only JSON of the form:\n\
         {\"assignments\": [{\"task\": \"<task name>\", \"input\": \"<the work item for that task>\"}]}",
    );
    if let Some(max) = crew.max_assignments {
        out.push_str(&format!("\nHand out at most {} assignments.", max));
    }
    out
}

/// Parse a manager answer into assignments for the crew's delegate tasks.
/// Unknown task names are dropped; the list is capped at `max_assignments`.
pub fn parse_assignments(text: &str, crew: &CrewDefinition) -> Vec<Assignment> {
    let Some(value) = parse_json_output(text) else {
        tracing::warn!("[CrewExecutor] Manager answer is not JSON");
        return Vec::new();
    };
    let entries = match &value {
        serde_json::Value::Array(items) => items.as_slice(),
        other => match other.get("assignments").and_then(|a| a.as_array()) {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
    };

    let mut assignments = Vec::new();
    for entry in entries {
        let Some(task) = entry.get("task").and_then(|t| t.as_str()) else {
            continue;
        };
        if !crew.delegate_tasks().any(|t| t.name == task) {
            tracing::warn!("[CrewExecutor] Dropping assignment for unknown task '{}'", task);
            continue;
        }
        let input = match entry.get("input") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
        };
        assignments.push(Assignment {
            task: task.to_string(),
            input,
        });
    }

    if let Some(max) = crew.max_assignments {
        if assignments.len() > max {
            tracing::warn!(
                "[CrewExecutor] Capping {} assignments at {}",
                assignments.len(),
                max
            );
            assignments.truncate(max);
        }
    }
    assignments
}

fn fallback_assignments(crew: &CrewDefinition, inputs: &CrewInputs) -> Vec<Assignment> {
    let ordered: BTreeMap<&String, &String> = inputs.iter().collect();
    let input = serde_json::to_string_pretty(&ordered).unwrap_or_default();
    crew.delegate_tasks()
        .map(|t| Assignment {
            task: t.name.clone(),
            input: input.clone(),
        })
        .collect()
}
