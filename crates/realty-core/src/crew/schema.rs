//! YAML schema types for crew definitions.
//!
//! A crew YAML declares role-bound agents, the tasks they perform and how
//! the tasks are scheduled:
//!
//! ```yaml
//! name: location_analyzer
//! description: "Neighbourhood intelligence for approved listings"
//! process: hierarchical
//! manager_llm: "openai/gpt-4o"
//! max_workers: 4
//! planning: true
//! memory: true
//!
//! agents:
//!   coordinator:
//!     role: "Location Analysis Coordinator"
//!     goal: "Split the approved listings into per-property work items"
//!     backstory: "..."
//!   analyzer:
//!     role: "Location Intelligence Analyst"
//!     goal: "..."
//!     backstory: "..."
//!     reasoning: true
//!     max_reasoning_attempts: 2
//!
//! tasks:
//!   - name: assign_properties
//!     agent: coordinator
//!     kind: manage
//!     description: "Approved listings: ${inputs.research_results}"
//!   - name: analyze_property
//!     agent: analyzer
//!     kind: delegate
//!     async_execution: true
//!     description: "Analyse this property: ${assignment}"
//!   - name: compile_location_report
//!     agent: coordinator
//!     kind: compile
//!     output_file: output/location_intelligence.json
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RealtyError;
use crate::tools::ToolRegistry;

/// How a crew schedules its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Process {
    /// Tasks run in declaration order, each seeing the previous output
    #[default]
    Sequential,
    /// A manager task assigns work items to delegate tasks run by a worker pool
    Hierarchical,
}

/// Top-level crew definition loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewDefinition {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub process: Process,

    /// Model for the manage task; falls back to the configured manager model
    #[serde(default)]
    pub manager_llm: Option<String>,

    /// Worker pool size for delegated and async tasks
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Cap on the number of work items a manager may hand out
    #[serde(default)]
    pub max_assignments: Option<usize>,

    /// Plan every task in one model call before the first task runs
    #[serde(default)]
    pub planning: bool,

    /// Model for the planning pass; falls back to the configured manager model
    #[serde(default)]
    pub planning_llm: Option<String>,

    /// Show later agents the outputs of earlier tasks in the same kickoff
    #[serde(default)]
    pub memory: bool,

    pub agents: BTreeMap<String, AgentDef>,

    pub tasks: Vec<TaskDef>,
}

fn default_max_workers() -> usize {
    4
}

/// A role-bound agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,

    /// Model override (e.g. "deepseek/deepseek-r1")
    #[serde(default)]
    pub llm: Option<String>,

    #[serde(default)]
    pub temperature: Option<f64>,

    /// Upper bound on tool-use iterations before a final answer is forced
    #[serde(default = "default_max_iter")]
    pub max_iter: u32,

    /// Model calls allowed per minute
    #[serde(default)]
    pub max_rpm: Option<u32>,

    /// Retries of a failed model call
    #[serde(default = "default_max_retry_limit")]
    pub max_retry_limit: u32,

    /// Registry names of the tools this agent may call
    #[serde(default)]
    pub tools: Vec<String>,

    /// Draft a plan before acting
    #[serde(default)]
    pub reasoning: bool,

    #[serde(default = "default_max_reasoning_attempts")]
    pub max_reasoning_attempts: u32,
}

impl AgentDef {
    /// A tool-less agent with default limits.
    pub fn new(role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: String::new(),
            llm: None,
            temperature: None,
            max_iter: default_max_iter(),
            max_rpm: None,
            max_retry_limit: default_max_retry_limit(),
            tools: Vec::new(),
            reasoning: false,
            max_reasoning_attempts: default_max_reasoning_attempts(),
        }
    }
}

fn default_max_iter() -> u32 {
    15
}

fn default_max_retry_limit() -> u32 {
    2
}

fn default_max_reasoning_attempts() -> u32 {
    3
}

/// Role of a task inside its crew's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Step,
    /// Hierarchical manager: answers with work-item assignments
    Manage,
    /// Hierarchical worker task, run once per assignment
    Delegate,
    /// Runs after all delegated work, over its combined output
    Compile,
}

/// A single task in the crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
    /// Unique within the crew, used for `${tasks.<name>.output}` references
    pub name: String,

    /// Agent id from the `agents` map
    pub agent: String,

    #[serde(default)]
    pub kind: TaskKind,

    /// Prompt template
    pub description: String,

    #[serde(default)]
    pub expected_output: String,

    /// Run concurrently with neighbouring async tasks
    #[serde(default)]
    pub async_execution: bool,

    /// Where to write this task's output, relative to the output directory
    #[serde(default)]
    pub output_file: Option<String>,
}

impl CrewDefinition {
    /// Parse a crew definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, RealtyError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RealtyError::Parse(format!("Failed to parse crew YAML: {}", e)))
    }

    /// Load a crew definition from a file path.
    pub fn from_file(path: &Path) -> Result<Self, RealtyError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RealtyError::Io(format!("Failed to read crew file '{}': {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn manage_task(&self) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.kind == TaskKind::Manage)
    }

    pub fn delegate_tasks(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.iter().filter(|t| t.kind == TaskKind::Delegate)
    }

    /// Output file of the crew's final report, if any task declares one.
    pub fn report_file(&self) -> Option<&str> {
        self.tasks.iter().rev().find_map(|t| t.output_file.as_deref())
    }

    /// Check structural rules that serde cannot express.
    pub fn validate(&self) -> Result<(), RealtyError> {
        let invalid = |msg: String| Err(RealtyError::Crew(format!("crew '{}': {}", self.name, msg)));

        if self.tasks.is_empty() {
            return invalid("at least one task is required".to_string());
        }
        if self.max_workers == 0 {
            return invalid("max_workers must be at least 1".to_string());
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.name.as_str()) {
                return invalid(format!("duplicate task name '{}'", task.name));
            }
            if !self.agents.contains_key(&task.agent) {
                return invalid(format!(
                    "task '{}' references unknown agent '{}'",
                    task.name, task.agent
                ));
            }
        }

        match self.process {
            Process::Sequential => {
                if let Some(task) = self
                    .tasks
                    .iter()
                    .find(|t| matches!(t.kind, TaskKind::Manage | TaskKind::Delegate))
                {
                    return invalid(format!(
                        "sequential crews only allow step and compile tasks, '{}' is {:?}",
                        task.name, task.kind
                    ));
                }
            }
            Process::Hierarchical => {
                let managers = self.tasks.iter().filter(|t| t.kind == TaskKind::Manage).count();
                if managers != 1 || self.tasks[0].kind != TaskKind::Manage {
                    return invalid(
                        "hierarchical crews need exactly one manage task, placed first".to_string(),
                    );
                }
                let Some(last_delegate) =
                    self.tasks.iter().rposition(|t| t.kind == TaskKind::Delegate)
                else {
                    return invalid("hierarchical crews need at least one delegate task".to_string());
                };
                if let Some(task) = self.tasks[1..=last_delegate]
                    .iter()
                    .find(|t| t.kind != TaskKind::Delegate)
                {
                    return invalid(format!(
                        "task '{}' must come after the delegate tasks",
                        task.name
                    ));
                }
            }
        }

        Ok(())
    }

    /// Check that every tool an agent binds is registered.
    pub fn validate_tools(&self, registry: &ToolRegistry) -> Result<(), RealtyError> {
        for (id, agent) in &self.agents {
            for tool in &agent.tools {
                if !registry.contains(tool) {
                    return Err(RealtyError::Crew(format!(
                        "crew '{}': agent '{}' binds unknown tool '{}'. Available: {:?}",
                        self.name,
                        id,
                        tool,
                        registry.names()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    const HIERARCHICAL: &str = r#"
name: calls
process: hierarchical
agents:
  manager:
    role: "Call Router"
    goal: "Route each property"
  inspector:
    role: "Inspector"
    goal: "Book viewings"
    tools: [make_inspection_call, get_call_result]
tasks:
  - name: route
    agent: manager
    kind: manage
    description: "Route ${inputs.research_results}"
  - name: inspect
    agent: inspector
    kind: delegate
    description: "Call about ${assignment}"
  - name: report
    agent: manager
    kind: compile
    description: "Summarise"
    output_file: output/calls.json
"#;

    #[test]
    fn test_parse_minimal_crew_defaults() {
        let yaml = r#"
name: tiny
agents:
  writer:
    role: "Writer"
    goal: "Write"
tasks:
  - name: write
    agent: writer
    description: "Write something"
"#;
        let crew = CrewDefinition::from_yaml(yaml).unwrap();
        assert_eq!(crew.process, Process::Sequential);
        assert_eq!(crew.max_workers, 4);
        let writer = &crew.agents["writer"];
        assert_eq!(writer.max_iter, 15);
        assert_eq!(writer.max_retry_limit, 2);
        assert_eq!(writer.max_reasoning_attempts, 3);
        assert!(!writer.reasoning);
        assert!(!crew.planning);
        assert!(!crew.memory);
        assert_eq!(crew.tasks[0].kind, TaskKind::Step);
        crew.validate().unwrap();
    }

    #[test]
    fn test_hierarchical_crew_validates() {
        let crew = CrewDefinition::from_yaml(HIERARCHICAL).unwrap();
        crew.validate().unwrap();
        assert_eq!(crew.manage_task().unwrap().name, "route");
        assert_eq!(crew.delegate_tasks().count(), 1);
        assert_eq!(crew.report_file(), Some("output/calls.json"));
        crew.validate_tools(&ToolRegistry::standard(&Settings::default())).unwrap();
    }

    #[test]
    fn test_validation_failures() {
        let mut crew = CrewDefinition::from_yaml(HIERARCHICAL).unwrap();
        crew.tasks.swap(0, 1);
        assert!(crew.validate().unwrap_err().to_string().contains("placed first"));

        let mut crew = CrewDefinition::from_yaml(HIERARCHICAL).unwrap();
        crew.tasks[2].agent = "ghost".to_string();
        assert!(crew.validate().unwrap_err().to_string().contains("unknown agent 'ghost'"));

        let mut crew = CrewDefinition::from_yaml(HIERARCHICAL).unwrap();
        crew.tasks[2].name = "inspect".to_string();
        assert!(crew.validate().unwrap_err().to_string().contains("duplicate"));

        let mut crew = CrewDefinition::from_yaml(HIERARCHICAL).unwrap();
        crew.process = Process::Sequential;
        assert!(crew.validate().is_err());

        let mut crew = CrewDefinition::from_yaml(HIERARCHICAL).unwrap();
        crew.tasks[1].kind = TaskKind::Compile;
        assert!(crew.validate().unwrap_err().to_string().contains("delegate"));
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        let mut crew = CrewDefinition::from_yaml(HIERARCHICAL).unwrap();
        crew.agents
            .get_mut("inspector")
            .unwrap()
            .tools
            .push("send_fax".to_string());
        let err = crew
            .validate_tools(&ToolRegistry::standard(&Settings::default()))
            .unwrap_err();
        assert!(err.to_string().contains("send_fax"));
    }
}
