use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::search::SearchCriteria;

/// Where a flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    #[default]
    Pending,
    Researching,
    AwaitingApproval,
    RunningParallel,
    Reporting,
    Completed,
}

impl FlowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowPhase::Pending => "pending",
            FlowPhase::Researching => "researching",
            FlowPhase::AwaitingApproval => "awaiting_approval",
            FlowPhase::RunningParallel => "running_parallel",
            FlowPhase::Reporting => "reporting",
            FlowPhase::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FlowPhase::Pending),
            "researching" => Some(FlowPhase::Researching),
            "awaiting_approval" => Some(FlowPhase::AwaitingApproval),
            "running_parallel" => Some(FlowPhase::RunningParallel),
            "reporting" => Some(FlowPhase::Reporting),
            "completed" => Some(FlowPhase::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowPhase::Completed)
    }
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single mutable record of a flow run.
///
/// Raw crew outputs are kept as strings exactly as the crews produced them;
/// counters are best-effort views derived from those strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    #[serde(default)]
    pub phase: FlowPhase,
    #[serde(default)]
    pub search_criteria: Option<SearchCriteria>,
    #[serde(default)]
    pub approved_property_ids: Vec<String>,
    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub research_results: Option<String>,
    #[serde(default)]
    pub filtered_research_results: Option<String>,
    #[serde(default)]
    pub location_results: Option<String>,
    #[serde(default)]
    pub call_results: Option<String>,

    #[serde(default)]
    pub properties_found: usize,
    #[serde(default)]
    pub properties_approved: usize,
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A persisted flow: its id, the phase it stopped in and the full state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub id: String,
    pub phase: FlowPhase,
    pub state: FlowState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
