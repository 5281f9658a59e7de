use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::search::SearchCriteria;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub properties_found: usize,
    pub properties_approved: usize,
    pub retries: u32,
}

/// Raw output of every phase, `None` for phases that did not run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPhases {
    pub research: Option<String>,
    /// Research output narrowed to the approved listings.
    #[serde(default)]
    pub filtered_research: Option<String>,
    pub calls: Option<String>,
    pub location: Option<String>,
}

/// The unified report written at the end of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedReport {
    pub flow_id: String,
    pub generated_at: DateTime<Utc>,
    pub search_criteria: Option<SearchCriteria>,
    pub summary: ReportSummary,
    pub approved_property_ids: Vec<String>,
    pub phases: ReportPhases,
}
