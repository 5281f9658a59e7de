//! Unified report assembled at the end of a flow.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::RealtyError;
use crate::models::flow::FlowState;
use crate::models::report::{ReportPhases, ReportSummary, UnifiedReport};

pub const UNIFIED_REPORT_FILE: &str = "output/unified_report.json";

pub fn build_report(flow_id: &str, state: &FlowState) -> UnifiedReport {
    UnifiedReport {
        flow_id: flow_id.to_string(),
        generated_at: Utc::now(),
        search_criteria: state.search_criteria.clone(),
        summary: ReportSummary {
            properties_found: state.properties_found,
            properties_approved: state.properties_approved,
            retries: state.retry_count,
        },
        approved_property_ids: state.approved_property_ids.clone(),
        phases: ReportPhases {
            research: state.research_results.clone(),
            filtered_research: state.filtered_research_results.clone(),
            calls: state.call_results.clone(),
            location: state.location_results.clone(),
        },
    }
}

/// Write the report as pretty JSON under `output_dir`, returning its path.
pub async fn write_report(output_dir: &Path, report: &UnifiedReport) -> Result<PathBuf, RealtyError> {
    let path = output_dir.join(UNIFIED_REPORT_FILE);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, serde_json::to_string_pretty(report)?).await?;
    Ok(path)
}
