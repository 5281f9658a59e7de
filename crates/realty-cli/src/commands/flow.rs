//! `realty flow`: run, resume and inspect real estate flows.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use console::style;
use dialoguer::Input;

use realty_core::crew::template::parse_json_output;
use realty_core::flow::{
    ApprovalDecision, ApprovalGate, CrewRunner, FlowOutcome, RealEstateFlow, ScriptedGate,
    APPROVAL_PROMPT, UNIFIED_REPORT_FILE,
};
use realty_core::models::{FlowPhase, SearchCriteria, UnifiedReport};
use realty_core::store::FlowStore;
use realty_core::RealtyError;

use super::{print_json, truncate};

/// How approval decisions are collected.
pub enum Review {
    /// Ask on the terminal.
    Interactive,
    /// Replay the given feedback strings in order.
    Scripted(Vec<String>),
    /// Stop at the first approval point and leave the flow for `resume`.
    Detach,
}

impl Review {
    pub fn from_args(feedback: Vec<String>, detach: bool) -> Self {
        if detach {
            Review::Detach
        } else if feedback.is_empty() {
            Review::Interactive
        } else {
            Review::Scripted(feedback)
        }
    }
}

/// Approval gate reading feedback from the terminal.
pub struct TerminalGate;

#[async_trait]
impl ApprovalGate for TerminalGate {
    async fn review(
        &self,
        flow_id: &str,
        research_results: &str,
    ) -> Result<ApprovalDecision, RealtyError> {
        println!();
        println!("{} {}", style("Research results for flow").bold(), style(flow_id).cyan());
        match parse_json_output(research_results) {
            Some(value) => print_json(&value),
            None => println!("{}", research_results),
        }
        println!();

        let feedback = tokio::task::spawn_blocking(|| {
            Input::<String>::new()
                .with_prompt(APPROVAL_PROMPT)
                .allow_empty(true)
                .interact_text()
        })
        .await
        .map_err(|e| RealtyError::Io(format!("Prompt task failed: {}", e)))?
        .map_err(|e| RealtyError::Io(format!("Failed to read feedback: {}", e)))?;

        Ok(realty_core::flow::parse_feedback(&feedback))
    }
}

/// Start a new flow.
pub async fn run(
    crews: Arc<dyn CrewRunner>,
    store: FlowStore,
    output_dir: &Path,
    criteria: SearchCriteria,
    review: Review,
) -> Result<(), String> {
    let mut flow = RealEstateFlow::new(crews, output_dir).with_store(store);
    println!("Flow ID: {}", style(flow.id()).cyan());

    let outcome = flow.start(criteria).await.map_err(|e| e.to_string())?;
    drive(&mut flow, outcome, review, output_dir).await
}

/// Continue a flow paused at the approval gate.
pub async fn resume(
    crews: Arc<dyn CrewRunner>,
    store: FlowStore,
    output_dir: &Path,
    flow_id: &str,
    review: Review,
) -> Result<(), String> {
    let mut flow = RealEstateFlow::resume(flow_id, crews, store, output_dir)
        .await
        .map_err(|e| e.to_string())?;

    let outcome = flow.pending_approval().ok_or_else(|| {
        if flow.phase().is_terminal() {
            format!("Flow '{}' is already completed", flow_id)
        } else {
            format!(
                "Flow '{}' is {} and cannot be resumed (only flows awaiting approval can)",
                flow_id,
                flow.phase()
            )
        }
    })?;
    drive(&mut flow, outcome, review, output_dir).await
}

async fn drive(
    flow: &mut RealEstateFlow,
    outcome: FlowOutcome,
    review: Review,
    output_dir: &Path,
) -> Result<(), String> {
    let report = match review {
        Review::Detach => {
            println!();
            println!(
                "⏸️  Flow {} is awaiting approval. Continue with: realty flow resume {}",
                flow.id(),
                flow.id()
            );
            return Ok(());
        }
        Review::Interactive => flow.continue_with(outcome, &TerminalGate).await,
        Review::Scripted(feedback) => flow.continue_with(outcome, &ScriptedGate::new(feedback)).await,
    }
    .map_err(|e| e.to_string())?;

    print_summary(&report, output_dir);
    Ok(())
}

fn print_summary(report: &UnifiedReport, output_dir: &Path) {
    println!();
    println!("{}", style("Summary").bold());
    println!("  Properties found:    {}", report.summary.properties_found);
    println!("  Properties approved: {}", report.summary.properties_approved);
    println!("  Retries:             {}", report.summary.retries);
    if !report.approved_property_ids.is_empty() {
        println!("  Approved IDs:        {}", report.approved_property_ids.join(", "));
    }
    println!("  Report:              {}", output_dir.join(UNIFIED_REPORT_FILE).display());
}

/// List stored flows, optionally filtered by phase.
pub async fn list(store: &FlowStore, phase: Option<&str>) -> Result<(), String> {
    let records = match phase {
        Some(name) => {
            let phase = FlowPhase::from_str(name).ok_or_else(|| {
                format!(
                    "Invalid phase: {}. Use pending, researching, awaiting_approval, running_parallel, reporting or completed",
                    name
                )
            })?;
            store.list_by_phase(phase).await
        }
        None => store.list().await,
    }
    .map_err(|e| e.to_string())?;

    if records.is_empty() {
        println!("No flows found.");
        return Ok(());
    }

    println!("┌──────────────────────────────────────┬───────────────────┬───────┬──────────┬──────────────────────┐");
    println!("│ ID                                   │ Phase             │ Found │ Approved │ Location             │");
    println!("├──────────────────────────────────────┼───────────────────┼───────┼──────────┼──────────────────────┤");
    for record in &records {
        let location = record
            .state
            .search_criteria
            .as_ref()
            .map(|c| c.location.as_str())
            .unwrap_or("-");
        println!(
            "│ {:<36} │ {:<17} │ {:>5} │ {:>8} │ {:<20} │",
            truncate(&record.id, 36),
            record.phase.as_str(),
            record.state.properties_found,
            record.state.properties_approved,
            truncate(location, 20)
        );
    }
    println!("└──────────────────────────────────────┴───────────────────┴───────┴──────────┴──────────────────────┘");
    Ok(())
}

/// Print one stored flow as JSON.
pub async fn show(store: &FlowStore, flow_id: &str) -> Result<(), String> {
    let record = store
        .get(flow_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Flow '{}' not found", flow_id))?;
    let value = serde_json::to_value(&record).map_err(|e| e.to_string())?;
    print_json(&value);
    Ok(())
}

pub async fn delete(store: &FlowStore, flow_id: &str) -> Result<(), String> {
    if store.delete(flow_id).await.map_err(|e| e.to_string())? {
        println!("🗑️  Deleted flow {}", flow_id);
        Ok(())
    } else {
        Err(format!("Flow '{}' not found", flow_id))
    }
}

pub fn plot() -> Result<(), String> {
    print!("{}", RealEstateFlow::plot());
    Ok(())
}
