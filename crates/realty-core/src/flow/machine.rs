//! Flow state machine: phase checks and the pure state updates behind each
//! transition. Crew calls and persistence live in the runner.
//!
//! ```text
//! pending ──initialize_search──► researching ──run_research──► awaiting_approval
//!                                    ▲                              │      │
//!                                    └──────────handle_retry────────┘      │
//!                                                                  filter_approved
//!                                                                          ▼
//! completed ◄──compile_final_report── reporting ◄──run_parallel_crews── running_parallel
//! ```

use crate::crew::template::parse_json_output;
use crate::error::RealtyError;
use crate::models::flow::{FlowPhase, FlowState};
use crate::models::search::SearchCriteria;

/// Every legal transition as (from, action, to).
pub const TRANSITIONS: [(FlowPhase, &str, FlowPhase); 6] = [
    (FlowPhase::Pending, "initialize_search", FlowPhase::Researching),
    (FlowPhase::Researching, "run_research", FlowPhase::AwaitingApproval),
    (FlowPhase::AwaitingApproval, "filter_approved", FlowPhase::RunningParallel),
    (FlowPhase::AwaitingApproval, "handle_retry", FlowPhase::Researching),
    (FlowPhase::RunningParallel, "run_parallel_crews", FlowPhase::Reporting),
    (FlowPhase::Reporting, "compile_final_report", FlowPhase::Completed),
];

/// Fail unless the flow is in `phase`.
pub fn expect_phase(
    state: &FlowState,
    phase: FlowPhase,
    action: &'static str,
) -> Result<(), RealtyError> {
    if state.phase == phase {
        Ok(())
    } else {
        Err(RealtyError::InvalidTransition {
            action,
            phase: state.phase,
        })
    }
}

pub fn initialize_search(state: &mut FlowState, criteria: SearchCriteria) -> Result<(), RealtyError> {
    expect_phase(state, FlowPhase::Pending, "initialize_search")?;
    criteria.validate()?;
    state.search_criteria = Some(criteria);
    state.properties_found = 0;
    state.properties_approved = 0;
    state.retry_count = 0;
    state.phase = FlowPhase::Researching;
    Ok(())
}

/// Store raw research output and count its listings. Unparseable output
/// keeps the previous count.
pub fn record_research(state: &mut FlowState, raw: String) -> Result<(), RealtyError> {
    expect_phase(state, FlowPhase::Researching, "run_research")?;
    match ListingDocument::parse(&raw) {
        Some(doc) => state.properties_found = doc.listings().len(),
        None => tracing::warn!(
            "[Flow] Research output has no properties/listings list, keeping found count at {}",
            state.properties_found
        ),
    }
    state.research_results = Some(raw);
    state.phase = FlowPhase::AwaitingApproval;
    Ok(())
}

/// Keep only the approved listings.
///
/// Approved ids become the requested ids actually present, in the order the
/// human gave them; the approved count is the number of listings kept. If
/// the research output cannot be parsed the filtered results fall back to
/// the raw output, no ids are kept and the approved count stays put.
pub fn filter_approved(state: &mut FlowState, requested: &[String]) -> Result<(), RealtyError> {
    expect_phase(state, FlowPhase::AwaitingApproval, "filter_approved")?;
    let raw = state.research_results.clone().unwrap_or_default();

    match ListingDocument::parse(&raw) {
        Some(mut doc) => {
            let present: Vec<String> = doc.listings().iter().filter_map(listing_id).collect();
            let mut approved: Vec<String> = Vec::new();
            for id in requested {
                if present.contains(id) && !approved.contains(id) {
                    approved.push(id.clone());
                }
            }
            doc.retain(|listing| listing_id(listing).is_some_and(|id| approved.contains(&id)));

            state.properties_approved = doc.listings().len();
            state.approved_property_ids = approved;
            state.filtered_research_results = Some(doc.to_json_string());
        }
        None => {
            tracing::warn!("[Flow] Could not parse research output, passing it through unfiltered");
            state.approved_property_ids = Vec::new();
            state.filtered_research_results = Some(raw);
        }
    }

    state.phase = FlowPhase::RunningParallel;
    Ok(())
}

pub fn handle_retry(state: &mut FlowState) -> Result<(), RealtyError> {
    expect_phase(state, FlowPhase::AwaitingApproval, "handle_retry")?;
    state.retry_count += 1;
    state.phase = FlowPhase::Researching;
    Ok(())
}

pub fn record_parallel_results(
    state: &mut FlowState,
    call_results: Option<String>,
    location_results: Option<String>,
) -> Result<(), RealtyError> {
    expect_phase(state, FlowPhase::RunningParallel, "run_parallel_crews")?;
    state.call_results = call_results;
    state.location_results = location_results;
    state.phase = FlowPhase::Reporting;
    Ok(())
}

pub fn complete(state: &mut FlowState) -> Result<(), RealtyError> {
    expect_phase(state, FlowPhase::Reporting, "compile_final_report")?;
    state.phase = FlowPhase::Completed;
    Ok(())
}

/// Render the state machine as text.
pub fn plot() -> String {
    let mut out = String::from("RealEstateFlow\n");
    for (from, action, to) in TRANSITIONS {
        out.push_str(&format!("  {:<18} --{}--> {}\n", from.as_str(), action, to.as_str()));
    }
    out
}

/// Research output in one of the shapes the research crew produces.
#[derive(Debug)]
enum ListingDocument {
    /// `{"properties": [...], ...}` or `{"listings": [...], ...}`
    Keyed {
        doc: serde_json::Map<String, serde_json::Value>,
        key: &'static str,
    },
    /// A bare array of listings
    Bare(Vec<serde_json::Value>),
}

impl ListingDocument {
    fn parse(raw: &str) -> Option<Self> {
        match parse_json_output(raw)? {
            serde_json::Value::Object(doc) => {
                let key = ["properties", "listings"]
                    .into_iter()
                    .find(|k| doc.get(*k).is_some_and(|v| v.is_array()))?;
                Some(ListingDocument::Keyed { doc, key })
            }
            serde_json::Value::Array(items) => Some(ListingDocument::Bare(items)),
            _ => None,
        }
    }

    fn listings(&self) -> &[serde_json::Value] {
        match self {
            ListingDocument::Keyed { doc, key } => doc
                .get(*key)
                .and_then(|v| v.as_array())
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            ListingDocument::Bare(items) => items,
        }
    }

    fn retain(&mut self, keep: impl Fn(&serde_json::Value) -> bool) {
        match self {
            ListingDocument::Keyed { doc, key } => {
                if let Some(serde_json::Value::Array(items)) = doc.get_mut(*key) {
                    items.retain(|item| keep(item));
                }
            }
            ListingDocument::Bare(items) => items.retain(|item| keep(item)),
        }
    }

    fn to_json_string(&self) -> String {
        let result = match self {
            ListingDocument::Keyed { doc, .. } => serde_json::to_string(doc),
            ListingDocument::Bare(items) => serde_json::to_string(items),
        };
        result.unwrap_or_default()
    }
}

/// A listing's `id`, accepting numeric ids too.
fn listing_id(listing: &serde_json::Value) -> Option<String> {
    match listing.get("id")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
