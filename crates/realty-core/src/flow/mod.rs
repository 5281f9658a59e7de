//! Real estate flow: research, human approval, parallel call and location
//! crews, then a unified report.
//!
//! `machine` holds the transitions as plain functions over [`FlowState`];
//! `runner` wraps them with crew calls, persistence and progress output.
//!
//! [`FlowState`]: crate::models::FlowState

pub mod gate;
pub mod machine;
pub mod report;
pub mod runner;

pub use gate::{parse_feedback, ApprovalDecision, ApprovalGate, ScriptedGate, APPROVAL_PROMPT};
pub use report::{build_report, write_report, UNIFIED_REPORT_FILE};
pub use runner::{CrewRunner, CrewSet, FlowOutcome, RealEstateFlow};
