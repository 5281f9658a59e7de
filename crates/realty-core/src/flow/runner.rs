//! Flow driver: runs crews between state machine transitions, persists the
//! state after each one and prints progress for the person watching.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::gate::{ApprovalDecision, ApprovalGate};
use super::machine;
use super::report::{build_report, write_report, UNIFIED_REPORT_FILE};
use crate::crew::{CrewExecutor, CrewInputs, CrewLoader, CALL_AGENT, LOCATION_ANALYZER, RESEARCH};
use crate::error::RealtyError;
use crate::models::flow::{FlowPhase, FlowState};
use crate::models::report::UnifiedReport;
use crate::models::search::SearchCriteria;
use crate::store::FlowStore;

/// Runs a named crew and returns its final raw output.
#[async_trait]
pub trait CrewRunner: Send + Sync {
    async fn run_crew(&self, crew: &str, inputs: CrewInputs) -> Result<String, RealtyError>;
}

/// Crew runner backed by loaded crew definitions and a [`CrewExecutor`].
pub struct CrewSet {
    loader: CrewLoader,
    executor: CrewExecutor,
}

impl CrewSet {
    pub fn new(loader: CrewLoader, executor: CrewExecutor) -> Self {
        Self { loader, executor }
    }

    pub fn loader(&self) -> &CrewLoader {
        &self.loader
    }
}

#[async_trait]
impl CrewRunner for CrewSet {
    async fn run_crew(&self, crew: &str, inputs: CrewInputs) -> Result<String, RealtyError> {
        let definition = self.loader.require(crew)?;
        let output = self.executor.kickoff(definition, &inputs).await?;
        Ok(output.raw)
    }
}

/// Where a flow stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// Research is done and a human decision is needed.
    AwaitingApproval {
        flow_id: String,
        research_results: String,
    },
    Completed(UnifiedReport),
}

pub struct RealEstateFlow {
    id: String,
    state: FlowState,
    crews: Arc<dyn CrewRunner>,
    store: Option<FlowStore>,
    output_dir: PathBuf,
}

impl RealEstateFlow {
    pub fn new(crews: Arc<dyn CrewRunner>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: FlowState::new(),
            crews,
            store: None,
            output_dir: output_dir.into(),
        }
    }

    /// Persist state to `store` after every transition.
    pub fn with_store(mut self, store: FlowStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Reload a persisted flow so it can continue from where it stopped.
    pub async fn resume(
        flow_id: &str,
        crews: Arc<dyn CrewRunner>,
        store: FlowStore,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, RealtyError> {
        let record = store
            .get(flow_id)
            .await?
            .ok_or_else(|| RealtyError::NotFound(format!("Flow '{}' not found", flow_id)))?;
        tracing::info!("[Flow] Resuming {} in phase {}", record.id, record.phase);
        Ok(Self {
            id: record.id,
            state: record.state,
            crews,
            store: Some(store),
            output_dir: output_dir.into(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn phase(&self) -> FlowPhase {
        self.state.phase
    }

    pub fn plot() -> String {
        machine::plot()
    }

    /// The pending approval, if the flow is paused at the gate.
    pub fn pending_approval(&self) -> Option<FlowOutcome> {
        (self.state.phase == FlowPhase::AwaitingApproval).then(|| self.awaiting())
    }

    /// Initialize and research, stopping at the approval gate.
    pub async fn start(&mut self, criteria: SearchCriteria) -> Result<FlowOutcome, RealtyError> {
        println!("🏠 AI Real Estate Agent");
        self.initialize_search(criteria).await?;
        self.run_research().await?;
        Ok(self.awaiting())
    }

    /// Apply a human decision at the approval gate.
    pub async fn submit_decision(
        &mut self,
        decision: ApprovalDecision,
    ) -> Result<FlowOutcome, RealtyError> {
        match decision {
            ApprovalDecision::Retry => {
                self.handle_retry().await?;
                self.run_research().await?;
                Ok(self.awaiting())
            }
            ApprovalDecision::Approved(ids) => {
                self.filter_approved(&ids).await?;
                self.run_parallel_crews().await?;
                let report = self.compile_final_report().await?;
                Ok(FlowOutcome::Completed(report))
            }
        }
    }

    /// Drive the flow to completion, asking `gate` at every approval point.
    pub async fn run_to_completion(
        &mut self,
        criteria: SearchCriteria,
        gate: &dyn ApprovalGate,
    ) -> Result<UnifiedReport, RealtyError> {
        let outcome = self.start(criteria).await?;
        self.continue_with(outcome, gate).await
    }

    /// Keep asking `gate` until the flow completes.
    pub async fn continue_with(
        &mut self,
        mut outcome: FlowOutcome,
        gate: &dyn ApprovalGate,
    ) -> Result<UnifiedReport, RealtyError> {
        loop {
            match outcome {
                FlowOutcome::Completed(report) => return Ok(report),
                FlowOutcome::AwaitingApproval {
                    flow_id,
                    research_results,
                } => {
                    let decision = gate.review(&flow_id, &research_results).await?;
                    outcome = self.submit_decision(decision).await?;
                }
            }
        }
    }

    pub async fn initialize_search(&mut self, criteria: SearchCriteria) -> Result<(), RealtyError> {
        machine::initialize_search(&mut self.state, criteria)?;
        tracing::info!("[Flow] {} initialized", self.id);
        self.persist().await
    }

    pub async fn run_research(&mut self) -> Result<(), RealtyError> {
        machine::expect_phase(&self.state, FlowPhase::Researching, "run_research")?;
        let query = self
            .state
            .search_criteria
            .as_ref()
            .map(SearchCriteria::search_query)
            .unwrap_or_default();
        println!("🔍 Searching: {}", query);

        let mut inputs = CrewInputs::new();
        inputs.insert("search_criteria".to_string(), query);
        let raw = self.crews.run_crew(RESEARCH, inputs).await?;

        machine::record_research(&mut self.state, raw)?;
        println!("✅ Found {} properties", self.state.properties_found);
        self.persist().await
    }

    pub async fn filter_approved(&mut self, ids: &[String]) -> Result<(), RealtyError> {
        machine::filter_approved(&mut self.state, ids)?;
        println!("✅ {} properties approved", self.state.properties_approved);
        self.persist().await
    }

    pub async fn handle_retry(&mut self) -> Result<(), RealtyError> {
        machine::handle_retry(&mut self.state)?;
        println!("🔄 Retry #{}: re-running research...", self.state.retry_count);
        self.persist().await
    }

    /// Run the call and location crews side by side over the approved
    /// listings. Either failure aborts without recording partial results.
    pub async fn run_parallel_crews(&mut self) -> Result<(), RealtyError> {
        machine::expect_phase(&self.state, FlowPhase::RunningParallel, "run_parallel_crews")?;

        if self.state.properties_approved == 0 {
            println!("⚠️ No properties approved, skipping.");
            tracing::warn!("[Flow] {} has no approved properties, skipping call and location crews", self.id);
            machine::record_parallel_results(&mut self.state, None, None)?;
            return self.persist().await;
        }

        println!("🚀 Running Call Agent & Location Analyzer in parallel...");
        let mut inputs = CrewInputs::new();
        inputs.insert(
            "research_results".to_string(),
            self.state.filtered_research_results.clone().unwrap_or_default(),
        );

        let (calls, location) = tokio::try_join!(
            self.crews.run_crew(CALL_AGENT, inputs.clone()),
            self.crews.run_crew(LOCATION_ANALYZER, inputs),
        )?;
        println!("✅ Both crews completed");

        machine::record_parallel_results(&mut self.state, Some(calls), Some(location))?;
        self.persist().await
    }

    pub async fn compile_final_report(&mut self) -> Result<UnifiedReport, RealtyError> {
        machine::expect_phase(&self.state, FlowPhase::Reporting, "compile_final_report")?;
        let report = build_report(&self.id, &self.state);
        let path = write_report(&self.output_dir, &report).await?;
        tracing::info!("[Flow] Report written to {}", path.display());
        println!("📋 Final report saved to {}", UNIFIED_REPORT_FILE);

        machine::complete(&mut self.state)?;
        self.persist().await?;
        println!("✅ Flow Complete");
        Ok(report)
    }

    fn awaiting(&self) -> FlowOutcome {
        FlowOutcome::AwaitingApproval {
            flow_id: self.id.clone(),
            research_results: self.state.research_results.clone().unwrap_or_default(),
        }
    }

    async fn persist(&self) -> Result<(), RealtyError> {
        if let Some(store) = &self.store {
            store.save(&self.id, &self.state).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::db::Database;
    use crate::flow::gate::ScriptedGate;

    const RESEARCH_JSON: &str = r#"{"properties": [{"id": "prop_001", "price": 1200}, {"id": "prop_002", "price": 900}]}"#;

    /// Crew runner with canned research outputs that records every call.
    #[derive(Default)]
    struct FakeCrews {
        research: Mutex<VecDeque<String>>,
        fail_location: bool,
        calls: Mutex<Vec<(String, CrewInputs)>>,
    }

    impl FakeCrews {
        fn new(research: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                research: Mutex::new(research.iter().map(|s| s.to_string()).collect()),
                ..Self::default()
            })
        }

        fn failing_location(research: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                research: Mutex::new(research.iter().map(|s| s.to_string()).collect()),
                fail_location: true,
                ..Self::default()
            })
        }

        fn invoked(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
        }

        fn inputs_for(&self, crew: &str) -> CrewInputs {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(c, _)| c == crew)
                .map(|(_, i)| i.clone())
                .unwrap()
        }
    }

    #[async_trait]
    impl CrewRunner for FakeCrews {
        async fn run_crew(&self, crew: &str, inputs: CrewInputs) -> Result<String, RealtyError> {
            self.calls.lock().unwrap().push((crew.to_string(), inputs));
            match crew {
                RESEARCH => Ok(self
                    .research
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| RESEARCH_JSON.to_string())),
                CALL_AGENT => Ok(r#"{"calls": [{"property_id": "prop_001", "outcome": "scheduled"}]}"#.to_string()),
                LOCATION_ANALYZER if self.fail_location => {
                    Err(RealtyError::Crew("location crew exploded".to_string()))
                }
                LOCATION_ANALYZER => Ok(r#"{"locations": []}"#.to_string()),
                other => Err(RealtyError::NotFound(other.to_string())),
            }
        }
    }

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            bedrooms: Some(2),
            ..SearchCriteria::new("Lekki, Lagos")
        }
    }

    fn approve(ids: &[&str]) -> ApprovalDecision {
        ApprovalDecision::Approved(ids.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_start_pauses_at_approval() {
        let crews = FakeCrews::new(&[RESEARCH_JSON]);
        let dir = tempfile::tempdir().unwrap();
        let mut flow = RealEstateFlow::new(crews.clone(), dir.path());

        let outcome = flow.start(criteria()).await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::AwaitingApproval {
                flow_id: flow.id().to_string(),
                research_results: RESEARCH_JSON.to_string(),
            }
        );
        assert_eq!(flow.state().properties_found, 2);
        assert_eq!(flow.phase(), FlowPhase::AwaitingApproval);
        assert_eq!(
            crews.inputs_for(RESEARCH)["search_criteria"],
            "2 bedroom apartment in Lekki, Lagos (monthly rent)"
        );
    }

    #[tokio::test]
    async fn test_approval_runs_both_crews_on_filtered_results() {
        let crews = FakeCrews::new(&[RESEARCH_JSON]);
        let dir = tempfile::tempdir().unwrap();
        let mut flow = RealEstateFlow::new(crews.clone(), dir.path());
        flow.start(criteria()).await.unwrap();

        let outcome = flow.submit_decision(approve(&["prop_001"])).await.unwrap();
        let FlowOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.summary.properties_approved, 1);
        assert_eq!(report.approved_property_ids, vec!["prop_001"]);
        assert!(report.phases.calls.is_some());
        assert!(report.phases.location.is_some());
        assert_eq!(flow.phase(), FlowPhase::Completed);

        let filtered = &crews.inputs_for(CALL_AGENT)["research_results"];
        assert!(filtered.contains("prop_001"));
        assert!(!filtered.contains("prop_002"));
        assert_eq!(crews.inputs_for(LOCATION_ANALYZER)["research_results"], *filtered);

        let written = std::fs::read_to_string(dir.path().join(UNIFIED_REPORT_FILE)).unwrap();
        let written: UnifiedReport = serde_json::from_str(&written).unwrap();
        assert_eq!(written.flow_id, flow.id());
    }

    #[tokio::test]
    async fn test_retry_reruns_research() {
        let crews = FakeCrews::new(&[r#"{"properties": [{"id": "prop_009"}]}"#, RESEARCH_JSON]);
        let dir = tempfile::tempdir().unwrap();
        let mut flow = RealEstateFlow::new(crews.clone(), dir.path());
        flow.start(criteria()).await.unwrap();
        assert_eq!(flow.state().properties_found, 1);

        let outcome = flow.submit_decision(ApprovalDecision::Retry).await.unwrap();
        assert!(matches!(outcome, FlowOutcome::AwaitingApproval { .. }));
        assert_eq!(flow.state().retry_count, 1);
        assert_eq!(flow.state().properties_found, 2);
        assert_eq!(flow.state().properties_approved, 0);
        assert_eq!(crews.invoked(), vec![RESEARCH, RESEARCH]);
    }

    #[tokio::test]
    async fn test_zero_approved_skips_both_crews() {
        let crews = FakeCrews::new(&[RESEARCH_JSON]);
        let dir = tempfile::tempdir().unwrap();
        let mut flow = RealEstateFlow::new(crews.clone(), dir.path());
        flow.start(criteria()).await.unwrap();

        let outcome = flow.submit_decision(approve(&["prop_404"])).await.unwrap();
        assert!(matches!(outcome, FlowOutcome::Completed(_)));
        assert_eq!(crews.invoked(), vec![RESEARCH]);
        assert!(flow.state().call_results.is_none());
        assert!(flow.state().location_results.is_none());
        assert!(dir.path().join(UNIFIED_REPORT_FILE).exists());
    }

    #[tokio::test]
    async fn test_malformed_research_does_not_abort() {
        let crews = FakeCrews::new(&["Sorry, the listing site was down."]);
        let dir = tempfile::tempdir().unwrap();
        let mut flow = RealEstateFlow::new(crews.clone(), dir.path());
        flow.start(criteria()).await.unwrap();
        assert_eq!(flow.state().properties_found, 0);

        flow.submit_decision(approve(&["prop_001"])).await.unwrap();
        assert_eq!(
            flow.state().filtered_research_results.as_deref(),
            Some("Sorry, the listing site was down.")
        );
        assert_eq!(flow.state().properties_approved, 0);
        assert_eq!(crews.invoked(), vec![RESEARCH]);
    }

    #[tokio::test]
    async fn test_crew_failure_aborts_without_report() {
        let crews = FakeCrews::failing_location(&[RESEARCH_JSON]);
        let dir = tempfile::tempdir().unwrap();
        let mut flow = RealEstateFlow::new(crews, dir.path());
        flow.start(criteria()).await.unwrap();

        let err = flow.submit_decision(approve(&["prop_002"])).await.unwrap_err();
        assert!(err.to_string().contains("location crew exploded"));
        assert!(flow.state().call_results.is_none());
        assert_eq!(flow.phase(), FlowPhase::RunningParallel);
        assert!(!dir.path().join(UNIFIED_REPORT_FILE).exists());
    }

    #[tokio::test]
    async fn test_decision_before_start_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut flow = RealEstateFlow::new(FakeCrews::new(&[]), dir.path());
        let err = flow.submit_decision(ApprovalDecision::Retry).await.unwrap_err();
        assert!(matches!(err, RealtyError::InvalidTransition { action: "handle_retry", .. }));
        assert!(flow.run_research().await.is_err());
        assert!(flow.pending_approval().is_none());
    }

    #[tokio::test]
    async fn test_run_to_completion_with_gate() {
        let crews = FakeCrews::new(&[RESEARCH_JSON, RESEARCH_JSON]);
        let dir = tempfile::tempdir().unwrap();
        let mut flow = RealEstateFlow::new(crews.clone(), dir.path());
        let gate = ScriptedGate::new(["retry", "['prop_002']"]);

        let report = flow.run_to_completion(criteria(), &gate).await.unwrap();
        assert_eq!(report.summary.retries, 1);
        assert_eq!(report.approved_property_ids, vec!["prop_002"]);
        assert_eq!(crews.invoked().len(), 4);
    }

    #[tokio::test]
    async fn test_state_survives_resume() {
        let store = FlowStore::new(Database::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let crews = FakeCrews::new(&[RESEARCH_JSON]);

        let mut flow = RealEstateFlow::new(crews.clone(), dir.path()).with_store(store.clone());
        flow.start(criteria()).await.unwrap();
        let id = flow.id().to_string();
        let saved = store.get(&id).await.unwrap().unwrap();
        assert_eq!(saved.phase, FlowPhase::AwaitingApproval);
        assert_eq!(&saved.state, flow.state());
        drop(flow);

        let mut resumed = RealEstateFlow::resume(&id, crews, store.clone(), dir.path())
            .await
            .unwrap();
        assert!(resumed.pending_approval().is_some());
        resumed.submit_decision(approve(&["prop_001"])).await.unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.phase, FlowPhase::Completed);
        assert_eq!(record.state.approved_property_ids, vec!["prop_001"]);
    }

    #[tokio::test]
    async fn test_resume_unknown_flow() {
        let store = FlowStore::new(Database::open_in_memory().unwrap());
        let result = RealEstateFlow::resume("nope", FakeCrews::new(&[]), store, ".").await;
        assert!(matches!(result, Err(RealtyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_crew_set_runs_definitions_through_executor() {
        use crate::config::Settings;
        use crate::crew::CrewDefinition;
        use crate::testing::FnModel;
        use crate::tools::ToolRegistry;

        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            output_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let mut loader = CrewLoader::new();
        loader.insert(
            CrewDefinition::from_yaml(
                r#"
name: research
agents:
  scout:
    role: "Listing scout"
    goal: "Find listings"
tasks:
  - name: find
    agent: scout
    description: "Find ${inputs.search_criteria}"
"#,
            )
            .unwrap(),
        );
        let model = FnModel::new(|_| {
            Ok(r#"Final Answer: {"properties": [{"id": "prop_001"}]}"#.to_string())
        });
        let executor = CrewExecutor::new(model.clone(), ToolRegistry::new(), &settings)
            .with_retry_backoff(std::time::Duration::ZERO);
        let crews = Arc::new(CrewSet::new(loader, executor));

        let mut flow = RealEstateFlow::new(crews, dir.path());
        flow.start(criteria()).await.unwrap();
        assert_eq!(flow.state().properties_found, 1);
        assert_eq!(model.calls(), 1);
        assert!(crate::testing::task_prompt(&model.requests.lock().unwrap()[0])
            .contains("Find 2 bedroom apartment in Lekki, Lagos"));
    }
}
