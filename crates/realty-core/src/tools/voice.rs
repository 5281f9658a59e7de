//! Retell voice-call tools for the call agent crew.
//!
//! The inspector script books property viewings; the negotiator script
//! opens acquisition talks with an owner. Both are outbound calls placed
//! through Retell with per-call dynamic variables.
//!
//! API reference: https://docs.retellai.com/api-references/create-phone-call

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{optional_str, optional_u64, required_str, Tool, ToolResult};
use crate::config::VoiceSettings;
use crate::error::RealtyError;
use crate::models::call::{CallKind, CallRecord, CreatePhoneCall, PhoneCallHandle};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_WAIT_SECONDS: u64 = 300;

/// The two vendor operations the call tools need.
#[async_trait]
pub trait VoiceApi: Send + Sync {
    async fn create_phone_call(&self, request: &CreatePhoneCall)
        -> Result<PhoneCallHandle, RealtyError>;

    async fn retrieve_call(&self, call_id: &str) -> Result<CallRecord, RealtyError>;
}

/// reqwest-backed Retell client.
pub struct RetellClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl RetellClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RealtyError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RealtyError::Http(format!(
                "Retell API returned {}: {}",
                status, text
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| RealtyError::Parse(format!("Unexpected Retell response: {}", e)))
    }
}

#[async_trait]
impl VoiceApi for RetellClient {
    async fn create_phone_call(
        &self,
        request: &CreatePhoneCall,
    ) -> Result<PhoneCallHandle, RealtyError> {
        let url = format!("{}/v2/create-phone-call", self.base_url.trim_end_matches('/'));
        tracing::info!(
            "[Retell] Creating call to {} (agent: {})",
            request.to_number,
            request.override_agent_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn retrieve_call(&self, call_id: &str) -> Result<CallRecord, RealtyError> {
        let url = format!("{}/v2/get-call/{}", self.base_url.trim_end_matches('/'), call_id);
        let response = self.client.get(&url).bearer_auth(&self.api_key).send().await?;
        Self::read_json(response).await
    }
}

/// Arguments of an inspection (booking) call.
#[derive(Debug, Clone)]
pub struct InspectionCall {
    /// E.164, e.g. +15125550123
    pub to_number: String,
    pub property_id: String,
    pub property_address: String,
    pub property_price: String,
    /// Comma-separated questions for the agent to ask
    pub user_questions: String,
    pub contact_name: Option<String>,
}

impl InspectionCall {
    fn from_args(args: &serde_json::Value) -> Result<Self, ToolResult> {
        Ok(Self {
            to_number: required_str(args, "to_number")?,
            property_id: required_str(args, "property_id")?,
            property_address: required_str(args, "property_address")?,
            property_price: required_str(args, "property_price")?,
            user_questions: required_str(args, "user_questions")?,
            contact_name: optional_str(args, "contact_name"),
        })
    }
}

/// Arguments of an acquisition negotiation call.
#[derive(Debug, Clone)]
pub struct NegotiationCall {
    pub to_number: String,
    pub property_id: String,
    pub property_address: String,
    pub estimated_value: String,
    /// Range the investor is willing to pay
    pub investor_budget: String,
    pub contact_name: Option<String>,
}

impl NegotiationCall {
    fn from_args(args: &serde_json::Value) -> Result<Self, ToolResult> {
        Ok(Self {
            to_number: required_str(args, "to_number")?,
            property_id: required_str(args, "property_id")?,
            property_address: required_str(args, "property_address")?,
            estimated_value: required_str(args, "estimated_value")?,
            investor_budget: required_str(args, "investor_budget")?,
            contact_name: optional_str(args, "contact_name"),
        })
    }
}

/// The four call operations, sharing one vendor client.
pub struct VoiceCallTools {
    settings: VoiceSettings,
    api: Option<Arc<dyn VoiceApi>>,
    poll_interval: Duration,
}

impl VoiceCallTools {
    /// Build the tools with a Retell client when an API key is configured.
    pub fn from_settings(settings: &VoiceSettings) -> Self {
        let api = settings.api_key.as_ref().map(|key| {
            Arc::new(RetellClient::new(key.clone(), settings.base_url.clone())) as Arc<dyn VoiceApi>
        });
        Self {
            settings: settings.clone(),
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Build the tools around an arbitrary vendor implementation.
    pub fn with_api(settings: &VoiceSettings, api: Arc<dyn VoiceApi>) -> Self {
        Self {
            settings: settings.clone(),
            api: Some(api),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn api(&self) -> Result<&Arc<dyn VoiceApi>, String> {
        self.api
            .as_ref()
            .ok_or_else(|| "RETELL_API_KEY environment variable not set".to_string())
    }

    /// Call a listing agent to book a viewing and ask the user's questions.
    pub async fn make_inspection_call(&self, call: &InspectionCall) -> ToolResult {
        let mut variables = HashMap::new();
        variables.insert("property_address".to_string(), call.property_address.clone());
        variables.insert("property_price".to_string(), call.property_price.clone());
        variables.insert("user_questions".to_string(), call.user_questions.clone());
        variables.insert(
            "contact_name".to_string(),
            call.contact_name
                .clone()
                .unwrap_or_else(|| "the property agent".to_string()),
        );
        variables.insert("call_purpose".to_string(), "schedule_inspection".to_string());

        self.place_call(
            CallKind::Inspection,
            &call.to_number,
            &call.property_id,
            variables,
        )
        .await
    }

    /// Call an owner to gauge interest in selling.
    pub async fn make_negotiation_call(&self, call: &NegotiationCall) -> ToolResult {
        let mut variables = HashMap::new();
        variables.insert("property_address".to_string(), call.property_address.clone());
        variables.insert("estimated_value".to_string(), call.estimated_value.clone());
        variables.insert("investor_budget".to_string(), call.investor_budget.clone());
        variables.insert(
            "contact_name".to_string(),
            call.contact_name
                .clone()
                .unwrap_or_else(|| "the property owner".to_string()),
        );
        variables.insert(
            "call_purpose".to_string(),
            "acquisition_negotiation".to_string(),
        );

        self.place_call(
            CallKind::Negotiation,
            &call.to_number,
            &call.property_id,
            variables,
        )
        .await
    }

    async fn place_call(
        &self,
        kind: CallKind,
        to_number: &str,
        property_id: &str,
        variables: HashMap<String, String>,
    ) -> ToolResult {
        let failure = |msg: String| {
            ToolResult::error(msg)
                .with("property_id", property_id)
                .with("to_number", to_number)
        };

        let api = match self.api() {
            Ok(api) => api,
            Err(msg) => return failure(msg),
        };

        let Some(from_number) = self.settings.from_number.clone() else {
            return failure("RETELL_FROM_NUMBER environment variable not set".to_string());
        };

        let (agent_id, agent_var) = match kind {
            CallKind::Inspection => (
                self.settings.inspector_agent_id.clone(),
                "RETELL_INSPECTOR_AGENT_ID",
            ),
            CallKind::Negotiation => (
                self.settings.negotiator_agent_id.clone(),
                "RETELL_NEGOTIATOR_AGENT_ID",
            ),
        };
        let Some(agent_id) = agent_id else {
            return failure(format!("{} environment variable not set", agent_var));
        };

        let mut metadata = HashMap::new();
        metadata.insert("property_id".to_string(), property_id.to_string());
        metadata.insert("call_type".to_string(), kind.as_str().to_string());
        metadata.insert("flow_phase".to_string(), "engagement".to_string());

        let request = CreatePhoneCall {
            from_number,
            to_number: to_number.to_string(),
            override_agent_id: agent_id,
            retell_llm_dynamic_variables: variables,
            metadata,
        };

        match api.create_phone_call(&request).await {
            Ok(handle) => {
                tracing::info!(
                    "[VoiceTools] {} call {} placed for property {}",
                    kind.as_str(),
                    handle.call_id,
                    property_id
                );
                let message = match kind {
                    CallKind::Inspection => "Inspection call initiated successfully",
                    CallKind::Negotiation => "Negotiation call initiated successfully",
                };
                ToolResult::success()
                    .with("call_id", handle.call_id)
                    .with("call_status", handle.call_status.as_str())
                    .with("property_id", property_id)
                    .with("to_number", to_number)
                    .with("message", message)
            }
            Err(e) => {
                tracing::warn!(
                    "[VoiceTools] {} call for property {} failed: {}",
                    kind.as_str(),
                    property_id,
                    e
                );
                failure(e.to_string())
            }
        }
    }

    /// Wait for a call to reach a terminal status and return its transcript.
    pub async fn get_call_result(&self, call_id: &str, max_wait_seconds: u64) -> ToolResult {
        let failure = |msg: String| ToolResult::error(msg).with("call_id", call_id);

        let api = match self.api() {
            Ok(api) => api,
            Err(msg) => return failure(msg),
        };

        let started = tokio::time::Instant::now();
        let max_wait = Duration::from_secs(max_wait_seconds);

        let record = loop {
            let record = match api.retrieve_call(call_id).await {
                Ok(record) => record,
                Err(e) => return failure(e.to_string()),
            };

            if record.call_status.is_terminal() {
                break record;
            }

            if started.elapsed() >= max_wait {
                return failure(format!(
                    "Timeout waiting for call completion after {}s",
                    max_wait_seconds
                ))
                .with("last_status", record.call_status.as_str());
            }

            tracing::debug!(
                "[VoiceTools] Call {} is {}, polling again",
                call_id,
                record.call_status.as_str()
            );
            tokio::time::sleep(self.poll_interval).await;
        };

        ToolResult::success()
            .with("call_id", call_id)
            .with("call_status", record.call_status.as_str())
            .with("duration_seconds", record.duration_seconds())
            .with("transcript", record.formatted_transcript())
            .with("recording_url", record.recording_url.clone())
            .with("metadata", &record.metadata)
            .with("collected_variables", &record.collected_dynamic_variables)
            .with("disconnection_reason", record.disconnection_reason.clone())
    }

    /// Fetch the status of a call once, without waiting.
    pub async fn check_call_status(&self, call_id: &str) -> ToolResult {
        let failure = |msg: String| ToolResult::error(msg).with("call_id", call_id);

        let api = match self.api() {
            Ok(api) => api,
            Err(msg) => return failure(msg),
        };

        match api.retrieve_call(call_id).await {
            Ok(record) => {
                let status = record.call_status;
                ToolResult::success()
                    .with("call_id", call_id)
                    .with("call_status", status.as_str())
                    .with("in_progress", status.is_in_progress())
                    .with("completed", status == crate::models::CallStatus::Ended)
                    .with("failed", status.is_failed())
            }
            Err(e) => failure(e.to_string()),
        }
    }
}

// ─── Registry adapters ────────────────────────────────────────────────────

/// The four call operations as registry tools sharing one `VoiceCallTools`.
pub fn call_tools(voice: Arc<VoiceCallTools>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(MakeInspectionCallTool(voice.clone())),
        Arc::new(MakeNegotiationCallTool(voice.clone())),
        Arc::new(GetCallResultTool(voice.clone())),
        Arc::new(CheckCallStatusTool(voice)),
    ]
}

pub struct MakeInspectionCallTool(pub Arc<VoiceCallTools>);

#[async_trait]
impl Tool for MakeInspectionCallTool {
    fn name(&self) -> &str {
        "make_inspection_call"
    }

    fn description(&self) -> &str {
        "Call a property listing agent to schedule a viewing and ask the user's questions. \
         Returns a call_id to track with get_call_result."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "to_number": "phone number in E.164 format, e.g. +15125550123",
            "property_id": "property identifier",
            "property_address": "full address",
            "property_price": "listed price or rent",
            "user_questions": "comma-separated questions to ask",
            "contact_name": "(optional) name of the contact"
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> ToolResult {
        match InspectionCall::from_args(&args) {
            Ok(call) => self.0.make_inspection_call(&call).await,
            Err(err) => err,
        }
    }
}

pub struct MakeNegotiationCallTool(pub Arc<VoiceCallTools>);

#[async_trait]
impl Tool for MakeNegotiationCallTool {
    fn name(&self) -> &str {
        "make_negotiation_call"
    }

    fn description(&self) -> &str {
        "Call a property owner to discuss a possible acquisition. \
         Returns a call_id to track with get_call_result."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "to_number": "phone number in E.164 format",
            "property_id": "property identifier",
            "property_address": "full address",
            "estimated_value": "estimated market value",
            "investor_budget": "budget range the investor will pay",
            "contact_name": "(optional) name of the owner"
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> ToolResult {
        match NegotiationCall::from_args(&args) {
            Ok(call) => self.0.make_negotiation_call(&call).await,
            Err(err) => err,
        }
    }
}

pub struct GetCallResultTool(pub Arc<VoiceCallTools>);

#[async_trait]
impl Tool for GetCallResultTool {
    fn name(&self) -> &str {
        "get_call_result"
    }

    fn description(&self) -> &str {
        "Wait for a call to finish and return its transcript, duration, recording URL \
         and collected data."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "call_id": "id returned by make_inspection_call or make_negotiation_call",
            "max_wait_seconds": "(optional) how long to wait, default 300"
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> ToolResult {
        let call_id = match required_str(&args, "call_id") {
            Ok(id) => id,
            Err(err) => return err,
        };
        let max_wait = optional_u64(&args, "max_wait_seconds").unwrap_or(DEFAULT_MAX_WAIT_SECONDS);
        self.0.get_call_result(&call_id, max_wait).await
    }
}

pub struct CheckCallStatusTool(pub Arc<VoiceCallTools>);

#[async_trait]
impl Tool for CheckCallStatusTool {
    fn name(&self) -> &str {
        "check_call_status"
    }

    fn description(&self) -> &str {
        "Check whether a call is still in progress, completed or failed, without waiting."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({ "call_id": "call to check" })
    }

    async fn invoke(&self, args: serde_json::Value) -> ToolResult {
        match required_str(&args, "call_id") {
            Ok(call_id) => self.0.check_call_status(&call_id).await,
            Err(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::models::CallStatus;

    /// Scripted vendor: hands out queued call records, repeating the last one.
    #[derive(Default)]
    struct FakeVoiceApi {
        records: Mutex<VecDeque<serde_json::Value>>,
        created: Mutex<Vec<CreatePhoneCall>>,
        fail_create: bool,
        retrieves: Mutex<usize>,
    }

    impl FakeVoiceApi {
        fn with_records(records: Vec<serde_json::Value>) -> Self {
            Self {
                records: Mutex::new(records.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl VoiceApi for FakeVoiceApi {
        async fn create_phone_call(
            &self,
            request: &CreatePhoneCall,
        ) -> Result<PhoneCallHandle, RealtyError> {
            if self.fail_create {
                return Err(RealtyError::Http("Retell API returned 402: no credit".to_string()));
            }
            self.created.lock().unwrap().push(request.clone());
            Ok(PhoneCallHandle {
                call_id: "call_abc".to_string(),
                call_status: CallStatus::Registered,
            })
        }

        async fn retrieve_call(&self, _call_id: &str) -> Result<CallRecord, RealtyError> {
            *self.retrieves.lock().unwrap() += 1;
            let mut records = self.records.lock().unwrap();
            let value = if records.len() > 1 {
                records.pop_front().unwrap()
            } else {
                records.front().cloned().unwrap()
            };
            Ok(serde_json::from_value(value).unwrap())
        }
    }

    fn full_settings() -> VoiceSettings {
        VoiceSettings {
            api_key: Some("key".to_string()),
            from_number: Some("+15125550100".to_string()),
            inspector_agent_id: Some("agent_inspector".to_string()),
            negotiator_agent_id: Some("agent_negotiator".to_string()),
            ..VoiceSettings::default()
        }
    }

    fn inspection() -> InspectionCall {
        InspectionCall {
            to_number: "+15125550123".to_string(),
            property_id: "prop_001".to_string(),
            property_address: "12 Admiralty Way, Lekki".to_string(),
            property_price: "₦3,500,000 / year".to_string(),
            user_questions: "Is parking included?, Are pets allowed?".to_string(),
            contact_name: None,
        }
    }

    fn status_record(status: &str) -> serde_json::Value {
        serde_json::json!({ "call_id": "call_abc", "call_status": status })
    }

    #[tokio::test]
    async fn test_missing_api_key_is_failure_payload() {
        let tools = VoiceCallTools::from_settings(&VoiceSettings::default());
        let result = tools.make_inspection_call(&inspection()).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("RETELL_API_KEY"));
        assert_eq!(result.get_str("property_id"), Some("prop_001"));

        let result = tools.check_call_status("call_abc").await;
        assert!(!result.success);
        assert_eq!(result.get_str("call_id"), Some("call_abc"));
    }

    #[tokio::test]
    async fn test_missing_from_number_and_agent_id() {
        let api = Arc::new(FakeVoiceApi::default());
        let settings = VoiceSettings {
            from_number: None,
            ..full_settings()
        };
        let tools = VoiceCallTools::with_api(&settings, api.clone());
        let result = tools.make_inspection_call(&inspection()).await;
        assert!(result.error.as_deref().unwrap().contains("RETELL_FROM_NUMBER"));

        let settings = VoiceSettings {
            negotiator_agent_id: None,
            ..full_settings()
        };
        let tools = VoiceCallTools::with_api(&settings, api.clone());
        let result = tools
            .make_negotiation_call(&NegotiationCall {
                to_number: "+15125550123".to_string(),
                property_id: "prop_002".to_string(),
                property_address: "4 Bourdillon Rd".to_string(),
                estimated_value: "$450,000".to_string(),
                investor_budget: "$380k-$420k".to_string(),
                contact_name: Some("Mr. Ade".to_string()),
            })
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("RETELL_NEGOTIATOR_AGENT_ID"));
        assert!(api.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inspection_call_sends_dynamic_variables() {
        let api = Arc::new(FakeVoiceApi::default());
        let tools = VoiceCallTools::with_api(&full_settings(), api.clone());
        let result = tools.make_inspection_call(&inspection()).await;

        assert!(result.success);
        assert_eq!(result.get_str("call_id"), Some("call_abc"));
        assert_eq!(result.get_str("call_status"), Some("registered"));

        let created = api.created.lock().unwrap();
        let request = &created[0];
        assert_eq!(request.override_agent_id, "agent_inspector");
        assert_eq!(request.from_number, "+15125550100");
        assert_eq!(
            request.retell_llm_dynamic_variables["contact_name"],
            "the property agent"
        );
        assert_eq!(
            request.retell_llm_dynamic_variables["call_purpose"],
            "schedule_inspection"
        );
        assert_eq!(request.metadata["call_type"], "inspection");
        assert_eq!(request.metadata["flow_phase"], "engagement");
    }

    #[tokio::test]
    async fn test_negotiation_call_uses_negotiator_agent() {
        let api = Arc::new(FakeVoiceApi::default());
        let tools = VoiceCallTools::with_api(&full_settings(), api.clone());
        let result = tools
            .make_negotiation_call(&NegotiationCall {
                to_number: "+15125550123".to_string(),
                property_id: "prop_009".to_string(),
                property_address: "4 Bourdillon Rd".to_string(),
                estimated_value: "$450,000".to_string(),
                investor_budget: "$380k-$420k".to_string(),
                contact_name: None,
            })
            .await;
        assert!(result.success);
        let created = api.created.lock().unwrap();
        assert_eq!(created[0].override_agent_id, "agent_negotiator");
        assert_eq!(
            created[0].retell_llm_dynamic_variables["contact_name"],
            "the property owner"
        );
        assert_eq!(created[0].metadata["call_type"], "negotiation");
    }

    #[tokio::test]
    async fn test_vendor_error_becomes_failure_payload() {
        let api = Arc::new(FakeVoiceApi {
            fail_create: true,
            ..Default::default()
        });
        let tools = VoiceCallTools::with_api(&full_settings(), api);
        let result = tools.make_inspection_call(&inspection()).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("402"));
        assert_eq!(result.get_str("to_number"), Some("+15125550123"));
    }

    #[tokio::test]
    async fn test_get_call_result_waits_for_end() {
        let api = Arc::new(FakeVoiceApi::with_records(vec![
            status_record("registered"),
            status_record("ongoing"),
            serde_json::json!({
                "call_id": "call_abc",
                "call_status": "ended",
                "start_timestamp": 1_000,
                "end_timestamp": 63_000,
                "recording_url": "https://cdn.example.com/rec.wav",
                "disconnection_reason": "agent_hangup",
                "collected_dynamic_variables": { "inspection_date": "Saturday 10am" },
                "transcript_object": [
                    { "role": "agent", "content": "Hi, calling about the flat.", "timestamp": 0 },
                    { "role": "user", "content": "Sure.", "timestamp": 4_000 }
                ]
            }),
        ]));
        let tools = VoiceCallTools::with_api(&full_settings(), api.clone())
            .with_poll_interval(Duration::from_millis(1));

        let result = tools.get_call_result("call_abc", 60).await;
        assert!(result.success);
        assert_eq!(result.get_str("call_status"), Some("ended"));
        assert_eq!(result.get("duration_seconds"), Some(&serde_json::json!(62)));
        let transcript = result.get_str("transcript").unwrap();
        assert!(transcript.starts_with("[00:00] agent: Hi"));
        assert!(transcript.contains("[00:04] user: Sure."));
        assert_eq!(
            result.get("collected_variables").unwrap()["inspection_date"],
            "Saturday 10am"
        );
        assert_eq!(*api.retrieves.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_call_result_times_out() {
        let api = Arc::new(FakeVoiceApi::with_records(vec![status_record("ongoing")]));
        let tools = VoiceCallTools::with_api(&full_settings(), api)
            .with_poll_interval(Duration::from_millis(1));

        let result = tools.get_call_result("call_abc", 0).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("Timeout"));
        assert_eq!(result.get_str("last_status"), Some("ongoing"));
    }

    #[tokio::test]
    async fn test_check_call_status_flags() {
        let api = Arc::new(FakeVoiceApi::with_records(vec![status_record("failed")]));
        let tools = VoiceCallTools::with_api(&full_settings(), api);
        let result = tools.check_call_status("call_abc").await;
        assert!(result.success);
        assert_eq!(result.get("in_progress"), Some(&serde_json::json!(false)));
        assert_eq!(result.get("completed"), Some(&serde_json::json!(false)));
        assert_eq!(result.get("failed"), Some(&serde_json::json!(true)));
    }

    #[tokio::test]
    async fn test_tool_adapter_validates_arguments() {
        let api = Arc::new(FakeVoiceApi::default());
        let voice = Arc::new(VoiceCallTools::with_api(&full_settings(), api));
        let tools = call_tools(voice);
        let inspect = tools.iter().find(|t| t.name() == "make_inspection_call").unwrap();

        let result = inspect
            .invoke(serde_json::json!({ "to_number": "+15125550123" }))
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("property_id"));

        let result = inspect
            .invoke(serde_json::json!({
                "to_number": "+15125550123",
                "property_id": "prop_001",
                "property_address": "12 Admiralty Way",
                "property_price": 3500000
            }))
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("user_questions"));

        let result = inspect
            .invoke(serde_json::json!({
                "to_number": "+15125550123",
                "property_id": "prop_001",
                "property_address": "12 Admiralty Way",
                "property_price": 3500000,
                "user_questions": "Is parking included?"
            }))
            .await;
        assert!(result.success);
    }
}
