use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Lifecycle of a vendor phone call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Registered,
    Ongoing,
    Ended,
    Error,
    Failed,
    #[serde(other)]
    Unknown,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Registered => "registered",
            CallStatus::Ongoing => "ongoing",
            CallStatus::Ended => "ended",
            CallStatus::Error => "error",
            CallStatus::Failed => "failed",
            CallStatus::Unknown => "unknown",
        }
    }

    /// No further status changes will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Error | CallStatus::Failed)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, CallStatus::Registered | CallStatus::Ongoing)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CallStatus::Error | CallStatus::Failed)
    }
}

/// Which vendor agent script a call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Inspection,
    Negotiation,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Inspection => "inspection",
            CallKind::Negotiation => "negotiation",
        }
    }
}

/// Body of a create-phone-call request.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePhoneCall {
    pub from_number: String,
    pub to_number: String,
    pub override_agent_id: String,
    pub retell_llm_dynamic_variables: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
}

/// Vendor acknowledgement of a newly placed call.
#[derive(Debug, Clone, Deserialize)]
pub struct PhoneCallHandle {
    pub call_id: String,
    pub call_status: CallStatus,
}

/// One word inside an utterance, with offsets in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptWord {
    #[serde(default)]
    pub start: Option<f64>,
}

/// One speaker turn of a call transcript.
#[derive(Debug, Clone, Deserialize)]
pub struct Utterance {
    #[serde(default = "unknown_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
    /// Offset from call start in milliseconds
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

fn unknown_role() -> String {
    "unknown".to_string()
}

impl Utterance {
    /// Offset of this utterance in milliseconds: the explicit timestamp when
    /// present, else the first word's start.
    pub fn offset_ms(&self) -> f64 {
        self.timestamp
            .or_else(|| self.words.first().and_then(|w| w.start).map(|s| s * 1000.0))
            .unwrap_or(0.0)
    }

    /// `[mm:ss] speaker: text`
    pub fn format_line(&self) -> String {
        let ms = self.offset_ms().max(0.0) as u64;
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("[{:02}:{:02}] {}: {}", minutes, seconds, self.role, self.content)
    }
}

/// A call as returned by the vendor's retrieve endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub call_status: CallStatus,
    #[serde(default)]
    pub transcript_object: Vec<Utterance>,
    /// Epoch milliseconds
    #[serde(default)]
    pub start_timestamp: Option<i64>,
    /// Epoch milliseconds
    #[serde(default)]
    pub end_timestamp: Option<i64>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub collected_dynamic_variables: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub disconnection_reason: Option<String>,
}

impl CallRecord {
    /// Transcript as `[mm:ss] speaker: text` lines, `None` when empty.
    pub fn formatted_transcript(&self) -> Option<String> {
        if self.transcript_object.is_empty() {
            return None;
        }
        Some(
            self.transcript_object
                .iter()
                .map(Utterance::format_line)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Whole seconds between start and end, when both are known.
    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.start_timestamp, self.end_timestamp) {
            (Some(start), Some(end)) if start > 0 && end > 0 => Some((end - start) / 1000),
            _ => None,
        }
    }
}
