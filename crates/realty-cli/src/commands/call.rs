//! `realty call`: place and inspect Retell voice calls directly.

use realty_core::tools::voice::{InspectionCall, NegotiationCall, DEFAULT_MAX_WAIT_SECONDS};
use realty_core::tools::VoiceCallTools;
use realty_core::Settings;

use super::report_tool_result;

pub async fn inspect(settings: &Settings, call: InspectionCall) -> Result<(), String> {
    let tools = VoiceCallTools::from_settings(&settings.voice);
    println!("📞 Calling {} about {}", call.to_number, call.property_id);
    report_tool_result(&tools.make_inspection_call(&call).await)
}

pub async fn negotiate(settings: &Settings, call: NegotiationCall) -> Result<(), String> {
    let tools = VoiceCallTools::from_settings(&settings.voice);
    println!("📞 Calling {} about {}", call.to_number, call.property_id);
    report_tool_result(&tools.make_negotiation_call(&call).await)
}

/// Wait for a call to end and print its transcript.
pub async fn result(
    settings: &Settings,
    call_id: &str,
    max_wait_seconds: Option<u64>,
) -> Result<(), String> {
    let tools = VoiceCallTools::from_settings(&settings.voice);
    let max_wait = max_wait_seconds.unwrap_or(DEFAULT_MAX_WAIT_SECONDS);
    println!("⏳ Waiting up to {}s for call {}", max_wait, call_id);
    report_tool_result(&tools.get_call_result(call_id, max_wait).await)
}

pub async fn status(settings: &Settings, call_id: &str) -> Result<(), String> {
    let tools = VoiceCallTools::from_settings(&settings.voice);
    report_tool_result(&tools.check_call_status(call_id).await)
}
