//! `realty extract`: one-off TinyFish web extraction.

use realty_core::tools::WebExtractor;
use realty_core::Settings;

use super::report_tool_result;

pub async fn run(
    settings: &Settings,
    url: &str,
    goal: &str,
    stealth: bool,
    proxy_country: Option<&str>,
) -> Result<(), String> {
    let extractor = WebExtractor::from_settings(&settings.extraction);
    println!("🔍 Extracting from {}", url);
    report_tool_result(&extractor.run(url, goal, stealth, proxy_country).await)
}
