//! TinyFish web extraction: natural-language goals run against a live page.

use std::time::Duration;

use async_trait::async_trait;

use super::{optional_bool, optional_str, required_str, Tool, ToolResult};
use crate::config::ExtractionSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct WebExtractor {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl WebExtractor {
    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
        }
    }

    /// Extract structured data from `url` according to `goal`.
    pub async fn run(
        &self,
        url: &str,
        goal: &str,
        use_stealth: bool,
        proxy_country: Option<&str>,
    ) -> ToolResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return ToolResult::error("TINYFISH_API_KEY environment variable not set")
                .with("url", url);
        };

        let body = build_run_request(url, goal, use_stealth, proxy_country);
        let endpoint = format!("{}/run", self.base_url.trim_end_matches('/'));
        tracing::info!("[WebExtractor] Extracting from {}", url);

        let response = match self
            .client
            .post(&endpoint)
            .header("X-API-Key", api_key)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(r) => r,
            Err(e) => return request_failed(url, e),
        };

        match response.json::<serde_json::Value>().await {
            Ok(value) => interpret_run_response(url, &value),
            Err(e) => request_failed(url, e),
        }
    }
}

fn request_failed(url: &str, err: reqwest::Error) -> ToolResult {
    tracing::warn!("[WebExtractor] Request for {} failed: {}", url, err);
    ToolResult::error(format!("TinyFish API request failed: {}", err)).with("url", url)
}

/// Request body for `POST /run`.
pub fn build_run_request(
    url: &str,
    goal: &str,
    use_stealth: bool,
    proxy_country: Option<&str>,
) -> serde_json::Value {
    let mut body = serde_json::json!({ "url": url, "goal": goal });
    if use_stealth {
        body["browser_profile"] = serde_json::json!("stealth");
    }
    if let Some(country) = proxy_country.filter(|c| !c.trim().is_empty()) {
        body["proxy_config"] = serde_json::json!({
            "enabled": true,
            "country_code": country.trim().to_uppercase(),
        });
    }
    body
}

/// Classify a run response by its `status`.
pub fn interpret_run_response(url: &str, response: &serde_json::Value) -> ToolResult {
    let status = response
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("UNKNOWN");

    match status {
        "COMPLETED" => match response.get("result").filter(|r| !r.is_null()) {
            Some(result) => ToolResult::success().with("data", result).with("url", url),
            None => ToolResult::error("Run completed but no result data returned").with("url", url),
        },
        "FAILED" => {
            let message = match response.get("error") {
                Some(serde_json::Value::Object(obj)) => obj
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown error")
                    .to_string(),
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => "Unknown error".to_string(),
                Some(other) => other.to_string(),
            };
            ToolResult::error(format!("TinyFish run failed: {}", message)).with("url", url)
        }
        other => ToolResult::error(format!("Unexpected run status: {}", other))
            .with("url", url)
            .with("status", other),
    }
}

#[async_trait]
impl Tool for WebExtractor {
    fn name(&self) -> &str {
        "web_extractor"
    }

    fn description(&self) -> &str {
        "Extract structured data from a web page. Describe what to extract as a \
         natural-language goal, e.g. 'Extract all property listings with price, \
         address, bedrooms and agent phone number as JSON'."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "url": "page to extract from",
            "goal": "natural-language description of the data to extract",
            "use_stealth": "(optional) true for sites with bot protection",
            "proxy_country": "(optional) two-letter country code for a geo proxy, e.g. US"
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> ToolResult {
        let url = match required_str(&args, "url") {
            Ok(url) => url,
            Err(err) => return err,
        };
        let goal = match required_str(&args, "goal") {
            Ok(goal) => goal,
            Err(err) => return err.with("url", url.as_str()),
        };
        let use_stealth = optional_bool(&args, "use_stealth").unwrap_or(false);
        let proxy_country = optional_str(&args, "proxy_country");
        self.run(&url, &goal, use_stealth, proxy_country.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.propertypro.ng/property-for-rent/in/lagos/lekki";

    #[test]
    fn test_request_body_options() {
        let plain = build_run_request(URL, "list prices", false, None);
        assert_eq!(plain, serde_json::json!({ "url": URL, "goal": "list prices" }));

        let full = build_run_request(URL, "list prices", true, Some("ng"));
        assert_eq!(full["browser_profile"], "stealth");
        assert_eq!(full["proxy_config"]["enabled"], true);
        assert_eq!(full["proxy_config"]["country_code"], "NG");
    }

    #[test]
    fn test_completed_with_result() {
        let response = serde_json::json!({
            "status": "COMPLETED",
            "result": { "listings": [{ "price": "₦4,000,000" }] }
        });
        let result = interpret_run_response(URL, &response);
        assert!(result.success);
        assert_eq!(result.get_str("url"), Some(URL));
        assert_eq!(result.get("data").unwrap()["listings"][0]["price"], "₦4,000,000");
    }

    #[test]
    fn test_completed_without_result() {
        let result = interpret_run_response(URL, &serde_json::json!({ "status": "COMPLETED" }));
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Run completed but no result data returned")
        );
    }

    #[test]
    fn test_failed_error_shapes() {
        let object = serde_json::json!({ "status": "FAILED", "error": { "message": "Blocked by captcha" } });
        let result = interpret_run_response(URL, &object);
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("Blocked by captcha"));

        let string = serde_json::json!({ "status": "FAILED", "error": "page not found" });
        let result = interpret_run_response(URL, &string);
        assert_eq!(
            result.error.as_deref(),
            Some("TinyFish run failed: page not found")
        );
        assert_eq!(result.get_str("url"), Some(URL));
    }

    #[test]
    fn test_unexpected_status() {
        let result = interpret_run_response(URL, &serde_json::json!({ "status": "RUNNING" }));
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("RUNNING"));
        assert_eq!(result.get_str("url"), Some(URL));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let extractor = WebExtractor::from_settings(&ExtractionSettings::default());
        let result = extractor.run(URL, "list prices", false, None).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("TINYFISH_API_KEY"));
        assert_eq!(result.get_str("url"), Some(URL));
    }

    #[tokio::test]
    async fn test_network_failure_is_payload() {
        let extractor = WebExtractor::from_settings(&ExtractionSettings {
            api_key: Some("key".to_string()),
            base_url: "http://127.0.0.1:1".to_string(),
        });
        let result = extractor.run(URL, "list prices", false, None).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().starts_with("TinyFish API request failed"));
    }

    #[tokio::test]
    async fn test_invoke_requires_goal() {
        let extractor = WebExtractor::from_settings(&ExtractionSettings::default());
        let result = extractor.invoke(serde_json::json!({ "url": URL })).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("goal"));
        assert_eq!(result.get_str("url"), Some(URL));
    }
}
