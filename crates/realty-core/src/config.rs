//! Runtime configuration.
//!
//! All vendor credentials and endpoints are read once into [`Settings`] and
//! then handed to the clients that need them. Vendor keys have no defaults:
//! a missing key is carried as `None` and turned into a failure payload by the
//! tool that needs it.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1";
pub const DEFAULT_MANAGER_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_RETELL_BASE_URL: &str = "https://api.retellai.com";
pub const DEFAULT_TINYFISH_BASE_URL: &str = "https://agent.tinyfish.ai/v1/automation";

/// Language-model endpoint used by crew agents.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Adapter type: "openai" (OpenAI-compatible, incl. OpenRouter) or "anthropic"
    pub adapter: String,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model used by agents without an explicit `llm`
    pub default_model: String,
    /// Model used by hierarchical manager tasks without a crew-level override
    pub manager_model: String,
    pub request_timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            adapter: "openai".to_string(),
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            manager_model: DEFAULT_MANAGER_MODEL.to_string(),
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Retell voice-call platform credentials.
#[derive(Debug, Clone)]
pub struct VoiceSettings {
    pub api_key: Option<String>,
    /// Caller number purchased on the platform (E.164)
    pub from_number: Option<String>,
    pub inspector_agent_id: Option<String>,
    pub negotiator_agent_id: Option<String>,
    pub base_url: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            from_number: None,
            inspector_agent_id: None,
            negotiator_agent_id: None,
            base_url: DEFAULT_RETELL_BASE_URL.to_string(),
        }
    }
}

/// TinyFish web-extraction credentials.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_TINYFISH_BASE_URL.to_string(),
        }
    }
}

/// Everything a flow run needs to reach the outside world.
#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub voice: VoiceSettings,
    pub extraction: ExtractionSettings,
    /// Directory that crew report files and the unified report are written under
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            voice: VoiceSettings::default(),
            extraction: ExtractionSettings::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let llm = LlmSettings {
            adapter: get("REALTY_LLM_ADAPTER").unwrap_or(defaults.llm.adapter),
            base_url: get("REALTY_LLM_BASE_URL").unwrap_or(defaults.llm.base_url),
            api_key: get("REALTY_LLM_API_KEY").or_else(|| get("OPENROUTER_API_KEY")),
            default_model: get("REALTY_MODEL").unwrap_or(defaults.llm.default_model),
            manager_model: get("REALTY_MANAGER_MODEL").unwrap_or(defaults.llm.manager_model),
            request_timeout: defaults.llm.request_timeout,
        };

        let voice = VoiceSettings {
            api_key: get("RETELL_API_KEY"),
            from_number: get("RETELL_FROM_NUMBER"),
            inspector_agent_id: get("RETELL_INSPECTOR_AGENT_ID"),
            negotiator_agent_id: get("RETELL_NEGOTIATOR_AGENT_ID"),
            base_url: get("RETELL_BASE_URL").unwrap_or(defaults.voice.base_url),
        };

        let extraction = ExtractionSettings {
            api_key: get("TINYFISH_API_KEY"),
            base_url: get("TINYFISH_BASE_URL").unwrap_or(defaults.extraction.base_url),
        };

        let output_dir = get("REALTY_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        Self {
            llm,
            voice,
            extraction,
            output_dir,
        }
    }
}
