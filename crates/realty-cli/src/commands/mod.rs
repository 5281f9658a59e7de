//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command. Commands return
//! `Result<(), String>`; `main` prints the error and exits non-zero.

pub mod call;
pub mod crew;
pub mod extract;
pub mod flow;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use realty_core::crew::{CrewExecutor, CrewLoader};
use realty_core::flow::CrewSet;
use realty_core::llm::LlmCaller;
use realty_core::store::FlowStore;
use realty_core::tools::{ToolRegistry, ToolResult};
use realty_core::{Database, Settings};

/// Everything a flow or crew command needs, built once per invocation.
pub struct Runtime {
    pub settings: Settings,
    pub crews: Arc<CrewSet>,
}

impl Runtime {
    /// Build settings from the environment, with optional CLI overrides.
    pub fn init(output_dir: Option<&Path>, crew_dir: Option<&Path>) -> Result<Self, String> {
        let mut settings = settings();
        if let Some(dir) = output_dir {
            settings.output_dir = dir.to_path_buf();
        }

        let loader = CrewLoader::with_overrides(crew_dir).map_err(|e| e.to_string())?;
        let model = Arc::new(LlmCaller::new(settings.llm.clone()));
        let executor = CrewExecutor::new(model, ToolRegistry::standard(&settings), &settings);

        Ok(Self {
            crews: Arc::new(CrewSet::new(loader, executor)),
            settings,
        })
    }
}

/// Settings from the environment after loading dotenv files.
pub fn settings() -> Settings {
    load_dotenv();
    Settings::from_env()
}

/// Open the flow store at `db_path`, creating the file if needed.
pub fn open_store(db_path: &Path) -> Result<FlowStore, String> {
    let db = Database::open(db_path)
        .map_err(|e| format!("Failed to open database '{}': {}", db_path.display(), e))?;
    Ok(FlowStore::new(db))
}

/// Runtime plus flow store for the `flow` commands that run crews.
pub fn init_flow(
    output_dir: Option<&Path>,
    crew_dir: Option<&Path>,
    db_path: &Path,
) -> Result<(Runtime, FlowStore), String> {
    let runtime = Runtime::init(output_dir, crew_dir)?;
    let store = open_store(db_path)?;
    Ok((runtime, store))
}

/// `<data dir>/realty-agents/realty.db`, or `realty.db` when there is no data dir.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("realty-agents").join("realty.db"))
        .unwrap_or_else(|| PathBuf::from("realty.db"))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Load `.env.local` then `.env` from the working directory. Variables
/// already set in the environment win.
pub fn load_dotenv() {
    for filename in [".env.local", ".env"] {
        let path = Path::new(filename);
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        for (key, value) in parse_dotenv(&content) {
            if std::env::var(&key).is_err() {
                std::env::set_var(&key, &value);
            }
        }
        tracing::info!("[Env] Loaded environment from '{}'", filename);
    }
}

/// `KEY=VALUE` pairs from a dotenv file. Comments, blank lines and an
/// `export ` prefix are skipped; surrounding quotes are stripped.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    pairs
}

/// Print a tool result; a failed result becomes the command error.
pub fn report_tool_result(result: &ToolResult) -> Result<(), String> {
    print_json(&result.to_json());
    if result.success {
        Ok(())
    } else {
        Err(result
            .error
            .clone()
            .unwrap_or_else(|| "tool call failed".to_string()))
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
