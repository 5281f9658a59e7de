//! Crew loader: built-in crews plus YAML overrides from a directory.

use std::collections::BTreeMap;
use std::path::Path;

use super::schema::CrewDefinition;
use crate::error::RealtyError;

pub const RESEARCH: &str = "research";
pub const LOCATION_ANALYZER: &str = "location_analyzer";
pub const CALL_AGENT: &str = "call_agent";

const BUILTIN_YAML: [(&str, &str); 3] = [
    (RESEARCH, include_str!("../../crews/research.yaml")),
    (LOCATION_ANALYZER, include_str!("../../crews/location_analyzer.yaml")),
    (CALL_AGENT, include_str!("../../crews/call_agent.yaml")),
];

/// Crew definitions indexed by name.
#[derive(Debug, Clone, Default)]
pub struct CrewLoader {
    crews: BTreeMap<String, CrewDefinition>,
}

impl CrewLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three crews shipped with the crate.
    pub fn builtin() -> Result<Self, RealtyError> {
        let mut loader = Self::new();
        for (name, yaml) in BUILTIN_YAML {
            let crew = CrewDefinition::from_yaml(yaml)
                .map_err(|e| RealtyError::Crew(format!("built-in crew '{}': {}", name, e)))?;
            loader.insert(crew);
        }
        Ok(loader)
    }

    /// Built-in crews, overridden by any crew of the same name in `dir`.
    pub fn with_overrides(dir: Option<&Path>) -> Result<Self, RealtyError> {
        let mut loader = Self::builtin()?;
        if let Some(dir) = dir {
            let count = loader.load_dir(dir)?;
            tracing::info!("[CrewLoader] Loaded {} crew(s) from '{}'", count, dir.display());
        }
        Ok(loader)
    }

    /// Load every `.yaml`/`.yml` crew in a directory. Files are validated
    /// before they replace an existing crew.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, RealtyError> {
        if !dir.is_dir() {
            return Err(RealtyError::NotFound(format!(
                "Crew directory '{}' does not exist",
                dir.display()
            )));
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")))
            .collect();
        paths.sort();

        for path in &paths {
            let crew = CrewDefinition::from_file(path)?;
            crew.validate()?;
            tracing::info!("[CrewLoader] Loaded crew: {} ({})", crew.name, path.display());
            self.insert(crew);
        }
        Ok(paths.len())
    }

    pub fn insert(&mut self, crew: CrewDefinition) {
        self.crews.insert(crew.name.clone(), crew);
    }

    pub fn get(&self, name: &str) -> Option<&CrewDefinition> {
        self.crews.get(name)
    }

    /// Get a crew or fail with the list of known crews.
    pub fn require(&self, name: &str) -> Result<&CrewDefinition, RealtyError> {
        self.crews.get(name).ok_or_else(|| {
            RealtyError::NotFound(format!(
                "Unknown crew '{}'. Available: {:?}",
                name,
                self.crews.keys().collect::<Vec<_>>()
            ))
        })
    }

    pub fn all(&self) -> impl Iterator<Item = &CrewDefinition> {
        self.crews.values()
    }
}
