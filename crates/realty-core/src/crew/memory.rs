//! Short-term crew memory: what earlier tasks of the same kickoff produced.

/// Longest excerpt kept per entry, in characters.
const MAX_ENTRY_CHARS: usize = 1500;

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    pub task: String,
    pub role: String,
    pub output: String,
}

/// Outputs remembered during one crew run, oldest first.
#[derive(Debug, Clone, Default)]
pub struct CrewMemory {
    entries: Vec<MemoryEntry>,
}

impl CrewMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&mut self, task: &str, role: &str, output: &str) {
        if output.trim().is_empty() {
            return;
        }
        self.entries.push(MemoryEntry {
            task: task.to_string(),
            role: role.to_string(),
            output: output.trim().to_string(),
        });
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    /// Render the entries an agent has not already been given as context.
    pub fn recall(&self, context: Option<&str>) -> Option<String> {
        let lines: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !context.is_some_and(|c| c.contains(&e.output)))
            .map(|e| format!("- {} ({}): {}", e.task, e.role, excerpt(&e.output)))
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= MAX_ENTRY_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_ENTRY_CHARS).collect();
    format!("{}…", cut)
}
