//! `realty crew`: inspect, validate and run individual crews.

use realty_core::crew::{CrewInputs, CrewLoader, Process};
use realty_core::flow::CrewRunner;
use realty_core::tools::ToolRegistry;

use super::{truncate, Runtime};

/// Parse repeated `key=value` arguments into crew inputs.
pub fn parse_inputs(pairs: &[String]) -> Result<CrewInputs, String> {
    let mut inputs = CrewInputs::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid input '{}'. Expected key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid input '{}'. Key must not be empty", pair));
        }
        inputs.insert(key.to_string(), value.to_string());
    }
    Ok(inputs)
}

/// List the available crews.
pub fn list(loader: &CrewLoader) -> Result<(), String> {
    println!("┌──────────────────────┬──────────────┬────────┬───────┬──────────────────────────────────┐");
    println!("│ Crew                 │ Process      │ Agents │ Tasks │ Report                           │");
    println!("├──────────────────────┼──────────────┼────────┼───────┼──────────────────────────────────┤");
    for crew in loader.all() {
        let process = match crew.process {
            Process::Sequential => "sequential",
            Process::Hierarchical => "hierarchical",
        };
        println!(
            "│ {:<20} │ {:<12} │ {:>6} │ {:>5} │ {:<32} │",
            truncate(&crew.name, 20),
            process,
            crew.agents.len(),
            crew.tasks.len(),
            truncate(crew.report_file().unwrap_or("-"), 32)
        );
    }
    println!("└──────────────────────┴──────────────┴────────┴───────┴──────────────────────────────────┘");
    Ok(())
}

/// Validate every crew's structure and tool bindings.
pub fn validate(loader: &CrewLoader, tools: &ToolRegistry) -> Result<(), String> {
    let mut failures = Vec::new();
    for crew in loader.all() {
        match crew.validate().and_then(|_| crew.validate_tools(tools)) {
            Ok(()) => println!("✅ Crew '{}' is valid ({} tasks)", crew.name, crew.tasks.len()),
            Err(e) => {
                println!("❌ Crew '{}': {}", crew.name, e);
                failures.push(crew.name.clone());
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("Invalid crews: {}", failures.join(", ")))
    }
}

/// Run one crew with the given inputs and print its final output.
pub async fn run(runtime: &Runtime, name: &str, inputs: &[String]) -> Result<(), String> {
    let inputs = parse_inputs(inputs)?;
    runtime.crews.loader().require(name).map_err(|e| e.to_string())?;

    println!("🚀 Running crew '{}'", name);
    let output = runtime
        .crews
        .run_crew(name, inputs)
        .await
        .map_err(|e| e.to_string())?;
    println!();
    println!("{}", output);
    Ok(())
}
