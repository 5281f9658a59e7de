//! Crew engine: YAML-defined groups of role-bound agents.
//!
//! # Architecture
//!
//! ```text
//! crews/*.yaml ──► CrewDefinition ──► CrewExecutor ──► CrewOutput
//!                                        │
//!                      sequential ◄──────┴──────► hierarchical
//!                      (task → task)              manager → WorkerPool → compile
//!                                        │
//!                         CrewPlan ──────┼────── CrewMemory
//!                                        │
//!                                  Agent (tool loop)
//!                                   │            │
//!                               ChatModel    ToolRegistry
//! ```

pub mod agent;
pub mod executor;
pub mod loader;
pub mod memory;
pub mod planner;
pub mod pool;
pub mod schema;
pub mod template;

pub use agent::Agent;
pub use executor::{Assignment, CrewExecutor, CrewOutput, TaskOutput};
pub use loader::{CrewLoader, CALL_AGENT, LOCATION_ANALYZER, RESEARCH};
pub use memory::CrewMemory;
pub use planner::CrewPlan;
pub use pool::WorkerPool;
pub use schema::{AgentDef, CrewDefinition, Process, TaskDef, TaskKind};
pub use template::CrewInputs;
