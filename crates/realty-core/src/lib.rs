//! Realty Core: domain logic for the Realty Agents workflow.
//!
//! The crate covers everything between the CLI and the outside world:
//!
//! - `tools`: failure-tolerant wrappers around the voice-call (Retell) and
//!   web-extraction (TinyFish) vendor APIs
//! - `llm`: chat-completion client used by crew agents
//! - `crew`: YAML-defined crews executed sequentially or hierarchically
//! - `flow`: the research → approval → parallel crews → report state machine
//! - `db` / `store`: SQLite persistence of flow state
//!
//! Nothing in here reads process-wide singletons: every client is built from
//! an explicit [`config::Settings`] value.

pub mod config;
pub mod crew;
pub mod db;
pub mod error;
pub mod flow;
pub mod llm;
pub mod models;
pub mod store;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

// Convenience re-exports
pub use config::Settings;
pub use db::Database;
pub use error::RealtyError;
pub use flow::{FlowOutcome, RealEstateFlow};
