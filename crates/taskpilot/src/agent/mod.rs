//! The agent loop: configuration and the per-run orchestrator.

pub mod config;
pub mod orchestrator;

pub use config::AgentConfig;
pub use orchestrator::{Orchestrator, RunOutcome, TerminationReason, ToolCallRecord};
