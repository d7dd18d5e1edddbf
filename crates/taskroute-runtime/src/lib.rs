//! Runtime orchestrator — carries a task from creation through routing,
//! execution and metric capture to a terminal status.
//!
//! Two entry points share one state machine: `submit` for direct task
//! requests and `resume_from_content` for the workflow trigger that follows
//! an ingestion.

pub mod executor;
pub mod orchestrator;
pub mod types;

pub use executor::{BackendExecutor, ExecutionOutput, ExecutionRequest, SimulatedExecutor};
pub use orchestrator::Orchestrator;
pub use types::*;
