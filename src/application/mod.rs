//! Application flow: the submit pipeline and snippet save flow.

pub mod run;

pub use run::{ExecutionRequest, Orchestrator};
