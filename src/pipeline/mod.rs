//! Request orchestration: the workspace-scoped collaborator bundle
//! (`agents`), how it's built (`setup`), and the phase-by-phase controller
//! that drives a single request through it (`controller`).

pub mod agents;
pub mod controller;
pub mod setup;

pub use agents::WorkspaceRuntime;
pub use controller::{PipelineController, PipelineDeadlines};
pub use setup::{RuntimeSettings, build_runtime};
