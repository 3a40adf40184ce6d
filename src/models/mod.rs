pub mod candidate;
pub mod frame;
pub mod request;
pub mod test_case;
pub mod workspace;

pub use candidate::Candidate;
pub use frame::Frame;
pub use request::{
    EvaluationCase, ExecutionTimings, FunctionalityLevel, RequestFlags, RequestState,
    SchemaLinkStrategy, SqlRequest, SqlStatus,
};
pub use test_case::{Relevance, Test};
pub use workspace::{AgentConfig, AgentKind, ModelHandle, Workspace};
