//! SQL Generation Core
//!
//! A streaming, multi-agent pipeline that turns a natural-language
//! question about a relational database into a validated SQL query,
//! together with the evidence, tests, and metadata needed to justify the
//! choice (spec §1). This library exposes every module the binary in
//! `main.rs` wires together; embedders that supply their own
//! `WorkspaceLoader`/`DbManager`/`VdbManager` can depend on this crate
//! directly instead of running the binary.

pub mod agent;
pub mod app_state;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod evaluator;
pub mod explainer;
pub mod external;
pub mod feedback;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod relevance;
pub mod selector;
pub mod session_cache;
pub mod shutdown;
pub mod utils;
pub mod validator;

pub use app_state::AppState;
pub use config::Config;
pub use error::{ApiError, ApiResult, CoreError, CoreResult};
