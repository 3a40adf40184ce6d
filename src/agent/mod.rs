pub mod adapter;
pub mod client;
pub mod pool;
pub mod template;

pub use adapter::AgentAdapter;
pub use client::ModelClient;
pub use pool::AgentPool;
pub use template::TemplateLoader;
