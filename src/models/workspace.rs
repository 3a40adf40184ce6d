//! Workspace and agent configuration records, loaded read-only for the
//! duration of a request via `external::WorkspaceLoader`.

use serde::{Deserialize, Serialize};

/// A single model endpoint: provider + model id + call parameters.
/// Appears as both `AgentConfig::primary_model` and as an entry in
/// `AgentConfig::fallback_models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHandle {
    pub provider: String,
    pub model_id: String,
    pub api_key_ref: String,
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    2048
}

/// The tagged variant standing in for the teacher's "dynamic agent
/// registry": every kind that can appear in a workspace's agent pool
/// configuration, exhaustively enumerated so a missing template or
/// output schema is a compile-time gap, not a runtime lookup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Validator,
    Translator,
    KeywordExtractor,
    SqlBasic,
    SqlAdvanced,
    SqlExpert,
    TestGen,
    Evaluator,
    Selector,
    Supervisor,
    TestReducer,
    Explainer,
}

impl AgentKind {
    /// The registry key `TemplateLoader` resolves by default for this
    /// kind, used when a workspace's `AgentConfig` leaves `template_key`
    /// at its default.
    pub fn default_template_key(self) -> &'static str {
        match self {
            Self::Validator => "validator",
            Self::Translator => "translator",
            Self::KeywordExtractor => "keyword_extractor",
            Self::SqlBasic => "sql_basic",
            Self::SqlAdvanced => "sql_advanced",
            Self::SqlExpert => "sql_expert",
            Self::TestGen => "test_gen",
            Self::Evaluator => "evaluator",
            Self::Selector => "selector",
            Self::Supervisor => "supervisor",
            Self::TestReducer => "test_reducer",
            Self::Explainer => "explainer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    pub primary_model: ModelHandle,
    #[serde(default)]
    pub fallback_models: Vec<ModelHandle>,
    pub template_key: String,
    /// Name of the typed output record `AgentAdapter` validates responses
    /// against; resolved against a compile-time schema table rather than
    /// carried as free-form JSON schema.
    pub output_schema: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Postgres,
    MySql,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    /// Bumped by the (out-of-scope) admin surface whenever agent/model
    /// configuration changes; used as part of the `SessionCache` key so a
    /// stale cached runtime is never served past a configuration change
    /// (spec §4.10).
    #[serde(default)]
    pub version: u64,
    pub default_model: String,
    #[serde(default = "default_evaluation_threshold")]
    pub evaluation_threshold: f32,
    #[serde(default = "default_number_of_sqls")]
    pub number_of_sqls_to_generate: usize,
    #[serde(default = "default_number_of_tests")]
    pub number_of_tests_to_generate: usize,
    pub language: String,
    pub dialect: SqlDialect,
    pub db_connection: String,
    pub vdb_connection: String,
    pub agent_pool_config: Vec<AgentConfig>,
}

fn default_evaluation_threshold() -> f32 {
    0.90
}

fn default_number_of_sqls() -> usize {
    3
}

fn default_number_of_tests() -> usize {
    5
}

impl Workspace {
    pub fn agent_config(&self, kind: AgentKind) -> Option<&AgentConfig> {
        self.agent_pool_config.iter().find(|c| c.kind == kind)
    }
}
