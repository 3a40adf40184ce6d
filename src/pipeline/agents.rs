//! The bundle of heavy, workspace-scoped collaborators built once per
//! `SessionCache` miss (P0, spec §4.1): every `AgentAdapter` named in the
//! workspace's `agent_pool_config`, plus the components built on top of
//! them (`Selector`, `TestReducer`, `ExplainerAgent`, `Evaluator`,
//! `SqlOutputValidator`, `ContextRetriever`, `FeedbackSink`) and the
//! external `DbManager`/`VdbManager` handles they share.

use std::sync::Arc;

use crate::agent::adapter::AgentAdapter;
use crate::agent::pool::AgentPool;
use crate::context::retriever::ContextRetriever;
use crate::evaluator::Evaluator;
use crate::explainer::ExplainerAgent;
use crate::external::db_manager::DbManager;
use crate::external::vdb_manager::VdbManager;
use crate::feedback::FeedbackSink;
use crate::relevance::guard::RelevanceGuard;
use crate::relevance::reducer::TestReducer;
use crate::selector::Selector;
use crate::validator::SqlOutputValidator;

/// Everything `PipelineController` needs to run a request for one
/// workspace, cached as a single unit behind `SessionCache` (C12).
pub struct WorkspaceRuntime {
    pub validator_agent: Arc<AgentAdapter>,
    pub translator_agent: Arc<AgentAdapter>,
    pub keyword_extractor_agent: Arc<AgentAdapter>,

    pub agent_pool: Arc<AgentPool>,
    pub context_retriever: Arc<ContextRetriever>,
    pub relevance_guard: Arc<RelevanceGuard>,
    pub test_reducer: Arc<TestReducer>,
    pub evaluator: Arc<Evaluator>,
    pub sql_validator: Arc<SqlOutputValidator>,
    pub selector: Arc<Selector>,
    pub explainer: Arc<ExplainerAgent>,
    pub feedback_sink: Arc<FeedbackSink>,

    pub db: Arc<dyn DbManager>,
    pub vdb: Arc<dyn VdbManager>,

    /// Workspace-derived scalars the controller consults every request;
    /// copied out of `Workspace` at build time rather than keeping the
    /// whole record alive, since only these fields are read per-request.
    pub database_language: String,
    pub number_of_sqls_to_generate: usize,
    pub number_of_tests_to_generate: usize,
}

impl WorkspaceRuntime {
    pub fn workspace_database_language(&self) -> String {
        self.database_language.clone()
    }

    pub fn number_of_sqls_to_generate(&self) -> usize {
        self.number_of_sqls_to_generate
    }

    pub fn number_of_tests_to_generate(&self) -> usize {
        self.number_of_tests_to_generate
    }

    /// Whether P4 is configured to fan out more than one test generator,
    /// the gate `TestReducer` checks before running (spec §4.1: "if count
    /// > 5 and multiple generators configured").
    pub fn number_of_test_generators(&self) -> usize {
        self.number_of_tests_to_generate
    }

    pub fn schema_identifiers(&self) -> Vec<String> {
        self.context_retriever.schema_identifiers()
    }
}
