//! Builds a `WorkspaceRuntime` from a loaded `Workspace` record (P0 cache
//! miss path, spec §4.1: "load workspace, instantiate AgentAdapters for
//! every configured AgentConfig, attach SqlOutputValidator to SQL-gen
//! agents, and register in cache").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::adapter::AgentAdapter;
use crate::agent::client::ModelClient;
use crate::agent::pool::AgentPool;
use crate::context::mschema::SchemaCatalog;
use crate::context::retriever::ContextRetriever;
use crate::error::CoreError;
use crate::evaluator::Evaluator;
use crate::explainer::ExplainerAgent;
use crate::external::db_manager::{DbManager, SqliteDbManager};
use crate::external::vdb_manager::{HttpVdbManager, VdbManager};
use crate::feedback::FeedbackSink;
use crate::models::candidate::GeneratorLevel;
use crate::models::workspace::{AgentKind, Workspace};
use crate::relevance::guard::RelevanceGuard;
use crate::relevance::reducer::TestReducer;
use crate::selector::Selector;
use crate::validator::SqlOutputValidator;

use super::agents::WorkspaceRuntime;

/// Knobs from process-wide `Config` needed to build a workspace's runtime,
/// kept separate from `Workspace` itself since they are not admin-surface
/// data (spec §1 scope boundary).
pub struct RuntimeSettings {
    pub agent_timeout: Duration,
    pub vdb_api_key: String,
    pub w_bm25: f32,
    pub w_struct: f32,
}

fn build_agent(
    workspace: &Workspace,
    kind: AgentKind,
    model_client: &ModelClient,
    timeout: Duration,
) -> Result<Arc<AgentAdapter>, CoreError> {
    let config = workspace
        .agent_config(kind)
        .ok_or_else(|| CoreError::TemplateError(format!("workspace {} has no agent configured for {kind:?}", workspace.id)))?
        .clone();
    Ok(Arc::new(AgentAdapter::new(model_client.clone(), config, timeout)))
}

/// Constructs every collaborator a workspace's requests need, in dependency
/// order (DbManager/VdbManager first, agents next, composite components
/// last). Called once per `SessionCache` miss.
pub async fn build_runtime(workspace: &Workspace, model_client: &ModelClient, settings: &RuntimeSettings) -> Result<WorkspaceRuntime, CoreError> {
    let db: Arc<dyn DbManager> = Arc::new(SqliteDbManager::connect(&workspace.db_connection).await.map_err(CoreError::StoreError)?);
    let vdb: Arc<dyn VdbManager> = Arc::new(HttpVdbManager::new(workspace.vdb_connection.clone(), settings.vdb_api_key.clone()));

    let catalog = SchemaCatalog::introspect(&*db).await?;

    let validator_agent = build_agent(workspace, AgentKind::Validator, model_client, settings.agent_timeout)?;
    let translator_agent = build_agent(workspace, AgentKind::Translator, model_client, settings.agent_timeout)?;
    let keyword_extractor_agent = build_agent(workspace, AgentKind::KeywordExtractor, model_client, settings.agent_timeout)?;

    let mut sql_agents: HashMap<GeneratorLevel, Arc<AgentAdapter>> = HashMap::new();
    sql_agents.insert(GeneratorLevel::Basic, build_agent(workspace, AgentKind::SqlBasic, model_client, settings.agent_timeout)?);
    sql_agents.insert(GeneratorLevel::Advanced, build_agent(workspace, AgentKind::SqlAdvanced, model_client, settings.agent_timeout)?);
    sql_agents.insert(GeneratorLevel::Expert, build_agent(workspace, AgentKind::SqlExpert, model_client, settings.agent_timeout)?);
    let test_gen_agent = build_agent(workspace, AgentKind::TestGen, model_client, settings.agent_timeout)?;
    let agent_pool = Arc::new(AgentPool::new(sql_agents, test_gen_agent));

    let selector_agent = build_agent(workspace, AgentKind::Selector, model_client, settings.agent_timeout)?;
    let supervisor_agent = build_agent(workspace, AgentKind::Supervisor, model_client, settings.agent_timeout)?;
    let selector = Arc::new(Selector::new(selector_agent, supervisor_agent, workspace.evaluation_threshold));

    let test_reducer_agent = build_agent(workspace, AgentKind::TestReducer, model_client, settings.agent_timeout)?;
    let test_reducer = Arc::new(TestReducer::new(test_reducer_agent));

    let explainer_agent = build_agent(workspace, AgentKind::Explainer, model_client, settings.agent_timeout)?;
    let explainer = Arc::new(ExplainerAgent::new(explainer_agent));

    let context_retriever = Arc::new(ContextRetriever::new(vdb.clone(), catalog));
    let relevance_guard = Arc::new(RelevanceGuard::new(settings.w_bm25, settings.w_struct));
    let evaluator = Arc::new(Evaluator::new(db.clone()));
    let sql_validator = Arc::new(SqlOutputValidator::new(db.clone()));
    let feedback_sink = Arc::new(FeedbackSink::new(vdb.clone()));

    Ok(WorkspaceRuntime {
        validator_agent,
        translator_agent,
        keyword_extractor_agent,
        agent_pool,
        context_retriever,
        relevance_guard,
        test_reducer,
        evaluator,
        sql_validator,
        selector,
        explainer,
        feedback_sink,
        db,
        vdb,
        database_language: workspace.language.clone(),
        number_of_sqls_to_generate: workspace.number_of_sqls_to_generate,
        number_of_tests_to_generate: workspace.number_of_tests_to_generate,
    })
}
