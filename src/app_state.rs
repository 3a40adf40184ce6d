//! Single `Arc`-wrapped struct holding every long-lived collaborator,
//! constructed once at boot and cloned per request (spec §2 AMBIENT:
//! "AppState"). Mirrors the teacher's own `AppState` in shape — one
//! struct, every service behind an `Arc`, no service-locator indirection.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::agent::client::ModelClient;
use crate::config::Config;
use crate::db::RequestLogRepository;
use crate::error::CoreError;
use crate::external::workspace_loader::WorkspaceLoader;
use crate::models::workspace::Workspace;
use crate::pipeline::{PipelineDeadlines, RuntimeSettings, WorkspaceRuntime, build_runtime};
use crate::session_cache::{SessionCache, SessionCacheKey};
use crate::shutdown::ShutdownHandler;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<Config>>,
    pub request_log: Arc<RequestLogRepository>,
    pub session_cache: Arc<SessionCache>,
    pub workspace_loader: Arc<dyn WorkspaceLoader>,
    pub model_client: ModelClient,
    pub shutdown: ShutdownHandler,
}

impl AppState {
    /// Derives the `SessionCache` key for a request. The external interfaces
    /// this crate consumes resolve authentication/session management (spec
    /// §1, out of scope); the one thing `/generate-sql` hands us per-request
    /// is `username` (optional) and `workspace_id`. We fold `username` into
    /// a stable v5 UUID rather than adding a `session_id` field the wire
    /// contract in spec §6 doesn't define — two calls from the same user
    /// against the same workspace version share one cached runtime, which is
    /// the behavior §4.10 asks for (decided in DESIGN.md).
    pub fn session_cache_key(&self, username: Option<&str>, workspace_id: i64, workspace_version: u64) -> SessionCacheKey {
        let namespace = uuid::Uuid::NAMESPACE_OID;
        let session_id = uuid::Uuid::new_v5(&namespace, username.unwrap_or("anonymous").as_bytes());
        SessionCacheKey { session_id, workspace_id, workspace_version }
    }

    /// Returns the cached `WorkspaceRuntime` for this (session, workspace),
    /// building and registering it on a cache miss (P0, spec §4.1).
    pub async fn runtime_for(&self, username: Option<&str>, workspace: &Workspace) -> Result<Arc<WorkspaceRuntime>, CoreError> {
        let key = self.session_cache_key(username, workspace.id, workspace.version);

        if let Some(runtime) = self.session_cache.get(&key) {
            return Ok(runtime);
        }

        let config = self.config.load();
        let settings = RuntimeSettings {
            agent_timeout: Duration::from_millis(config.pipeline.agent_timeout_ms),
            vdb_api_key: config.providers.embedding_api_key.clone(),
            w_bm25: config.relevance.w_bm25 as f32,
            w_struct: config.relevance.w_struct as f32,
        };

        let runtime = Arc::new(build_runtime(workspace, &self.model_client, &settings).await?);
        self.session_cache.insert(key, runtime.clone());
        Ok(runtime)
    }

    pub fn deadlines(&self) -> PipelineDeadlines {
        let config = self.config.load();
        PipelineDeadlines {
            deadline_ms: config.pipeline.deadline_ms,
            db_timeout_ms: config.pipeline.db_timeout_ms,
            eval_threshold: config.pipeline.eval_threshold as f32,
            max_escalation_attempts: config.pipeline.max_escalation_attempts,
        }
    }
}
