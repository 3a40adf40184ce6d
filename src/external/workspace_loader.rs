//! Contract for the configuration/admin surface that stores workspaces,
//! agents, and models — explicitly out of scope for this crate (spec §1).
//! The core only consumes it through this trait.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::workspace::Workspace;

#[async_trait]
pub trait WorkspaceLoader: Send + Sync {
    async fn load(&self, workspace_id: i64) -> Result<Workspace, CoreError>;
}

/// Loads workspace definitions from a local TOML/JSON file, used by the
/// standalone binary when no admin surface is wired up. Each deployment
/// embedding this crate is expected to supply its own `WorkspaceLoader`.
pub struct StaticWorkspaceLoader {
    workspaces: Vec<Workspace>,
}

impl StaticWorkspaceLoader {
    pub fn new(workspaces: Vec<Workspace>) -> Self {
        Self { workspaces }
    }
}

#[async_trait]
impl WorkspaceLoader for StaticWorkspaceLoader {
    async fn load(&self, workspace_id: i64) -> Result<Workspace, CoreError> {
        self.workspaces
            .iter()
            .find(|w| w.id == workspace_id)
            .cloned()
            .ok_or(CoreError::WorkspaceNotFound(workspace_id))
    }
}
