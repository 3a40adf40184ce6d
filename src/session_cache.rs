//! Per-(session, workspace, version) cache of heavy request setup: the
//! full `WorkspaceRuntime` bundle a workspace needs (C12). Entries are
//! shared across concurrent requests in the same session; a background
//! sweeper reaps expired entries on an interval, grounded in the same
//! shutdown-flag + interval-loop shape as
//! `utils::scheduled_executor::ScheduledExecutor`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::pipeline::WorkspaceRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionCacheKey {
    pub session_id: uuid::Uuid,
    pub workspace_id: i64,
    pub workspace_version: u64,
}

struct SessionCacheEntry {
    runtime: Arc<WorkspaceRuntime>,
    expires_at: Instant,
}

pub struct SessionCache {
    entries: DashMap<SessionCacheKey, SessionCacheEntry>,
    ttl: Duration,
    shutdown: Arc<AtomicBool>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl, shutdown: Arc::new(AtomicBool::new(false)) }
    }

    pub fn get(&self, key: &SessionCacheKey) -> Option<Arc<WorkspaceRuntime>> {
        let entry = self.entries.get(key)?;
        if entry.expires_at < Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.runtime.clone())
    }

    pub fn insert(&self, key: SessionCacheKey, runtime: Arc<WorkspaceRuntime>) {
        self.entries.insert(key, SessionCacheEntry { runtime, expires_at: Instant::now() + self.ttl });
    }

    /// Evicts every entry for `workspace_id` immediately — called when a
    /// workspace's configuration version bumps, short-circuiting the TTL.
    pub fn invalidate_workspace(&self, workspace_id: i64) {
        self.entries.retain(|key, _| key.workspace_id != workspace_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Spawns the background TTL sweeper. Returns a shutdown flag the
    /// caller can set to stop the loop during graceful shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> Arc<AtomicBool> {
        let cache = self.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                let before = cache.entries.len();
                let now = Instant::now();
                cache.entries.retain(|_, entry| entry.expires_at >= now);
                let reaped = before - cache.entries.len();
                if reaped > 0 {
                    tracing::debug!(reaped, "session cache sweeper reaped expired entries");
                }
            }
        });
        shutdown
    }
}
