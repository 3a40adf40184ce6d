//! Persists approved (question, sql, evidence) tuples back to the vector
//! store for future retrieval (C14). Writes to the same vdb collection
//! are serialized; reads are unaffected (spec §5 shared-resource policy).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::external::vdb_manager::{SqlDocument, VdbManager};

fn hash_of(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

pub struct FeedbackSink {
    vdb: Arc<dyn VdbManager>,
    /// Serializes writes per collection; keyed on the collection name so
    /// unrelated collections don't contend with each other.
    write_locks: dashmap::DashMap<String, Arc<Mutex<()>>>,
    seen: dashmap::DashSet<(u64, u64)>,
}

impl FeedbackSink {
    pub fn new(vdb: Arc<dyn VdbManager>) -> Self {
        Self { vdb, write_locks: dashmap::DashMap::new(), seen: dashmap::DashSet::new() }
    }

    /// Upserts the feedback tuple unless a (question_hash, sql_hash) pair
    /// matching it was already persisted this process lifetime.
    pub async fn submit(&self, question: &str, sql: &str, evidence: Vec<String>, collection: String) -> Result<Option<String>, CoreError> {
        let question_hash = hash_of(question);
        let sql_hash = hash_of(sql);

        if self.seen.contains(&(question_hash, sql_hash)) {
            tracing::debug!(question_hash, sql_hash, "feedback already persisted, skipping duplicate");
            return Ok(None);
        }

        let lock = self
            .write_locks
            .entry(collection.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check under the collection's write lock: a concurrent submit
        // for the same pair may have completed while we were waiting.
        if self.seen.contains(&(question_hash, sql_hash)) {
            return Ok(None);
        }

        let id = self
            .vdb
            .upsert_sql_document(SqlDocument { question: question.to_string(), sql: sql.to_string(), evidence, collection })
            .await?;

        // Only mark the pair seen once it is actually persisted: marking it
        // before the upsert would drop the feedback for good if the upsert
        // failed, since every retry would then short-circuit at line above.
        self.seen.insert((question_hash, sql_hash));

        Ok(Some(id))
    }
}
