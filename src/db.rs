//! Local bookkeeping store: SQLite-backed pool plus a repository for
//! per-request execution summaries. Distinct from the target workspace
//! database and the vector store, which arrive per-request via
//! `WorkspaceLoader` (spec §1). Grounded on the teacher's
//! `services/llm/repository.rs` (`SqlitePool` + `sqlx::query_as`).

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;

use crate::error::CoreError;
use crate::models::request::{EvaluationCase, SqlStatus};

pub async fn create_pool(url: &str) -> Result<SqlitePool, anyhow::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// One row summarizing a completed (or aborted) `/generate-sql` run,
/// written once by `PipelineController` in P7 regardless of outcome.
pub struct RequestLogEntry {
    pub request_id: uuid::Uuid,
    pub workspace_id: i64,
    pub username: Option<String>,
    pub question: String,
    pub functionality_level: String,
    pub evaluation_case: Option<EvaluationCase>,
    pub sql_status: SqlStatus,
    pub escalation_attempts: u32,
    pub selected_sql: Option<String>,
    pub phase_duration_ms: String,
    pub total_duration_ms: Option<i64>,
    pub error_type: Option<String>,
}

pub struct RequestLogRepository {
    pool: SqlitePool,
}

impl RequestLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &RequestLogEntry) -> Result<(), CoreError> {
        let evaluation_case = entry.evaluation_case.map(evaluation_case_label);
        let sql_status = sql_status_label(entry.sql_status);

        sqlx::query(
            r#"INSERT INTO request_log
                (request_id, workspace_id, username, question, functionality_level,
                 evaluation_case, sql_status, escalation_attempts, selected_sql,
                 phase_duration_ms, total_duration_ms, error_type)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.request_id.to_string())
        .bind(entry.workspace_id)
        .bind(&entry.username)
        .bind(&entry.question)
        .bind(&entry.functionality_level)
        .bind(evaluation_case)
        .bind(sql_status)
        .bind(entry.escalation_attempts)
        .bind(&entry.selected_sql)
        .bind(&entry.phase_duration_ms)
        .bind(entry.total_duration_ms)
        .bind(&entry.error_type)
        .execute(&self.pool)
        .await
        .map_err(CoreError::StoreError)?;

        Ok(())
    }

    /// Recent runs for a workspace, newest first — used by `/ready` and
    /// operator tooling to confirm the store is warm and writable.
    pub async fn recent_for_workspace(&self, workspace_id: i64, limit: i64) -> Result<i64, CoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM request_log WHERE workspace_id = ? LIMIT ?")
            .bind(workspace_id)
            .bind(limit)
            .fetch_one(&self.pool)
            .await
            .map_err(CoreError::StoreError)?;
        Ok(count.0)
    }
}

fn evaluation_case_label(case: EvaluationCase) -> &'static str {
    match case {
        EvaluationCase::A => "A",
        EvaluationCase::B => "B",
        EvaluationCase::C => "C",
        EvaluationCase::D => "D",
        EvaluationCase::Bypass => "BYPASS",
        EvaluationCase::Failed => "FAILED",
        EvaluationCase::DatabaseError => "DATABASE_ERROR",
    }
}

fn sql_status_label(status: SqlStatus) -> &'static str {
    match status {
        SqlStatus::Gold => "GOLD",
        SqlStatus::Silver => "SILVER",
        SqlStatus::Failed => "FAILED",
        SqlStatus::Unknown => "UNKNOWN",
    }
}
