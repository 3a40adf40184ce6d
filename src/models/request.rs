//! `RequestState` (C11): the single mutable struct owned exclusively by
//! `PipelineController` for the lifetime of one request. Fan-out workers
//! in P4/P5/P6 never touch this struct directly — they return immutable
//! result records (`Candidate`, `Test`, evaluation cells) that the
//! controller folds in between phases.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::candidate::Candidate;
use super::test_case::Test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FunctionalityLevel {
    Basic,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RequestFlags {
    #[serde(default)]
    pub use_schema: bool,
    #[serde(default)]
    pub use_examples: bool,
    #[serde(default)]
    pub use_lsh: bool,
    #[serde(default)]
    pub use_vector: bool,
    #[serde(default)]
    pub belt_and_suspenders: bool,
    #[serde(default)]
    pub explain_generated_query: bool,
    #[serde(default)]
    pub show_sql: bool,
}

/// The immutable portion of a request, as received over `POST /generate-sql`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SqlRequest {
    pub question: String,
    pub workspace_id: i64,
    pub functionality_level: FunctionalityLevel,
    #[serde(default)]
    pub flags: RequestFlags,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaLinkStrategy {
    WithSchemaLink,
    WithoutSchemaLink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationCase {
    A,
    B,
    C,
    D,
    Bypass,
    Failed,
    DatabaseError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlStatus {
    Gold,
    Silver,
    Failed,
    Unknown,
}

/// Ordered, weighted keyword extracted in P2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub token: String,
    pub weight: f32,
}

/// A single retrieval hit returned by `ContextRetriever`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceHit {
    pub text: String,
    pub source: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldExample {
    pub question: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalCell {
    Ok,
    Ko,
    Error,
}

/// Phase timestamps plus sub-timings, written once per phase by the
/// controller and never read by fan-out workers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionTimings {
    pub phase_start: HashMap<String, DateTime<Utc>>,
    pub phase_end: HashMap<String, DateTime<Utc>>,
    pub phase_duration_ms: HashMap<String, u64>,
    pub test_reduction_ms: Option<u64>,
    pub evaluation_ms: Option<u64>,
    pub belt_and_suspenders_ms: Option<u64>,
}

impl ExecutionTimings {
    pub fn start_phase(&mut self, phase: &str, at: DateTime<Utc>) {
        self.phase_start.insert(phase.to_string(), at);
    }

    pub fn end_phase(&mut self, phase: &str, at: DateTime<Utc>) {
        self.phase_end.insert(phase.to_string(), at);
        if let Some(start) = self.phase_start.get(phase) {
            let dur = (at - *start).num_milliseconds().max(0) as u64;
            self.phase_duration_ms.insert(phase.to_string(), dur);
        }
    }
}

pub struct RequestState {
    pub request_id: Uuid,
    pub request: SqlRequest,

    pub question_language: String,
    pub database_language: String,
    pub translated_question: Option<String>,

    pub keywords: Vec<Keyword>,
    pub evidence: Vec<EvidenceHit>,
    pub gold_examples: Vec<GoldExample>,
    pub lsh_columns: HashSet<SchemaColumn>,

    pub full_mschema: Option<String>,
    pub reduced_mschema: Option<String>,
    pub used_mschema: Option<String>,
    pub schema_link_strategy: Option<SchemaLinkStrategy>,

    pub filtered_tests: Vec<Test>,
    pub generated_sqls: Vec<Candidate>,

    pub evaluation_matrix: HashMap<(usize, usize), EvalCell>,
    pub pass_rate: Vec<f32>,

    pub selected_sql: Option<usize>,
    pub last_sql: Option<String>,
    pub evaluation_case: Option<EvaluationCase>,
    pub sql_status: SqlStatus,

    pub execution: ExecutionTimings,
    pub escalation_attempts: u32,
    pub max_escalation_attempts: u32,

    /// Client-disconnect / deadline signal, polled between phases
    /// (spec §5). A single token, never per-task.
    pub cancellation: CancellationToken,
    /// Non-fatal notes accumulated across phases and surfaced as
    /// `SYSTEM_WARNING` frames (e.g. borderline-acceptance notices in
    /// Case C, partial vector-store failures).
    pub warnings: Vec<String>,
}

impl RequestState {
    pub fn new(request_id: Uuid, request: SqlRequest, max_escalation_attempts: u32, cancellation: CancellationToken) -> Self {
        Self {
            request_id,
            request,
            question_language: "en".to_string(),
            database_language: "en".to_string(),
            translated_question: None,
            keywords: Vec::new(),
            evidence: Vec::new(),
            gold_examples: Vec::new(),
            lsh_columns: HashSet::new(),
            full_mschema: None,
            reduced_mschema: None,
            used_mschema: None,
            schema_link_strategy: None,
            filtered_tests: Vec::new(),
            generated_sqls: Vec::new(),
            evaluation_matrix: HashMap::new(),
            pass_rate: Vec::new(),
            selected_sql: None,
            last_sql: None,
            evaluation_case: None,
            sql_status: SqlStatus::Unknown,
            execution: ExecutionTimings::default(),
            escalation_attempts: 0,
            max_escalation_attempts,
            cancellation,
            warnings: Vec::new(),
        }
    }

    /// The text to run the pipeline on: the translation if one was
    /// produced in P1, otherwise the original question.
    pub fn effective_question(&self) -> &str {
        self.translated_question.as_deref().unwrap_or(&self.request.question)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.selected_sql.and_then(|i| self.generated_sqls.get(i))
    }

    pub fn push_warning(&mut self, text: impl Into<String>) {
        self.warnings.push(text.into());
    }
}
