//! Drives one request through P0-P7 (spec §4.1), yielding `Frame`s as an
//! `async-stream`-built stream. Grounded on the teacher's
//! `handlers/query.rs` execution-then-respond shape, generalized from a
//! single request/response into a long-lived phase sequence that emits
//! incrementally instead of returning once at the end.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use chrono::Utc;
use futures::Stream;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::{RequestLogEntry, RequestLogRepository};
use crate::error::CoreError;
use crate::models::candidate::{Candidate, GeneratorLevel};
use crate::models::frame::Frame;
use crate::models::request::{EvaluationCase, Keyword, RequestState, SqlRequest, SqlStatus};
use crate::models::test_case::{Relevance, Test};
use crate::selector::SelectionOutcome;
use crate::utils::language::detect as detect_language;

use super::agents::WorkspaceRuntime;

#[derive(Debug, Deserialize)]
struct ValidatorOutput {
    valid: bool,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct TranslatorOutput {
    translated: String,
}

#[derive(Debug, Deserialize)]
struct KeywordOutput {
    keywords: Vec<Keyword>,
}

/// Per-request tunables pulled from process config at stream construction
/// time, so the controller itself never reaches into `ArcSwap<Config>`.
#[derive(Debug, Clone, Copy)]
pub struct PipelineDeadlines {
    pub deadline_ms: u64,
    pub db_timeout_ms: u64,
    pub eval_threshold: f32,
    pub max_escalation_attempts: u32,
}

/// What to do after a phase boundary check; `Stop` carries the frame (if
/// any) and log error tag the caller should emit before returning.
enum BoundaryCheck {
    Continue,
    Stop(Option<Frame>, &'static str),
}

pub struct PipelineController {
    runtime: Arc<WorkspaceRuntime>,
    log: Arc<RequestLogRepository>,
    deadlines: PipelineDeadlines,
}

impl PipelineController {
    pub fn new(runtime: Arc<WorkspaceRuntime>, log: Arc<RequestLogRepository>, deadlines: PipelineDeadlines) -> Self {
        Self { runtime, log, deadlines }
    }

    fn check_boundary(&self, state: &RequestState, deadline: tokio::time::Instant) -> BoundaryCheck {
        if state.is_cancelled() {
            return BoundaryCheck::Stop(Some(Frame::Cancelled), "cancelled");
        }
        if tokio::time::Instant::now() >= deadline {
            let frame = Frame::critical_error(
                "deadline_exceeded",
                "pipeline_controller",
                "request deadline exceeded",
                "no SQL produced",
                "retry with a narrower question or contact support",
            );
            return BoundaryCheck::Stop(Some(frame), "deadline_exceeded");
        }
        BoundaryCheck::Continue
    }

    /// Runs the full P0-P7 sequence for `request`, yielding `Frame`s as
    /// each phase produces output. `cancellation` is polled between every
    /// phase (spec §5); a client disconnect or deadline breach stops the
    /// stream with a terminal `CANCELLED` or `CRITICAL_ERROR` frame.
    pub fn run(self, request: SqlRequest, cancellation: CancellationToken) -> impl Stream<Item = Frame> {
        stream! {
            let request_id = Uuid::new_v4();
            let deadline = tokio::time::Instant::now() + Duration::from_millis(self.deadlines.deadline_ms);
            let mut state = RequestState::new(request_id, request, self.deadlines.max_escalation_attempts, cancellation);

            yield Frame::ThothLog(format!("request {request_id} received"));

            // P1: validate + translate.
            state.execution.start_phase("P1", Utc::now());
            state.question_language = detect_language(&state.request.question).to_string();
            state.database_language = self.runtime.workspace_database_language();

            let mut vars = HashMap::new();
            vars.insert("question", state.request.question.clone());
            vars.insert("used_mschema", self.runtime.context_retriever.full_mschema());
            match self.runtime.validator_agent.call::<ValidatorOutput>(&vars).await {
                Ok(output) if !output.valid => {
                    let err = CoreError::InvalidQuestion(output.reason);
                    yield Frame::critical_error(err.critical_kind(), "validator", &err.to_string(), "no SQL produced", "rephrase the question");
                    self.write_log(&state, None, Some(err.critical_kind())).await;
                    return;
                },
                Ok(_) => {},
                Err(err) => {
                    yield Frame::critical_error(err.critical_kind(), "validator", &err.to_string(), "no SQL produced", "retry later");
                    self.write_log(&state, None, Some(err.critical_kind())).await;
                    return;
                },
            }

            if state.question_language != state.database_language {
                let mut vars = HashMap::new();
                vars.insert("question", state.request.question.clone());
                vars.insert("question_language", state.question_language.clone());
                vars.insert("database_language", state.database_language.clone());
                match self.runtime.translator_agent.call::<TranslatorOutput>(&vars).await {
                    Ok(output) => state.translated_question = Some(output.translated),
                    Err(err) => {
                        tracing::warn!(error = %err, "translation failed, continuing with original question");
                        state.push_warning(format!("translation unavailable: {err}"));
                    },
                }
            }
            state.execution.end_phase("P1", Utc::now());

            if let BoundaryCheck::Stop(frame, tag) = self.check_boundary(&state, deadline) {
                if let Some(f) = frame { yield f; }
                self.write_log(&state, None, Some(tag)).await;
                return;
            }

            // P2: keyword extraction.
            state.execution.start_phase("P2", Utc::now());
            let mut vars = HashMap::new();
            vars.insert("question", state.effective_question().to_string());
            match self.runtime.keyword_extractor_agent.call::<KeywordOutput>(&vars).await {
                Ok(output) => state.keywords = output.keywords,
                Err(err) => {
                    yield Frame::critical_error(err.critical_kind(), "keyword_extractor", &err.to_string(), "no SQL produced", "retry later");
                    self.write_log(&state, None, Some(err.critical_kind())).await;
                    return;
                },
            }
            state.execution.end_phase("P2", Utc::now());
            yield Frame::ThothLog(format!("extracted {} keywords", state.keywords.len()));

            if let BoundaryCheck::Stop(frame, tag) = self.check_boundary(&state, deadline) {
                if let Some(f) = frame { yield f; }
                self.write_log(&state, None, Some(tag)).await;
                return;
            }

            // P3: context retrieval.
            state.execution.start_phase("P3", Utc::now());
            let flags = state.request.flags;
            let retrieved = self
                .runtime
                .context_retriever
                .retrieve(
                    state.effective_question(),
                    &state.keywords,
                    state.request.workspace_id,
                    flags.use_schema,
                    flags.use_lsh,
                    flags.use_vector,
                    flags.use_examples,
                    8,
                    4,
                )
                .await;
            let retrieved = match retrieved {
                Ok(r) => r,
                Err(err) => {
                    yield Frame::critical_error(err.critical_kind(), "context_retriever", &err.to_string(), "no SQL produced", "retry later");
                    self.write_log(&state, None, Some(err.critical_kind())).await;
                    return;
                },
            };
            state.evidence = retrieved.evidence;
            state.gold_examples = retrieved.gold_examples;
            state.lsh_columns = retrieved.lsh_columns;
            state.schema_link_strategy = Some(retrieved.schema_link_strategy);
            state.full_mschema = Some(retrieved.full_mschema);
            state.reduced_mschema = Some(retrieved.reduced_mschema);
            state.used_mschema = Some(retrieved.used_mschema);
            state.execution.end_phase("P3", Utc::now());
            yield Frame::ThothLog(format!(
                "context ready ({:?}, {} evidence hits)",
                state.schema_link_strategy.unwrap(),
                state.evidence.len()
            ));

            if let BoundaryCheck::Stop(frame, tag) = self.check_boundary(&state, deadline) {
                if let Some(f) = frame { yield f; }
                self.write_log(&state, None, Some(tag)).await;
                return;
            }

            // P4: precompute tests.
            state.execution.start_phase("P4", Utc::now());
            match self.precompute_tests(&mut state).await {
                Ok(()) => {},
                Err(err) => {
                    yield Frame::critical_error(err.critical_kind(), "test_gen", &err.to_string(), "no SQL produced", "retry later");
                    self.write_log(&state, None, Some(err.critical_kind())).await;
                    return;
                },
            }
            state.execution.end_phase("P4", Utc::now());
            yield Frame::ThothLog(format!("{} tests retained after filtering", state.filtered_tests.len()));

            if let BoundaryCheck::Stop(frame, tag) = self.check_boundary(&state, deadline) {
                if let Some(f) = frame { yield f; }
                self.write_log(&state, None, Some(tag)).await;
                return;
            }

            // P5/P6 escalation loop.
            let mut level = GeneratorLevel::Basic;
            let mut terminal_error: Option<(Frame, &'static str)> = None;
            loop {
                if let BoundaryCheck::Stop(frame, tag) = self.check_boundary(&state, deadline) {
                    terminal_error = Some((frame.unwrap_or(Frame::Cancelled), tag));
                    break;
                }

                state.execution.start_phase("P5", Utc::now());
                let generation = self.generate_and_validate(&state, level).await;
                state.execution.end_phase("P5", Utc::now());

                let candidates = match generation {
                    Ok(candidates) => candidates,
                    Err(CoreError::NoSqlGenerated) => {
                        match self.escalate(&mut state, level) {
                            Some(next) => { level = next; continue; },
                            None => {
                                terminal_error = Some((
                                    Frame::critical_error(
                                        "no_sql_generated",
                                        "agent_pool",
                                        "no SQL candidate survived validation after escalation",
                                        "no SQL produced",
                                        "rephrase the question or check workspace schema access",
                                    ),
                                    "no_sql_generated",
                                ));
                                break;
                            },
                        }
                    },
                    Err(err) => {
                        terminal_error = Some((
                            Frame::critical_error(err.critical_kind(), "validator", &err.to_string(), "no SQL produced", "retry later"),
                            err.critical_kind(),
                        ));
                        break;
                    },
                };

                for candidate in &candidates {
                    yield Frame::sql_formatted(&candidate.normalized);
                    if !candidate.probe_ok {
                        if let Some(error) = &candidate.probe_error {
                            yield Frame::QueryError(serde_json::json!({ "sql": candidate.normalized, "error": error }));
                        }
                    }
                }
                state.generated_sqls = candidates;

                if state.generated_sqls.iter().all(|c| !c.probe_ok) {
                    match self.escalate(&mut state, level) {
                        Some(next) => { level = next; continue; },
                        None => {
                            terminal_error = Some((
                                Frame::critical_error(
                                    "database_error",
                                    "db_manager",
                                    "every candidate failed the database probe",
                                    "no SQL produced",
                                    "verify the workspace database connection",
                                ),
                                "database_error",
                            ));
                            break;
                        },
                    }
                }

                state.execution.start_phase("P6", Utc::now());
                let eval = self
                    .runtime
                    .evaluator
                    .evaluate(&state.generated_sqls, &state.filtered_tests, self.deadlines.db_timeout_ms)
                    .await;
                state.evaluation_matrix = eval.matrix;
                state.pass_rate = eval.pass_rate;

                let outcome = self
                    .runtime
                    .selector
                    .select(
                        state.effective_question(),
                        &state.generated_sqls,
                        &state.filtered_tests,
                        &state.pass_rate,
                        &state.evaluation_matrix,
                        state.escalation_attempts,
                        state.max_escalation_attempts,
                    )
                    .await;
                state.execution.end_phase("P6", Utc::now());

                match outcome {
                    SelectionOutcome::Selected { index, status, case, warning } => {
                        if let Some(w) = warning {
                            state.push_warning(w.clone());
                            yield Frame::SystemWarning(w);
                        }
                        state.selected_sql = Some(index);
                        state.sql_status = status;
                        state.evaluation_case = Some(case);
                        break;
                    },
                    SelectionOutcome::Escalate => {
                        match self.escalate(&mut state, level) {
                            Some(next) => { level = next; continue; },
                            None => {
                                terminal_error = Some((
                                    Frame::critical_error(
                                        "evaluation_failed",
                                        "selector",
                                        "selector could not reach a decision after escalation",
                                        "no SQL produced",
                                        "review generated tests and schema coverage",
                                    ),
                                    "evaluation_failed",
                                ));
                                break;
                            },
                        }
                    },
                    SelectionOutcome::Failed(case) => {
                        state.evaluation_case = Some(case);
                        state.sql_status = SqlStatus::Failed;
                        terminal_error = Some((
                            Frame::critical_error(
                                "evaluation_failed",
                                "selector",
                                "no candidate reached the acceptance threshold",
                                "no SQL produced",
                                "review generated tests and schema coverage",
                            ),
                            "evaluation_failed",
                        ));
                        break;
                    },
                }
            }

            if let Some((frame, tag)) = terminal_error {
                yield frame;
                self.write_log(&state, None, Some(tag)).await;
                return;
            }

            // Belt-and-suspenders confirmation.
            if state.request.flags.belt_and_suspenders {
                if let Some(candidate) = state.selected_candidate().cloned() {
                    let confirm_started = std::time::Instant::now();
                    let confirm = self.runtime.selector.confirm(&self.runtime.evaluator, &candidate, &state.filtered_tests).await;
                    state.execution.belt_and_suspenders_ms = Some(confirm_started.elapsed().as_millis() as u64);
                    if confirm.pass_rate.first().copied().unwrap_or(0.0) < self.deadlines.eval_threshold {
                        state.sql_status = SqlStatus::Silver;
                        state.evaluation_case = Some(EvaluationCase::C);
                        let warning = "belt-and-suspenders confirmation pass dropped below threshold, downgraded to silver".to_string();
                        state.push_warning(warning.clone());
                        yield Frame::SystemWarning(warning);
                    }
                }
            }

            // P7: respond.
            state.execution.start_phase("P7", Utc::now());
            let selected_sql = state.selected_candidate().map(|c| c.normalized.clone());
            if let Some(sql) = &selected_sql {
                state.last_sql = Some(sql.clone());
                yield Frame::sql_ready(sql, state.request.workspace_id);

                if state.request.flags.explain_generated_query {
                    match self.runtime.explainer.explain(state.effective_question(), sql, &state.question_language).await {
                        Ok(text) => yield Frame::sql_explanation(&text, &state.question_language),
                        Err(err) => {
                            tracing::warn!(error = %err, "explanation failed, continuing without it");
                            state.push_warning(format!("explanation unavailable: {err}"));
                        },
                    }
                }
            }
            state.execution.end_phase("P7", Utc::now());

            yield Frame::result(selected_sql.is_some(), selected_sql.as_deref());

            let total_duration_ms = state
                .execution
                .phase_start
                .get("P1")
                .map(|start| (Utc::now() - *start).num_milliseconds());
            self.write_log(&state, total_duration_ms, None).await;
        }
    }

    /// Generates `workspace.number_of_sqls_to_generate` candidates at
    /// `level` and runs each through `SqlOutputValidator`.
    async fn generate_and_validate(&self, state: &RequestState, level: GeneratorLevel) -> Result<Vec<Candidate>, CoreError> {
        let mut vars = HashMap::new();
        vars.insert("question", state.effective_question().to_string());
        vars.insert("used_mschema", state.used_mschema.clone().unwrap_or_default());
        vars.insert("dialect", format!("{:?}", self.runtime.db.dialect()));
        vars.insert("evidence", state.evidence.iter().map(|e| e.text.clone()).collect::<Vec<_>>().join("\n"));
        vars.insert(
            "examples",
            state.gold_examples.iter().map(|e| format!("Q: {}\nSQL: {}", e.question, e.sql)).collect::<Vec<_>>().join("\n"),
        );

        let raw_candidates = self.runtime.agent_pool.generate_sql(level, &vars, self.runtime.number_of_sqls_to_generate()).await?;

        let mut validated = Vec::with_capacity(raw_candidates.len());
        for candidate in raw_candidates {
            validated.push(self.runtime.sql_validator.validate(candidate, self.deadlines.db_timeout_ms).await);
        }
        Ok(validated)
    }

    /// Generates, deduplicates, reduces, and classifies the test set for
    /// this request (P4, spec §4.1).
    async fn precompute_tests(&self, state: &mut RequestState) -> Result<(), CoreError> {
        let mut vars = HashMap::new();
        vars.insert("question", state.effective_question().to_string());
        vars.insert("used_mschema", state.used_mschema.clone().unwrap_or_default());
        vars.insert("evidence", state.evidence.iter().map(|e| e.text.clone()).collect::<Vec<_>>().join("\n"));

        let generated = self.runtime.agent_pool.generate_tests(&vars, self.runtime.number_of_tests_to_generate()).await?;

        let mut seen = HashSet::new();
        let mut deduped: Vec<Test> = Vec::new();
        for test in generated {
            if seen.insert(test.normalized_text()) {
                deduped.push(test);
            }
        }

        let threshold = 5;
        let reduced = if deduped.len() > threshold && self.runtime.number_of_test_generators() > 1 {
            self.runtime.test_reducer.reduce(deduped, threshold).await
        } else {
            deduped
        };

        let mut tests = reduced;
        let schema_identifiers = self.runtime.schema_identifiers();
        self.runtime.relevance_guard.classify(
            &mut tests,
            state.effective_question(),
            &state.evidence,
            &schema_identifiers,
            &state.question_language,
            &state.database_language,
        );

        let evidence_texts: HashSet<String> = state.evidence.iter().map(|e| e.text.clone()).collect();
        for test in &mut tests {
            if evidence_texts.iter().any(|e| test.text.contains(e.as_str())) {
                test.evidence_critical = true;
            }
        }
        tests.retain(|t| t.relevance != Relevance::Irrelevant || t.evidence_critical);

        state.filtered_tests = tests;
        Ok(())
    }

    /// Escalates to the next `GeneratorLevel` if one remains and the
    /// attempt budget allows it, bumping `escalation_attempts` (spec
    /// §4.1). `None` means escalation is exhausted and the caller should
    /// treat the current outcome as final.
    fn escalate(&self, state: &mut RequestState, level: GeneratorLevel) -> Option<GeneratorLevel> {
        if state.escalation_attempts >= state.max_escalation_attempts {
            return None;
        }
        let next = level.escalate()?;
        state.escalation_attempts += 1;
        tracing::info!(from = ?level, to = ?next, attempts = state.escalation_attempts, "escalating generator level");
        Some(next)
    }

    async fn write_log(&self, state: &RequestState, total_duration_ms: Option<i64>, error_type: Option<&str>) {
        let phase_duration_ms = serde_json::to_string(&state.execution.phase_duration_ms).unwrap_or_default();
        let entry = RequestLogEntry {
            request_id: state.request_id,
            workspace_id: state.request.workspace_id,
            username: state.request.username.clone(),
            question: state.request.question.clone(),
            functionality_level: format!("{:?}", state.request.functionality_level),
            evaluation_case: state.evaluation_case,
            sql_status: state.sql_status,
            escalation_attempts: state.escalation_attempts,
            selected_sql: state.last_sql.clone(),
            phase_duration_ms,
            total_duration_ms,
            error_type: error_type.map(str::to_string),
        };
        if let Err(err) = self.log.insert(&entry).await {
            tracing::error!(error = %err, "failed to persist request log entry");
        }
    }
}
