//! Implements the four-case selection policy (A/B/C/D) and the
//! belt-and-suspenders confirmation pass (C9).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::agent::adapter::AgentAdapter;
use crate::evaluator::{EvaluationResult, Evaluator};
use crate::models::candidate::Candidate;
use crate::models::request::{EvalCell, EvaluationCase, SqlStatus};
use crate::models::test_case::Test;

#[derive(Debug, Deserialize)]
struct SelectorOutput {
    index: usize,
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct SupervisorOutput {
    approved: bool,
    reasoning: String,
}

pub enum SelectionOutcome {
    Selected { index: usize, status: SqlStatus, case: EvaluationCase, warning: Option<String> },
    Escalate,
    Failed(EvaluationCase),
}

pub struct Selector {
    selector_agent: Arc<AgentAdapter>,
    supervisor_agent: Arc<AgentAdapter>,
    threshold: f32,
}

impl Selector {
    pub fn new(selector_agent: Arc<AgentAdapter>, supervisor_agent: Arc<AgentAdapter>, threshold: f32) -> Self {
        Self { selector_agent, supervisor_agent, threshold }
    }

    pub async fn select(
        &self,
        question: &str,
        candidates: &[Candidate],
        tests: &[Test],
        pass_rate: &[f32],
        matrix: &HashMap<(usize, usize), EvalCell>,
        escalation_attempts: u32,
        max_escalation_attempts: u32,
    ) -> SelectionOutcome {
        // A candidate that fails one of its own evidence-critical tests is
        // disqualified from every case, not just Case A: spec S5 expects it
        // passed over for the next best candidate or an escalation, never
        // handed to the Case C supervisor as a borderline-acceptable SQL.
        let eligible: Vec<usize> = (0..candidates.len()).filter(|&i| evidence_critical_ok(i, tests, matrix)).collect();

        let perfect: Vec<usize> = eligible.iter().copied().filter(|&i| pass_rate[i] >= 1.0).collect();

        if perfect.len() == 1 {
            let i = perfect[0];
            return SelectionOutcome::Selected { index: i, status: SqlStatus::Gold, case: EvaluationCase::A, warning: None };
        }

        if perfect.len() >= 2 {
            return self.resolve_case_b(question, candidates, &perfect).await;
        }

        let top = eligible
            .iter()
            .copied()
            .max_by(|&a, &b| pass_rate[a].partial_cmp(&pass_rate[b]).unwrap_or(std::cmp::Ordering::Equal));

        if let Some(top) = top {
            if pass_rate[top] >= self.threshold {
                return self.resolve_case_c(question, candidates, top, pass_rate[top], escalation_attempts, max_escalation_attempts).await;
            }
        }

        if escalation_attempts < max_escalation_attempts {
            SelectionOutcome::Escalate
        } else {
            SelectionOutcome::Failed(EvaluationCase::D)
        }
    }

    async fn resolve_case_b(&self, question: &str, candidates: &[Candidate], perfect: &[usize]) -> SelectionOutcome {
        let candidate_listing = perfect
            .iter()
            .map(|&i| format!("{i}. {}", candidates[i].normalized))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("question", question.to_string());
        vars.insert("candidates", candidate_listing);

        let chosen = match self.selector_agent.call::<SelectorOutput>(&vars).await {
            Ok(output) if perfect.contains(&output.index) => {
                tracing::info!(index = output.index, reasoning = %output.reasoning, "selector resolved tie in case B");
                output.index
            },
            Ok(output) => {
                tracing::warn!(
                    returned_index = output.index,
                    "selector returned an index outside the tied set, falling back to tie-break"
                );
                tie_break(perfect, candidates)
            },
            Err(err) => {
                tracing::warn!(error = %err, "selector agent failed in case B, falling back to tie-break");
                tie_break(perfect, candidates)
            },
        };

        SelectionOutcome::Selected { index: chosen, status: SqlStatus::Gold, case: EvaluationCase::B, warning: None }
    }

    async fn resolve_case_c(
        &self,
        question: &str,
        candidates: &[Candidate],
        top: usize,
        top_rate: f32,
        escalation_attempts: u32,
        max_escalation_attempts: u32,
    ) -> SelectionOutcome {
        let mut vars = HashMap::new();
        vars.insert("question", question.to_string());
        vars.insert("sql", candidates[top].normalized.clone());
        vars.insert("pass_rate", format!("{top_rate:.2}"));

        match self.supervisor_agent.call::<SupervisorOutput>(&vars).await {
            Ok(output) if output.approved => {
                tracing::info!(index = top, reasoning = %output.reasoning, "supervisor approved borderline candidate");
                SelectionOutcome::Selected {
                    index: top,
                    status: SqlStatus::Silver,
                    case: EvaluationCase::C,
                    warning: Some(format!("borderline acceptance at pass_rate={top_rate:.2}: {}", output.reasoning)),
                }
            },
            Ok(_) | Err(_) => {
                if escalation_attempts < max_escalation_attempts {
                    SelectionOutcome::Escalate
                } else {
                    SelectionOutcome::Failed(EvaluationCase::C)
                }
            },
        }
    }

    /// Re-runs `Evaluator` against an independent agent pool's
    /// re-generated tests as a confirmation pass (spec §4.9). If the
    /// confirmation pass_rate drops below threshold, the caller should
    /// degrade the selection to Case C / Silver.
    pub async fn confirm(&self, evaluator: &Evaluator, candidate: &Candidate, independent_tests: &[Test]) -> EvaluationResult {
        evaluator.evaluate(std::slice::from_ref(candidate), independent_tests, 10_000).await
    }
}

fn evidence_critical_ok(candidate_index: usize, tests: &[Test], matrix: &HashMap<(usize, usize), EvalCell>) -> bool {
    tests
        .iter()
        .enumerate()
        .filter(|(_, t)| t.evidence_critical)
        .all(|(ti, _)| matches!(matrix.get(&(candidate_index, ti)), Some(EvalCell::Ok)))
}

/// Prefers lower candidate complexity, then earlier generation timestamp
/// (spec §4.9 tie-breaking).
fn tie_break(indices: &[usize], candidates: &[Candidate]) -> usize {
    *indices
        .iter()
        .min_by(|&&a, &&b| {
            candidates[a]
                .complexity
                .cmp(&candidates[b].complexity)
                .then_with(|| candidates[a].generated_at.cmp(&candidates[b].generated_at))
        })
        .expect("indices non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::client::ModelClient;
    use crate::models::workspace::{AgentConfig, AgentKind, ModelHandle};
    use chrono::Utc;
    use std::time::Duration;

    fn dummy_agent(kind: AgentKind) -> Arc<AgentAdapter> {
        let model = ModelHandle {
            provider: "openai".to_string(),
            model_id: "gpt-4o-mini".to_string(),
            api_key_ref: "TEST_KEY".to_string(),
            base_url: None,
            temperature: 0.2,
            max_tokens: 256,
        };
        let config = AgentConfig {
            name: format!("{kind:?}"),
            kind,
            primary_model: model,
            fallback_models: Vec::new(),
            template_key: kind.default_template_key().to_string(),
            output_schema: "unused".to_string(),
        };
        Arc::new(AgentAdapter::new(ModelClient::new(), config, Duration::from_secs(1)))
    }

    fn selector() -> Selector {
        Selector::new(dummy_agent(AgentKind::Selector), dummy_agent(AgentKind::Supervisor), 0.90)
    }

    fn candidate(complexity: u32) -> Candidate {
        let mut c = Candidate::new(format!("SELECT {complexity}"), crate::models::candidate::GeneratorLevel::Basic, Utc::now());
        c.normalized = c.raw.clone();
        c.complexity = complexity;
        c
    }

    #[tokio::test]
    async fn single_perfect_candidate_is_case_a_gold() {
        let sel = selector();
        let candidates = vec![candidate(5), candidate(3)];
        let tests = vec![];
        let pass_rate = vec![1.0, 0.5];
        let matrix = HashMap::new();

        let outcome = sel.select("q", &candidates, &tests, &pass_rate, &matrix, 0, 2).await;
        match outcome {
            SelectionOutcome::Selected { index, status, case, .. } => {
                assert_eq!(index, 0);
                assert_eq!(status, SqlStatus::Gold);
                assert_eq!(case, EvaluationCase::A);
            },
            _ => panic!("expected case A selection"),
        }
    }

    #[tokio::test]
    async fn single_perfect_candidate_failing_evidence_critical_test_is_not_selected() {
        let sel = selector();
        let candidates = vec![candidate(5)];
        let tests = vec![Test {
            text: "evidence check".to_string(),
            expected_behavior: String::new(),
            evidence_critical: true,
            relevance: crate::models::test_case::Relevance::Strict,
            bm25_score: 0.0,
            structural_score: 0.0,
        }];
        let pass_rate = vec![1.0];
        let mut matrix = HashMap::new();
        matrix.insert((0, 0), EvalCell::Ko);

        // Escalation budget already exhausted: with the sole candidate
        // disqualified by the evidence-critical gate, there is nothing left
        // to hand to Case C, so the outcome is a hard failure rather than
        // another escalation attempt.
        let outcome = sel.select("q", &candidates, &tests, &pass_rate, &matrix, 2, 2).await;
        assert!(matches!(outcome, SelectionOutcome::Failed(EvaluationCase::D)));
    }

    #[tokio::test]
    async fn single_perfect_candidate_failing_evidence_critical_test_escalates_while_budget_remains() {
        let sel = selector();
        let candidates = vec![candidate(5)];
        let tests = vec![Test {
            text: "evidence check".to_string(),
            expected_behavior: String::new(),
            evidence_critical: true,
            relevance: crate::models::test_case::Relevance::Strict,
            bm25_score: 0.0,
            structural_score: 0.0,
        }];
        let pass_rate = vec![1.0];
        let mut matrix = HashMap::new();
        matrix.insert((0, 0), EvalCell::Ko);

        let outcome = sel.select("q", &candidates, &tests, &pass_rate, &matrix, 0, 2).await;
        assert!(matches!(outcome, SelectionOutcome::Escalate));
    }

    #[tokio::test]
    async fn all_below_threshold_escalates_while_budget_remains() {
        let sel = selector();
        let candidates = vec![candidate(5)];
        let tests = vec![];
        let pass_rate = vec![0.5];
        let matrix = HashMap::new();

        let outcome = sel.select("q", &candidates, &tests, &pass_rate, &matrix, 0, 2).await;
        assert!(matches!(outcome, SelectionOutcome::Escalate));
    }

    #[tokio::test]
    async fn all_below_threshold_fails_once_escalation_exhausted() {
        let sel = selector();
        let candidates = vec![candidate(5)];
        let tests = vec![];
        let pass_rate = vec![0.5];
        let matrix = HashMap::new();

        let outcome = sel.select("q", &candidates, &tests, &pass_rate, &matrix, 2, 2).await;
        assert!(matches!(outcome, SelectionOutcome::Failed(EvaluationCase::D)));
    }

    #[test]
    fn tie_break_prefers_lower_complexity() {
        let candidates = vec![candidate(10), candidate(2), candidate(7)];
        assert_eq!(tie_break(&[0, 1, 2], &candidates), 1);
    }

    #[test]
    fn evidence_critical_ok_requires_every_evidence_critical_test_to_pass() {
        let tests = vec![
            Test {
                text: "a".to_string(),
                expected_behavior: String::new(),
                evidence_critical: true,
                relevance: crate::models::test_case::Relevance::Strict,
                bm25_score: 0.0,
                structural_score: 0.0,
            },
            Test {
                text: "b".to_string(),
                expected_behavior: String::new(),
                evidence_critical: false,
                relevance: crate::models::test_case::Relevance::Weak,
                bm25_score: 0.0,
                structural_score: 0.0,
            },
        ];
        let mut matrix = HashMap::new();
        matrix.insert((0, 0), EvalCell::Ok);
        matrix.insert((0, 1), EvalCell::Ko);
        assert!(evidence_critical_ok(0, &tests, &matrix));

        matrix.insert((0, 0), EvalCell::Ko);
        assert!(!evidence_critical_ok(0, &tests, &matrix));
    }
}
