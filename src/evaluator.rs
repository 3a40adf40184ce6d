//! Runs each (test, candidate) pair against the target database and
//! produces the OK/KO matrix and per-candidate pass rate (C8).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::external::db_manager::{DbManager, FetchMode};
use crate::models::candidate::Candidate;
use crate::models::request::EvalCell;
use crate::models::test_case::Test;

const MAX_CONCURRENT_DB_CALLS: usize = 4;

pub struct Evaluator {
    db: Arc<dyn DbManager>,
}

pub struct EvaluationResult {
    pub matrix: HashMap<(usize, usize), EvalCell>,
    pub pass_rate: Vec<f32>,
}

impl Evaluator {
    pub fn new(db: Arc<dyn DbManager>) -> Self {
        Self { db }
    }

    /// Evaluates every (candidate, test) pair with bounded concurrency.
    /// A per-cell DB error marks that cell `Error` without failing the
    /// whole pass; only when *every* cell across the matrix errors does
    /// the caller treat it as a database-wide failure (P6, spec §4.1).
    pub async fn evaluate(&self, candidates: &[Candidate], tests: &[Test], db_timeout_ms: u64) -> EvaluationResult {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DB_CALLS));
        let mut set = tokio::task::JoinSet::new();

        for (ci, candidate) in candidates.iter().enumerate() {
            for (ti, test) in tests.iter().enumerate() {
                let db = self.db.clone();
                let sem = semaphore.clone();
                let sql = candidate.normalized.clone();
                let assertion = test.text.clone();
                set.spawn(async move {
                    let _permit = sem.acquire_owned().await.expect("semaphore closed");
                    let wrapped = format!("WITH candidate AS ({sql}) {assertion}");
                    let cell = match db.execute(&wrapped, FetchMode::One, db_timeout_ms).await {
                        Ok(rows) => {
                            if rows.rows.first().and_then(|r| r.first()).map(truthy).unwrap_or(false) {
                                EvalCell::Ok
                            } else {
                                EvalCell::Ko
                            }
                        },
                        Err(_) => EvalCell::Error,
                    };
                    (ci, ti, cell)
                });
            }
        }

        let mut matrix = HashMap::new();
        while let Some(joined) = set.join_next().await {
            if let Ok((ci, ti, cell)) = joined {
                matrix.insert((ci, ti), cell);
            }
        }

        let pass_rate = (0..candidates.len())
            .map(|ci| {
                if tests.is_empty() {
                    return 0.0;
                }
                let ok = (0..tests.len()).filter(|ti| matches!(matrix.get(&(ci, *ti)), Some(EvalCell::Ok))).count();
                ok as f32 / tests.len() as f32
            })
            .collect();

        EvaluationResult { matrix, pass_rate }
    }
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64().map(|i| i != 0).unwrap_or(true),
        serde_json::Value::Null => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::external::db_manager::{Dialect, QueryRows};
    use async_trait::async_trait;
    use chrono::Utc;

    /// Returns OK for every assertion containing "PASS", KO otherwise,
    /// and errors on a wrapped statement containing "BOOM" so per-cell
    /// DB errors can be exercised without a real database.
    struct ScriptedDb;

    #[async_trait]
    impl DbManager for ScriptedDb {
        async fn execute(&self, sql: &str, _fetch: FetchMode, _timeout_ms: u64) -> Result<QueryRows, CoreError> {
            if sql.contains("BOOM") {
                return Err(CoreError::DatabaseError("scripted failure".to_string()));
            }
            let truthy = sql.contains("PASS");
            Ok(QueryRows { columns: vec!["ok".to_string()], rows: vec![vec![serde_json::json!(truthy)]] })
        }

        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }
    }

    fn candidate(sql: &str) -> Candidate {
        Candidate::new(sql.to_string(), crate::models::candidate::GeneratorLevel::Basic, Utc::now())
    }

    fn test_case(text: &str) -> Test {
        Test {
            text: text.to_string(),
            expected_behavior: String::new(),
            evidence_critical: false,
            relevance: crate::models::test_case::Relevance::Strict,
            bm25_score: 0.0,
            structural_score: 0.0,
        }
    }

    #[tokio::test]
    async fn pass_rate_reflects_ok_fraction() {
        let evaluator = Evaluator::new(Arc::new(ScriptedDb));
        let candidates = vec![candidate("SELECT 1")];
        let tests = vec![test_case("CHECK PASS"), test_case("CHECK FAIL"), test_case("CHECK PASS")];

        let result = evaluator.evaluate(&candidates, &tests, 1_000).await;
        assert!((result.pass_rate[0] - (2.0 / 3.0)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_test_set_yields_zero_pass_rate() {
        let evaluator = Evaluator::new(Arc::new(ScriptedDb));
        let candidates = vec![candidate("SELECT 1")];
        let result = evaluator.evaluate(&candidates, &[], 1_000).await;
        assert_eq!(result.pass_rate[0], 0.0);
    }

    #[tokio::test]
    async fn db_error_marks_cell_error_not_ko() {
        let evaluator = Evaluator::new(Arc::new(ScriptedDb));
        let candidates = vec![candidate("BOOM")];
        let tests = vec![test_case("CHECK PASS")];
        let result = evaluator.evaluate(&candidates, &tests, 1_000).await;
        assert_eq!(result.matrix.get(&(0, 0)), Some(&EvalCell::Error));
        assert_eq!(result.pass_rate[0], 0.0);
    }

    #[test]
    fn truthy_treats_zero_as_false_and_null_as_false() {
        assert!(!truthy(&serde_json::json!(0)));
        assert!(truthy(&serde_json::json!(1)));
        assert!(!truthy(&serde_json::Value::Null));
        assert!(truthy(&serde_json::json!("anything")));
    }
}
