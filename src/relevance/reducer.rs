//! Collapses near-duplicate tests once exact-dedup still leaves the set
//! over threshold (C7). Exact dedup itself happens in P4 before this
//! runs (`Test::normalized_text`); this stage handles near-duplicates an
//! LLM can recognize but a string comparison can't.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::agent::adapter::AgentAdapter;
use crate::models::test_case::Test;

#[derive(Debug, Deserialize)]
struct ReducerOutput {
    kept_indices: Vec<usize>,
}

pub struct TestReducer {
    agent: Arc<AgentAdapter>,
}

impl TestReducer {
    pub fn new(agent: Arc<AgentAdapter>) -> Self {
        Self { agent }
    }

    /// Reduces `tests` down when it exceeds `threshold`, leaving it
    /// untouched otherwise. On agent failure, falls back to keeping the
    /// first `threshold` tests and logs a warning rather than failing
    /// the request — test reduction is an optimization, not a
    /// correctness requirement.
    pub async fn reduce(&self, tests: Vec<Test>, threshold: usize) -> Vec<Test> {
        if tests.len() <= threshold {
            return tests;
        }

        let listing = tests
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{i}. {}", t.text))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("tests", listing);

        match self.agent.call::<ReducerOutput>(&vars).await {
            Ok(output) => {
                let kept: Vec<Test> = output
                    .kept_indices
                    .into_iter()
                    .filter_map(|i| tests.get(i).cloned())
                    .collect();
                if kept.is_empty() { tests } else { kept }
            },
            Err(err) => {
                tracing::warn!(error = %err, "test reducer agent failed, keeping first N tests");
                tests.into_iter().take(threshold).collect()
            },
        }
    }
}
