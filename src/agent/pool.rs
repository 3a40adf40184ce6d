//! Holds per-level SQL-generation agents and the test-generation agent for
//! a workspace, dispatching parallel fan-out over a `tokio::task::JoinSet`
//! (C3). Results are returned in completion order, not dispatch order
//! (spec §5 ordering guarantee).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio::task::JoinSet;

use crate::agent::adapter::AgentAdapter;
use crate::error::CoreError;
use crate::models::candidate::{Candidate, GeneratorLevel};
use crate::models::test_case::{Relevance, Test};

#[derive(Debug, Deserialize)]
struct SqlOutput {
    sql: String,
}

#[derive(Debug, Deserialize)]
struct TestGenOutput {
    tests: Vec<TestDraft>,
}

#[derive(Debug, Deserialize)]
struct TestDraft {
    text: String,
    expected_behavior: String,
}

pub struct AgentPool {
    sql_agents: HashMap<GeneratorLevel, Arc<AgentAdapter>>,
    test_gen_agent: Arc<AgentAdapter>,
}

impl AgentPool {
    pub fn new(sql_agents: HashMap<GeneratorLevel, Arc<AgentAdapter>>, test_gen_agent: Arc<AgentAdapter>) -> Self {
        Self { sql_agents, test_gen_agent }
    }

    /// Dispatches `count` parallel SQL-generation calls at the given level
    /// across the fixed temperature ramp (0.2/0.5/0.8, spec §4.1 P5),
    /// cycling through the ramp if `count` exceeds its length. Individual
    /// generator failures are absorbed; only a total wipeout surfaces as
    /// an error to the caller (P5 escalates in that case).
    pub async fn generate_sql(
        &self,
        level: GeneratorLevel,
        vars: &HashMap<&str, String>,
        count: usize,
    ) -> Result<Vec<Candidate>, CoreError> {
        const TEMPERATURES: [f32; 3] = [0.2, 0.5, 0.8];

        let agent = self
            .sql_agents
            .get(&level)
            .ok_or_else(|| CoreError::TemplateError(format!("no sql agent configured for level {level:?}")))?
            .clone();

        let mut set = JoinSet::new();
        for i in 0..count {
            let temperature = TEMPERATURES[i % TEMPERATURES.len()];
            let agent = agent.clone();
            let vars = owned_vars(vars);
            set.spawn(async move {
                let vars_ref: HashMap<&str, String> = vars.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
                agent.call_at_temperature::<SqlOutput>(&vars_ref, Some(temperature)).await
            });
        }

        let mut candidates = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(output)) => {
                    candidates.push(Candidate::new(output.sql, level, Utc::now()));
                },
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "sql generator failed, continuing with remaining generators");
                },
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "sql generator task panicked");
                },
            }
        }

        if candidates.is_empty() {
            return Err(CoreError::NoSqlGenerated);
        }
        Ok(candidates)
    }

    /// Dispatches `count` parallel test-generation calls with a temperature
    /// ramp evenly spaced from 0.5 to 1.0 (spec §4.1 P4).
    pub async fn generate_tests(&self, vars: &HashMap<&str, String>, count: usize) -> Result<Vec<Test>, CoreError> {
        let agent = self.test_gen_agent.clone();
        let count = count.max(1);

        let mut set = JoinSet::new();
        for i in 0..count {
            let temperature = if count == 1 { 0.5 } else { 0.5 + 0.5 * (i as f32) / ((count - 1) as f32) };
            let agent = agent.clone();
            let vars = owned_vars(vars);
            set.spawn(async move {
                let vars_ref: HashMap<&str, String> = vars.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
                agent.call_at_temperature::<TestGenOutput>(&vars_ref, Some(temperature)).await
            });
        }

        let mut tests = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(output)) => {
                    for draft in output.tests {
                        tests.push(Test {
                            text: draft.text,
                            expected_behavior: draft.expected_behavior,
                            evidence_critical: false,
                            relevance: Relevance::Irrelevant,
                            bm25_score: 0.0,
                            structural_score: 0.0,
                        });
                    }
                },
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "test generator failed, continuing with remaining generators");
                },
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "test generator task panicked");
                },
            }
        }

        Ok(tests)
    }
}

fn owned_vars(vars: &HashMap<&str, String>) -> HashMap<String, String> {
    vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}
