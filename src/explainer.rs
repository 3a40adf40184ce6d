//! Produces a natural-language explanation of a finalized SQL query on
//! demand (C15), invoked lazily after the response when
//! `explain_generated_query` flips on, or directly via `POST /explain-sql`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::agent::adapter::AgentAdapter;
use crate::error::CoreError;

#[derive(Debug, Deserialize)]
struct ExplainerOutput {
    explanation: String,
}

pub struct ExplainerAgent {
    agent: Arc<AgentAdapter>,
}

impl ExplainerAgent {
    pub fn new(agent: Arc<AgentAdapter>) -> Self {
        Self { agent }
    }

    pub async fn explain(&self, question: &str, sql: &str, question_language: &str) -> Result<String, CoreError> {
        self.explain_with_context(question, sql, question_language, None, None, None).await
    }

    /// Same as `explain`, but accepts the optional richer context
    /// `POST /explain-sql` can supply directly (spec §6) rather than only
    /// what the pipeline accumulated for a lazily-triggered explanation.
    pub async fn explain_with_context(
        &self,
        question: &str,
        sql: &str,
        question_language: &str,
        database_schema: Option<&str>,
        evidence: Option<&[String]>,
        chain_of_thought: Option<&str>,
    ) -> Result<String, CoreError> {
        let mut vars = HashMap::new();
        vars.insert("question", question.to_string());
        vars.insert("sql", sql.to_string());
        vars.insert("question_language", question_language.to_string());
        vars.insert("used_mschema", database_schema.unwrap_or_default().to_string());
        vars.insert("evidence", evidence.map(|e| e.join("\n")).unwrap_or_default());
        vars.insert("chain_of_thought", chain_of_thought.unwrap_or_default().to_string());

        let output: ExplainerOutput = self.agent.call(&vars).await?;
        Ok(output.explanation)
    }
}
