//! Single-shot typed LLM call with fallback (C1). Grounded in the
//! cache-then-call bookkeeping flow of the teacher's `LLMServiceImpl::analyze`,
//! generalized into a pure call-with-fallback (session/cache bookkeeping now
//! lives in `SessionCache` and the request-execution log, not here).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use crate::agent::client::ModelClient;
use crate::agent::template::TemplateLoader;
use crate::error::CoreError;
use crate::models::workspace::AgentConfig;

pub struct AgentAdapter {
    client: ModelClient,
    pub config: AgentConfig,
    pub call_timeout: Duration,
}

impl AgentAdapter {
    pub fn new(client: ModelClient, config: AgentConfig, call_timeout: Duration) -> Self {
        Self { client, config, call_timeout }
    }

    /// Formats the configured template against `vars`, then calls the
    /// primary model followed by each fallback in order, stopping at the
    /// first non-error response. Returns `ModelChainExhausted` only after
    /// every model in the chain has failed.
    pub async fn call<Resp>(&self, vars: &HashMap<&str, String>) -> Result<Resp, CoreError>
    where
        Resp: DeserializeOwned,
    {
        self.call_at_temperature(vars, None).await
    }

    /// Same fallback-chain traversal as `call`, but overrides every model's
    /// configured temperature when `temperature` is `Some`. Used by
    /// `AgentPool` to fan out SQL/test generators at a temperature ramp
    /// while still honoring the agent's configured fallback chain.
    pub async fn call_at_temperature<Resp>(
        &self,
        vars: &HashMap<&str, String>,
        temperature: Option<f32>,
    ) -> Result<Resp, CoreError>
    where
        Resp: DeserializeOwned,
    {
        let template = TemplateLoader::resolve(&self.config.template_key)?;
        let system_prompt = TemplateLoader::render(template.system, vars)?;
        let user_prompt = TemplateLoader::render(template.user, vars)?;

        let mut chain: Vec<_> =
            std::iter::once(self.config.primary_model.clone()).chain(self.config.fallback_models.iter().cloned()).collect();
        if let Some(t) = temperature {
            for model in &mut chain {
                model.temperature = t;
            }
        }

        let mut last_err = None;
        for model in &chain {
            let started = Instant::now();
            match self.client.complete::<Resp>(model, &system_prompt, &user_prompt, self.call_timeout).await {
                Ok((resp, input_tokens, output_tokens)) => {
                    tracing::info!(
                        agent = %self.config.name,
                        model = %model.model_id,
                        input_tokens,
                        output_tokens,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "agent call succeeded"
                    );
                    return Ok(resp);
                },
                Err(err) => {
                    tracing::warn!(
                        agent = %self.config.name,
                        model = %model.model_id,
                        latency_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "agent call failed, trying next model in fallback chain"
                    );
                    last_err = Some(err);
                },
            }
        }

        Err(last_err.unwrap_or_else(|| CoreError::ModelChainExhausted(self.config.name.clone())))
    }
}
