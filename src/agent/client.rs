//! HTTP client for OpenAI-compatible chat completion APIs (OpenAI, Azure
//! OpenAI, DeepSeek, and other compatible providers). One `ModelClient` is
//! shared by every `AgentAdapter` in the process.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::CoreError;
use crate::models::workspace::ModelHandle;

#[derive(Clone)]
pub struct ModelClient {
    http_client: Client,
}

impl Default for ModelClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelClient {
    pub fn new() -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self { http_client }
    }

    /// Calls a single model with a formatted system+user prompt pair and
    /// parses the response body as `Resp`. Errors are classified so
    /// `AgentAdapter` can decide whether to fall through to the next
    /// model in the chain.
    pub async fn complete<Resp>(
        &self,
        model: &ModelHandle,
        system_prompt: &str,
        user_prompt: &str,
        timeout: Duration,
    ) -> Result<(Resp, i32, i32), CoreError>
    where
        Resp: DeserializeOwned,
    {
        let base_url = model
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1");

        let chat_request = ChatCompletionRequest {
            model: model.model_id.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: user_prompt.to_string() },
            ],
            max_tokens: Some(model.max_tokens),
            temperature: Some(model.temperature),
            response_format: Some(ResponseFormat { r#type: "json_object".to_string() }),
        };

        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        tracing::debug!(url = %url, model = %model.model_id, "calling model provider");

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", model.api_key_ref))
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::ModelChainExhausted(format!("{}: timeout", model.model_id))
                } else {
                    CoreError::ModelChainExhausted(format!("{}: {}", model.model_id, e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::ModelChainExhausted(format!(
                "{}: rate limited",
                model.model_id
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::ModelChainExhausted(format!(
                "{}: api error {status}: {text}",
                model.model_id
            )));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CoreError::ModelChainExhausted(format!("{}: parse error: {e}", model.model_id)))?;

        let content = chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| CoreError::ModelChainExhausted(format!("{}: empty response", model.model_id)))?;

        let result: Resp = serde_json::from_str(content).map_err(|e| {
            CoreError::ModelChainExhausted(format!(
                "{}: output schema mismatch: {e}",
                model.model_id
            ))
        })?;

        let input_tokens = chat_response.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0);
        let output_tokens = chat_response.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0);

        tracing::info!(
            model = %model.model_id,
            input_tokens,
            output_tokens,
            "model call completed"
        );

        Ok((result, input_tokens, output_tokens))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i32,
    completion_tokens: i32,
}
