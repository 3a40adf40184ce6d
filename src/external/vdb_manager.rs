//! Contract for the vector database (spec §1, out of scope — contract
//! only). `ContextRetriever` calls `search_evidence`/`search_sql_examples`;
//! `FeedbackSink` calls `upsert_sql_document`.

use async_trait::async_trait;

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub text: String,
    pub source: String,
    pub score: f32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SqlExample {
    pub question: String,
    pub sql: String,
}

#[derive(Debug, Clone)]
pub struct SqlDocument {
    pub question: String,
    pub sql: String,
    pub evidence: Vec<String>,
    pub collection: String,
}

#[async_trait]
pub trait VdbManager: Send + Sync {
    async fn search_evidence(&self, query: &str, k: usize, workspace_id: i64) -> Result<Vec<VectorHit>, CoreError>;

    async fn search_sql_examples(&self, query: &str, k: usize) -> Result<Vec<SqlExample>, CoreError>;

    async fn upsert_sql_document(&self, doc: SqlDocument) -> Result<String, CoreError>;
}

/// Reference `VdbManager` over a generic REST vector-store API, used by the
/// standalone binary when no embedding/vector-store integration is wired in.
/// Speaks a minimal JSON contract (`POST {base_url}/search`,
/// `/search_examples`, `/upsert`) rather than any specific vendor's SDK,
/// since none of the retrieved example repos standardize on one.
pub struct HttpVdbManager {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpVdbManager {
    pub fn new(base_url: String, api_key: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self { http_client, base_url: base_url.trim_end_matches('/').to_string(), api_key }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        self.http_client.post(format!("{}/{path}", self.base_url)).bearer_auth(&self.api_key)
    }
}

#[derive(serde::Deserialize)]
struct SearchResponse {
    hits: Vec<VectorHitWire>,
}

#[derive(serde::Deserialize)]
struct VectorHitWire {
    text: String,
    source: String,
    score: f32,
}

#[derive(serde::Deserialize)]
struct ExamplesResponse {
    examples: Vec<SqlExample>,
}

#[derive(serde::Serialize)]
struct UpsertRequest<'a> {
    question: &'a str,
    sql: &'a str,
    evidence: &'a [String],
    collection: &'a str,
}

#[derive(serde::Deserialize)]
struct UpsertResponse {
    id: String,
}

#[async_trait]
impl VdbManager for HttpVdbManager {
    async fn search_evidence(&self, query: &str, k: usize, workspace_id: i64) -> Result<Vec<VectorHit>, CoreError> {
        let response = self
            .request("search")
            .json(&serde_json::json!({ "query": query, "k": k, "workspace_id": workspace_id }))
            .send()
            .await
            .map_err(|e| CoreError::VdbUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::VdbUnavailable(format!("search returned {}", response.status())));
        }

        let parsed: SearchResponse =
            response.json().await.map_err(|e| CoreError::VdbUnavailable(format!("malformed search response: {e}")))?;
        Ok(parsed.hits.into_iter().map(|h| VectorHit { text: h.text, source: h.source, score: h.score }).collect())
    }

    async fn search_sql_examples(&self, query: &str, k: usize) -> Result<Vec<SqlExample>, CoreError> {
        let response = self
            .request("search_examples")
            .json(&serde_json::json!({ "query": query, "k": k }))
            .send()
            .await
            .map_err(|e| CoreError::VdbUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::VdbUnavailable(format!("search_examples returned {}", response.status())));
        }

        let parsed: ExamplesResponse = response
            .json()
            .await
            .map_err(|e| CoreError::VdbUnavailable(format!("malformed search_examples response: {e}")))?;
        Ok(parsed.examples)
    }

    async fn upsert_sql_document(&self, doc: SqlDocument) -> Result<String, CoreError> {
        let response = self
            .request("upsert")
            .json(&UpsertRequest { question: &doc.question, sql: &doc.sql, evidence: &doc.evidence, collection: &doc.collection })
            .send()
            .await
            .map_err(|e| CoreError::VdbUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::VdbUnavailable(format!("upsert returned {}", response.status())));
        }

        let parsed: UpsertResponse =
            response.json().await.map_err(|e| CoreError::VdbUnavailable(format!("malformed upsert response: {e}")))?;
        Ok(parsed.id)
    }
}
