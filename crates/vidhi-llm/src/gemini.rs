//! Google Gemini embeddings over the Generative Language REST API.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::EmbeddingProvider;
use crate::retry::send_with_retry;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-embedding-001";

/// `batchEmbedContents` accepts at most this many requests per call.
const MAX_BATCH: usize = 100;
const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    /// Fully qualified, always `models/...`.
    model: String,
    dimensions: Option<usize>,
    max_retries: u32,
}

impl fmt::Debug for GeminiEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiEmbedder")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl GeminiEmbedder {
    #[must_use]
    pub fn new(api_key: String, model: &str) -> Self {
        let model = if model.starts_with("models/") {
            model.to_owned()
        } else {
            format!("models/{model}")
        };
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model,
            dimensions: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Ask the API to truncate vectors to `dimensions` components.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn post<B: Serialize + Sync>(&self, method: &str, body: &B) -> Result<String, LlmError> {
        let url = format!("{}/{}:{method}", self.base_url, self.model);
        let response = send_with_retry("gemini", self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;
        if !status.is_success() {
            tracing::error!(%status, body = %text, method, "gemini embedding request failed");
            return Err(LlmError::Api {
                provider: "gemini".into(),
                status: status.as_u16(),
            });
        }
        Ok(text)
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let requests: Vec<EmbedRequest<'_>> = texts
            .iter()
            .map(|t| self.request(t, TaskType::RetrievalDocument))
            .collect();
        let text = self
            .post("batchEmbedContents", &BatchRequest { requests })
            .await?;
        let resp: BatchResponse = serde_json::from_str(&text)?;

        if resp.embeddings.len() != texts.len() {
            return Err(LlmError::EmbeddingCount {
                provider: "gemini".into(),
                expected: texts.len(),
                got: resp.embeddings.len(),
            });
        }
        Ok(resp.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn request<'a>(&'a self, text: &'a str, task_type: TaskType) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.model,
            content: Content {
                parts: [Part { text }],
            },
            task_type,
            output_dimensionality: self.dimensions,
        }
    }
}

impl EmbeddingProvider for GeminiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH) {
            out.extend(self.embed_chunk(chunk).await?);
        }
        Ok(out)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let body = self.request(text, TaskType::RetrievalQuery);
        let raw = self.post("embedContent", &body).await?;
        let resp: SingleResponse = serde_json::from_str(&raw)?;
        if resp.embedding.values.is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "gemini".into(),
            });
        }
        Ok(resp.embedding.values)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<Values>,
}

#[derive(Deserialize)]
struct SingleResponse {
    embedding: Values,
}

#[derive(Deserialize)]
struct Values {
    #[serde(default)]
    values: Vec<f32>,
}
