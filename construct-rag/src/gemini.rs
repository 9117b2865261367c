//! Gemini embedding provider using the Generative Language REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{DEFAULT_EMBEDDING_MODEL, RagConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingErrorKind, RagError, Result};

const PROVIDER: &str = "Gemini";

/// The default Generative Language API base URL.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Dimensionality of `embedding-001` and `text-embedding-004`.
const DEFAULT_DIMENSIONS: usize = 768;

/// The API accepts at most this many requests in one `batchEmbedContents` call.
const MAX_BATCH_SIZE: usize = 100;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The retrieval role of the embedded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Passages stored in the index.
    RetrievalDocument,
    /// Questions matched against stored passages.
    RetrievalQuery,
    /// Symmetric text similarity.
    SemanticSimilarity,
}

/// An [`EmbeddingProvider`] backed by the Gemini embedding API.
///
/// Holds one `reqwest::Client` for its whole lifetime; the client pools
/// connections and is safe to use from concurrent tasks. Every request is
/// bounded by the configured timeout.
///
/// # Configuration
///
/// - `model` – defaults to `models/embedding-001`.
/// - `task_type` – defaults to [`TaskType::RetrievalDocument`]; use
///   [`TaskType::RetrievalQuery`] for the provider that embeds questions.
/// - `output_dimensionality` – optional truncation of the output vector.
/// - `api_key` – from the constructor or the `GOOGLE_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use construct_rag::gemini::{GeminiEmbeddingProvider, TaskType};
///
/// let provider = GeminiEmbeddingProvider::from_env()?.with_task_type(TaskType::RetrievalQuery);
/// let embedding = provider.embed("minimum cover to rebar").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    task_type: TaskType,
    output_dimensionality: Option<usize>,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Create a new provider with the given API key, the default model and a
    /// 30 second request timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::embedding(
                PROVIDER,
                EmbeddingErrorKind::Authentication,
                "API key must not be empty",
            ));
        }

        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            task_type: TaskType::RetrievalDocument,
            output_dimensionality: None,
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Create a new provider using the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY").map_err(|_| {
            RagError::embedding(
                PROVIDER,
                EmbeddingErrorKind::Authentication,
                "GOOGLE_API_KEY environment variable not set",
            )
        })?;
        Self::new(api_key)
    }

    /// Create a provider for the model and request timeout named in `config`.
    pub fn from_config(api_key: impl Into<String>, config: &RagConfig) -> Result<Self> {
        Self::new(api_key)?
            .with_model(&config.embedding_model)
            .with_timeout(config.request_timeout())
    }

    /// Set the model name (e.g. `models/text-embedding-004`).
    ///
    /// A bare name gets the `models/` prefix the API expects.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = if model.starts_with("models/") { model } else { format!("models/{model}") };
        self
    }

    /// Set the task type used for embedding requests.
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Set the output dimensionality (truncates the embedding vector).
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.output_dimensionality = Some(dims);
        self.dimensions = dims;
        self
    }

    /// Override the API base URL (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}:{method}", self.base_url, self.model)
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.model,
            content: Content { parts: vec![Part { text }] },
            task_type: self.task_type,
            output_dimensionality: self.output_dimensionality,
        }
    }

    async fn post<B, R>(&self, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.endpoint(method);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                transport_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::embedding(
                PROVIDER,
                classify_status(status),
                format!("API returned {status}: {detail}"),
            ));
        }

        response.json::<R>().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            if e.is_timeout() {
                transport_error(&e)
            } else {
                RagError::embedding(
                    PROVIDER,
                    EmbeddingErrorKind::MalformedResponse,
                    format!("failed to parse response: {e}"),
                )
            }
        })
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
        RagError::embedding(PROVIDER, EmbeddingErrorKind::Network, format!("failed to build client: {e}"))
    })
}

fn transport_error(e: &reqwest::Error) -> RagError {
    let kind =
        if e.is_timeout() { EmbeddingErrorKind::Timeout } else { EmbeddingErrorKind::Network };
    RagError::embedding(PROVIDER, kind, format!("request failed: {e}"))
}

fn classify_status(status: StatusCode) -> EmbeddingErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => EmbeddingErrorKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EmbeddingErrorKind::Authentication,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => EmbeddingErrorKind::Timeout,
        s if s.is_server_error() => EmbeddingErrorKind::Unavailable,
        _ => EmbeddingErrorKind::Rejected,
    }
}

fn non_empty(values: Vec<f32>) -> Result<Vec<f32>> {
    if values.is_empty() {
        return Err(RagError::embedding(
            PROVIDER,
            EmbeddingErrorKind::MalformedResponse,
            "API returned an empty embedding",
        ));
    }
    Ok(values)
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let response: EmbedContentResponse = self.post("embedContent", &self.request(text)).await?;
        non_empty(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        for group in texts.chunks(MAX_BATCH_SIZE) {
            debug!(
                provider = PROVIDER,
                batch_size = group.len(),
                model = %self.model,
                "embedding batch"
            );

            let body = BatchEmbedContentsRequest {
                requests: group.iter().map(|text| self.request(text)).collect(),
            };
            let response: BatchEmbedContentsResponse =
                self.post("batchEmbedContents", &body).await?;

            if response.embeddings.len() != group.len() {
                return Err(RagError::embedding(
                    PROVIDER,
                    EmbeddingErrorKind::MalformedResponse,
                    format!(
                        "expected {} embeddings, API returned {}",
                        group.len(),
                        response.embeddings.len()
                    ),
                ));
            }
            for embedding in response.embeddings {
                results.push(non_empty(embedding.values)?);
            }
        }

        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
