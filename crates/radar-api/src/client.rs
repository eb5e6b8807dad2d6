//! Chat-completions API client.

use std::time::Duration;

use radar_types::{ApiError, ChatRequest, ChatResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::retry::RetryConfig;
use crate::wire::{CompletionRequest, CompletionResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry_config: RetryConfig,
}

impl ApiClient {
    /// Create a new API client with the default request timeout.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(api_key, base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_config: RetryConfig::default(),
        })
    }

    /// Set the retry configuration for transient errors (429, 5xx, network).
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
                ApiError::Auth {
                    message: "Invalid API key format".into(),
                }
            })?,
        );
        Ok(headers)
    }

    /// Send one chat-completions request, retrying transient failures.
    pub async fn chat_completion(&self, request: ChatRequest<'_>) -> Result<ChatResponse, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let headers = self.headers()?;
        let body = serde_json::to_string(&CompletionRequest::from_chat(request)).map_err(|e| {
            ApiError::BadRequest {
                message: format!("Failed to serialize request: {e}"),
            }
        })?;

        let attempts = self.retry_config.max_retries + 1;
        let mut attempt = 0;
        loop {
            tracing::debug!("POST {url} (attempt {}/{attempts})", attempt + 1);

            let err = match self.send_once(&url, &headers, &body).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.retry_config.max_retries {
                return Err(err);
            }

            let retry_after = match &err {
                ApiError::RateLimited { retry_after_ms } => retry_after_ms.map(Duration::from_millis),
                _ => None,
            };
            let delay = self.retry_config.delay_for(attempt, retry_after);
            tracing::warn!(
                "Retryable API error (attempt {}/{attempts}): {err}. Retrying in {}ms...",
                attempt + 1,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn send_once(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: &str,
    ) -> Result<ChatResponse, ApiError> {
        let response = self
            .http
            .post(url)
            .headers(headers.clone())
            .body(body.to_string())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body_text, retry_after));
        }

        let text = response.text().await.map_err(map_transport_error)?;
        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::Decode(format!("{e}: {}", radar_types::preview(&text, 200))))?;
        let chat = parsed.into_chat_response()?;

        tracing::debug!(
            "Model replied: {} tool calls, {} prompt / {} completion tokens",
            chat.tool_calls.len(),
            chat.usage.prompt_tokens,
            chat.usage.completion_tokens
        );
        Ok(chat)
    }
}

fn map_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(e.to_string())
    }
}

/// Parse the `retry-after` header value as seconds and convert to milliseconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1000.0) as u64)
}

/// Classify an HTTP error response into a typed ApiError.
fn classify_error(status: u16, body: &str, retry_after: Option<u64>) -> ApiError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string());

    match status {
        401 | 403 => ApiError::Auth { message },
        429 => ApiError::RateLimited {
            retry_after_ms: retry_after,
        },
        400..=499 => ApiError::BadRequest { message },
        _ => ApiError::Server { status, message },
    }
}
