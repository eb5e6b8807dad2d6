//! OpenAI-compatible provider implementation.

use crate::client::ApiClient;
use crate::retry::RetryConfig;
use radar_types::provider::{ChatFuture, Provider};
use radar_types::{ApiError, ChatRequest};

/// Provider for any endpoint speaking the chat-completions protocol.
///
/// Retry logic stays in `ApiClient`.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: ApiClient,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(api_key, base_url)?,
        })
    }

    pub fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.client = self.client.with_retry_config(config);
        self
    }
}

impl Provider for OpenAiProvider {
    fn chat<'a>(&'a self, request: ChatRequest<'a>) -> ChatFuture<'a> {
        Box::pin(self.client.chat_completion(request))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
