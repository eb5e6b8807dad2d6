//! Provider trait for chat model APIs.

use crate::{ApiError, ChatRequest, ChatResponse};
use std::future::Future;
use std::pin::Pin;

/// A boxed future resolving to one model decision.
pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<ChatResponse, ApiError>> + Send + 'a>>;

/// Trait for chat model providers.
///
/// Dyn-compatible so the agent can hold an `Arc<dyn Provider>`; tests swap
/// in scripted providers through the same seam.
pub trait Provider: Send + Sync {
    /// Submit the history (and optional tool schema) and return the model's decision.
    fn chat<'a>(&'a self, request: ChatRequest<'a>) -> ChatFuture<'a>;

    /// Provider name for logging (e.g., "openai").
    fn name(&self) -> &str;
}
