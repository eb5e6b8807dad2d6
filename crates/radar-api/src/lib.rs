//! OpenAI-compatible chat-completions client for radar.

mod client;
mod provider;
mod retry;
mod wire;

pub use client::ApiClient;
pub use provider::OpenAiProvider;
pub use retry::RetryConfig;
