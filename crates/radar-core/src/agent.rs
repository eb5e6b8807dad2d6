//! The agent: a model provider plus an optional tool session.

use crate::session::{Session, ToolBackend};
use crate::turn::{LoopState, ToolLoop};
use futures_util::future::join_all;
use radar_mcp::{McpError, McpServerConfig};
use radar_types::provider::Provider;
use radar_types::{ChatRequest, Conversation, RadarError, ToolCall, Turn, Usage, preview};
use std::sync::Arc;
use std::time::Duration;

/// Default cap on model rounds per conversation.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Default per-call tool timeout. Browser work is slow.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Events emitted by the agent during execution.
#[derive(Debug)]
pub enum AgentEvent {
    /// A tool is about to be executed.
    ToolStart { name: String, input: String },
    /// A tool has finished executing.
    ToolEnd {
        name: String,
        output: String,
        is_error: bool,
    },
    /// Accumulated token usage for the conversation.
    Usage(Usage),
    /// The model produced its final answer.
    Done { rounds: usize },
    /// The conversation failed.
    Error(String),
}

/// Drives conversations against one model and, optionally, one tool backend.
pub struct Agent {
    provider: Arc<dyn Provider>,
    backend: Option<Box<dyn ToolBackend>>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_rounds: usize,
    tool_timeout: Duration,
    parallel_tool_calls: bool,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            backend: None,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            parallel_tool_calls: false,
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn ToolBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = enabled;
        self
    }

    /// Open an MCP session and use it as this agent's tool backend.
    ///
    /// The session's tool timeout comes from `config`.
    pub async fn connect(
        self,
        config: &McpServerConfig,
        allowed_tools: Option<&[String]>,
    ) -> Result<Self, RadarError> {
        let session = Session::connect(config, allowed_tools)
            .await
            .map_err(|e| RadarError::Session(e.to_string()))?;
        Ok(self
            .with_tool_timeout(config.tool_timeout())
            .with_backend(Box::new(session)))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// The tool definitions offered to the model, empty without a backend.
    pub fn tool_names(&self) -> Vec<&str> {
        self.backend
            .as_deref()
            .map(|b| b.tools().iter().map(|t| t.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn has_tools(&self) -> bool {
        self.backend.as_deref().is_some_and(|b| !b.tools().is_empty())
    }

    /// A single model call without tools. Never takes the browser lock.
    pub async fn chat(&self, history: &[Turn]) -> Result<String, RadarError> {
        let request = ChatRequest {
            model: &self.model,
            messages: history,
            tools: None,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let reply = self.provider.chat(request).await?;
        if reply.has_tool_calls() {
            tracing::warn!(
                "Ignoring {} tool call(s) in a chat without tools",
                reply.tool_calls.len()
            );
        }
        Ok(reply.text_or_empty().to_string())
    }

    /// Run the tool loop and return only the final answer.
    pub async fn chat_with_tools(
        &self,
        history: impl Into<Conversation>,
    ) -> Result<String, RadarError> {
        let mut conversation = history.into();
        self.run_locked(&mut conversation, |_| {}).await
    }

    /// Run the tool loop and return the whole resulting history.
    pub async fn chat_with_tools_full(
        &self,
        history: impl Into<Conversation>,
    ) -> Result<Conversation, RadarError> {
        let mut conversation = history.into();
        self.run_locked(&mut conversation, |_| {}).await?;
        Ok(conversation)
    }

    /// Run the tool loop while holding the backend's browser lock.
    pub async fn run_locked<F>(
        &self,
        conversation: &mut Conversation,
        on_event: F,
    ) -> Result<String, RadarError>
    where
        F: FnMut(AgentEvent),
    {
        let _guard = match self.backend.as_deref() {
            Some(backend) => Some(backend.browser_lock().lock().await),
            None => None,
        };
        self.run(conversation, on_event).await
    }

    /// Run the agent loop: ask the model, execute requested tools, repeat.
    ///
    /// Turns are appended to `conversation` as they happen, so on failure it
    /// holds everything up to the failing step. Does not take the browser
    /// lock; see [`Agent::run_locked`].
    pub async fn run<F>(
        &self,
        conversation: &mut Conversation,
        mut on_event: F,
    ) -> Result<String, RadarError>
    where
        F: FnMut(AgentEvent),
    {
        let backend = self.backend.as_deref();
        let tools = backend.map(|b| b.tools()).filter(|t| !t.is_empty());
        let mut tool_loop = ToolLoop::new(self.max_rounds);
        let mut total_usage = Usage::default();

        loop {
            match tool_loop.state() {
                LoopState::Thinking => {
                    tracing::debug!(
                        "Round {}/{}: asking {} ({} turns)",
                        tool_loop.rounds() + 1,
                        tool_loop.max_rounds(),
                        self.model,
                        conversation.len()
                    );
                    let request = ChatRequest {
                        model: &self.model,
                        messages: conversation.turns(),
                        tools,
                        temperature: self.temperature,
                        max_tokens: self.max_tokens,
                    };
                    match self.provider.chat(request).await {
                        Ok(reply) => {
                            total_usage.add(&reply.usage);
                            tool_loop.on_reply(reply, conversation);
                        }
                        Err(e) => {
                            tracing::warn!("Model call failed: {e}");
                            tool_loop.on_model_error(e);
                        }
                    }
                }
                LoopState::Executing(calls) => {
                    let calls = calls.clone();
                    tracing::info!(
                        "Round {}: executing {} tool call(s)",
                        tool_loop.rounds(),
                        calls.len()
                    );
                    for turn in self.execute_calls(backend, &calls, &mut on_event).await {
                        conversation.push(turn);
                    }
                    tool_loop.on_tools_finished();
                }
                LoopState::Done(_) | LoopState::Failed(_) => break,
            }
        }

        on_event(AgentEvent::Usage(total_usage));
        let rounds = tool_loop.rounds();
        match tool_loop.finish() {
            Ok(answer) => {
                if answer.trim().is_empty() {
                    tracing::warn!("Model finished with an empty answer");
                }
                on_event(AgentEvent::Done { rounds });
                Ok(answer)
            }
            Err(e) => {
                on_event(AgentEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Execute one round of tool calls. Results come back in request order.
    async fn execute_calls<F>(
        &self,
        backend: Option<&dyn ToolBackend>,
        calls: &[ToolCall],
        on_event: &mut F,
    ) -> Vec<Turn>
    where
        F: FnMut(AgentEvent),
    {
        let mut outputs = Vec::with_capacity(calls.len());
        if self.parallel_tool_calls && calls.len() > 1 {
            for call in calls {
                on_event(tool_start(call));
            }
            let results =
                join_all(calls.iter().map(|call| self.execute_call(backend, call))).await;
            for (call, output) in calls.iter().zip(results) {
                on_event(tool_end(call, &output));
                outputs.push(output);
            }
        } else {
            for call in calls {
                on_event(tool_start(call));
                let output = self.execute_call(backend, call).await;
                on_event(tool_end(call, &output));
                outputs.push(output);
            }
        }

        calls
            .iter()
            .zip(outputs)
            .map(|(call, (text, is_error))| Turn::tool_result(&call.id, &call.name, text, is_error))
            .collect()
    }

    /// Execute a single call, rendering every failure as result text.
    async fn execute_call(
        &self,
        backend: Option<&dyn ToolBackend>,
        call: &ToolCall,
    ) -> (String, bool) {
        let Some(backend) = backend else {
            return ("Error: no tools are available".to_string(), true);
        };
        if !backend.has_tool(&call.name) {
            tracing::warn!("Model requested unknown tool '{}'", call.name);
            return (format!("Error: unknown tool '{}'", call.name), true);
        }

        let arguments = parse_arguments(&call.name, &call.arguments);
        match backend
            .call_tool(&call.name, arguments, self.tool_timeout)
            .await
        {
            Ok(result) => (result.text(), false),
            Err(McpError::ToolExecution { message, .. }) => {
                (format!("Tool error: {message}"), true)
            }
            Err(e) => {
                tracing::warn!("Tool '{}' failed: {e}", call.name);
                (format!("Error: {e}"), true)
            }
        }
    }

    /// Shut down the tool backend, if any.
    pub async fn shutdown(self) {
        if let Some(backend) = self.backend {
            backend.shutdown().await;
        }
    }
}

/// Decode the model's raw argument string. Anything but a JSON object becomes `{}`.
fn parse_arguments(tool: &str, raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => value,
        Ok(_) | Err(_) => {
            tracing::warn!(
                "Malformed arguments for '{tool}', using {{}}: {}",
                preview(raw, 200)
            );
            serde_json::json!({})
        }
    }
}

fn tool_start(call: &ToolCall) -> AgentEvent {
    AgentEvent::ToolStart {
        name: call.name.clone(),
        input: preview(&call.arguments, 200),
    }
}

fn tool_end(call: &ToolCall, (text, is_error): &(String, bool)) -> AgentEvent {
    AgentEvent::ToolEnd {
        name: call.name.clone(),
        output: preview(text, 200),
        is_error: *is_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_parse_objects() {
        let value = parse_arguments("navigate_page", r#"{"url":"https://example.com"}"#);
        assert_eq!(value["url"], "https://example.com");
    }

    #[test]
    fn malformed_arguments_become_empty_object() {
        assert_eq!(parse_arguments("x", "{not json"), serde_json::json!({}));
        assert_eq!(parse_arguments("x", "[1,2]"), serde_json::json!({}));
        assert_eq!(parse_arguments("x", ""), serde_json::json!({}));
    }

    #[test]
    fn tool_events_truncate_long_output() {
        let call = ToolCall {
            id: "c1".into(),
            name: "evaluate_script".into(),
            arguments: "{}".into(),
        };
        let long = "x".repeat(500);
        match tool_end(&call, &(long, false)) {
            AgentEvent::ToolEnd { output, .. } => assert!(output.chars().count() <= 203),
            other => panic!("Expected ToolEnd, got {other:?}"),
        }
    }
}
