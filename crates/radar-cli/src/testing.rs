//! Scripted provider and tool backend for command tests.

use radar_core::{Agent, ToolBackend, ToolFuture};
use radar_mcp::{McpError, ToolCallResult, ToolContent};
use radar_types::provider::{ChatFuture, Provider};
use radar_types::{ApiError, ChatRequest, ChatResponse, FunctionSpec, ToolCall, Turn};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays queued replies; once the queue is empty it "translates" by
/// wrapping the prompt's content in `CN(...)`, failing on content containing `FAIL`.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ChatResponse>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedProvider {
    pub fn translating() -> Arc<Self> {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The history sent with each request, in call order.
    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().unwrap().clone()
    }
}

fn prompt_content(prompt: &str) -> &str {
    let start = prompt.find("Content:\n").map(|i| i + "Content:\n".len()).unwrap_or(0);
    let end = prompt.rfind("\n\nRequirements:").unwrap_or(prompt.len());
    &prompt[start..end.max(start)]
}

impl Provider for ScriptedProvider {
    fn chat<'a>(&'a self, request: ChatRequest<'a>) -> ChatFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.messages.to_vec());
        let queued = self.replies.lock().unwrap().pop_front();
        let reply = match queued {
            Some(reply) => Ok(reply),
            None => {
                let prompt = request.messages.last().map(|t| t.content()).unwrap_or("");
                let content = prompt_content(prompt);
                if content.contains("FAIL") {
                    Err(ApiError::BadRequest {
                        message: "refused".into(),
                    })
                } else {
                    Ok(text_reply(&format!("CN({content})")))
                }
            }
        };
        Box::pin(async move { reply })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn text_reply(text: &str) -> ChatResponse {
    ChatResponse {
        content: Some(text.to_string()),
        ..ChatResponse::default()
    }
}

pub fn call_reply(id: &str, name: &str, arguments: &str) -> ChatResponse {
    ChatResponse {
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }],
        ..ChatResponse::default()
    }
}

/// Tools that answer with fixed text.
pub struct FixedTools {
    schema: Vec<FunctionSpec>,
    outputs: HashMap<String, String>,
    lock: tokio::sync::Mutex<()>,
}

impl FixedTools {
    pub fn new(outputs: &[(&str, &str)]) -> Box<Self> {
        Box::new(Self {
            schema: outputs
                .iter()
                .map(|(name, _)| FunctionSpec {
                    name: name.to_string(),
                    description: String::new(),
                    parameters: serde_json::json!({"type": "object", "properties": {}}),
                })
                .collect(),
            outputs: outputs
                .iter()
                .map(|(name, text)| (name.to_string(), text.to_string()))
                .collect(),
            lock: tokio::sync::Mutex::new(()),
        })
    }
}

impl ToolBackend for FixedTools {
    fn tools(&self) -> &[FunctionSpec] {
        &self.schema
    }

    fn browser_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.lock
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        _arguments: serde_json::Value,
        _timeout: Duration,
    ) -> ToolFuture<'a> {
        let result = match self.outputs.get(name) {
            Some(text) => Ok(ToolCallResult {
                content: vec![ToolContent::Text { text: text.clone() }],
                is_error: false,
            }),
            None => Err(McpError::Closed),
        };
        Box::pin(async move { result })
    }

    fn shutdown(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async {})
    }
}

pub fn agent_with(provider: Arc<ScriptedProvider>, tools: Option<Box<FixedTools>>) -> Agent {
    let agent = Agent::new(provider, "test-model");
    match tools {
        Some(tools) => agent.with_backend(tools),
        None => agent,
    }
}
