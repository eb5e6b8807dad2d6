//! Request and response bodies of the chat-completions endpoint.

use radar_types::{ApiError, ChatRequest, ChatResponse, FunctionSpec, ToolCall, Turn, Usage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCallOut<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireToolCallOut<'a> {
    id: &'a str,
    r#type: &'static str,
    function: WireFunctionOut<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionOut<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    r#type: &'static str,
    function: &'a FunctionSpec,
}

impl<'a> CompletionRequest<'a> {
    pub(crate) fn from_chat(request: ChatRequest<'a>) -> Self {
        Self {
            model: request.model,
            messages: request.messages.iter().map(WireMessage::from_turn).collect(),
            tools: request
                .tools
                .filter(|tools| !tools.is_empty())
                .map(|tools| {
                    tools
                        .iter()
                        .map(|function| WireTool {
                            r#type: "function",
                            function,
                        })
                        .collect()
                }),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

impl<'a> WireMessage<'a> {
    fn from_turn(turn: &'a Turn) -> Self {
        match turn {
            Turn::System { content } => Self::plain("system", content),
            Turn::User { content } => Self::plain("user", content),
            Turn::Assistant {
                content,
                tool_calls,
            } if !tool_calls.is_empty() => Self {
                role: "assistant",
                content: (!content.is_empty()).then_some(content.as_str()),
                tool_calls: Some(
                    tool_calls
                        .iter()
                        .map(|call| WireToolCallOut {
                            id: &call.id,
                            r#type: "function",
                            function: WireFunctionOut {
                                name: &call.name,
                                arguments: &call.arguments,
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
            },
            Turn::Assistant { content, .. } => Self::plain("assistant", content),
            Turn::ToolResult {
                call_id, content, ..
            } => Self {
                role: "tool",
                content: Some(content.as_str()),
                tool_calls: None,
                tool_call_id: Some(call_id.as_str()),
            },
        }
    }

    fn plain(role: &'static str, content: &'a str) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Some gateways send arguments as an object or `null` instead of a JSON
/// string; flatten them to the string form the tool loop parses.
fn arguments_text(arguments: serde_json::Value) -> String {
    match arguments {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl CompletionResponse {
    /// Reduce the first choice to a [`ChatResponse`].
    pub(crate) fn into_chat_response(self) -> Result<ChatResponse, ApiError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Decode("response has no choices".into()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: arguments_text(call.function.arguments),
            })
            .collect();

        let content = choice.message.content.filter(|c| !c.trim().is_empty());
        if content.is_none() && tool_calls.is_empty() {
            return Err(ApiError::EmptyResponse);
        }

        Ok(ChatResponse {
            content,
            tool_calls,
            usage: self.usage.unwrap_or_default(),
        })
    }
}
