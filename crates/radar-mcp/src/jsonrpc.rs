//! JSON-RPC 2.0 framing for MCP communication.
//!
//! Outgoing requests and notifications are serialized from dedicated
//! structs; every incoming line is decoded into a [`Message`].

use crate::error::McpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A response matched (or to be matched) against a pending request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: u64,
    pub outcome: Result<Value, RpcError>,
}

/// Any message the server may write to its stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A server-initiated request. Its id is kept verbatim since servers may use strings.
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Response(Response),
    Notification {
        method: String,
        params: Option<Value>,
    },
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

impl Message {
    /// Decode one line of server output.
    pub fn decode(line: &str) -> Result<Self, McpError> {
        let raw: RawMessage = serde_json::from_str(line)?;
        match (raw.id, raw.method) {
            (Some(id), Some(method)) => Ok(Message::Request {
                id,
                method,
                params: raw.params,
            }),
            (None, Some(method)) => Ok(Message::Notification {
                method,
                params: raw.params,
            }),
            (Some(id), None) => {
                let id = id.as_u64().ok_or_else(|| {
                    McpError::Protocol(format!("response id {id} is not an unsigned integer"))
                })?;
                let outcome = match raw.error {
                    Some(err) => Err(err),
                    None => Ok(raw.result.unwrap_or(Value::Null)),
                };
                Ok(Message::Response(Response { id, outcome }))
            }
            (None, None) => Err(McpError::Protocol(
                "message has neither an id nor a method".to_string(),
            )),
        }
    }
}
