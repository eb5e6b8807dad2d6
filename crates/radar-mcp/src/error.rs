//! Error types for MCP operations.

use thiserror::Error;

/// Errors from MCP server communication.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to launch MCP server '{command}': {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    #[error("MCP transport write failed: {0}")]
    Transport(#[source] std::io::Error),

    #[error("MCP request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("JSON-RPC error for '{method}' (code {code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("MCP handshake failed: {0}")]
    Handshake(String),

    #[error("MCP connection closed before a response arrived")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, McpError::Timeout { .. })
    }
}
