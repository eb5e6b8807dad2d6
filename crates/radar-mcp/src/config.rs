//! Configuration for the MCP server process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

fn default_timeout() -> u64 {
    30_000
}

fn default_tool_timeout() -> u64 {
    120_000
}

/// How to launch and talk to a single MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to run (e.g., "npx").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Timeout for handshake and metadata requests in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Timeout for `tools/call` in milliseconds. Browser work is slow.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_ms: u64,
}

impl McpServerConfig {
    /// The browser automation server launched through npx.
    pub fn chrome_devtools() -> Self {
        Self {
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "chrome-devtools-mcp@latest".to_string()],
            env: HashMap::new(),
            timeout_ms: default_timeout(),
            tool_timeout_ms: default_tool_timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self::chrome_devtools()
    }
}
