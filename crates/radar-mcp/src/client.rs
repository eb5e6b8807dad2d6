//! MCP client: one server connection.
//!
//! Handles the protocol handshake (initialize + initialized notification),
//! tool discovery (tools/list), and tool invocation (tools/call).

use crate::config::McpServerConfig;
use crate::correlator::Correlator;
use crate::error::McpError;
use crate::jsonrpc::Response;
use crate::tool::{ToolCallResult, ToolDescriptor, ToolsListResult};
use crate::transport::StdioTransport;
use std::sync::Arc;
use std::time::Duration;

/// MCP protocol version we support.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client for a single MCP server.
pub struct McpClient {
    config: McpServerConfig,
    transport: StdioTransport,
    correlator: Arc<Correlator>,
}

impl McpClient {
    /// Spawn the server and complete the handshake.
    ///
    /// Any failure during `initialize` tears the process down and is
    /// reported as [`McpError::Handshake`], except a failed launch.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, McpError> {
        let correlator = Arc::new(Correlator::new());
        let transport = StdioTransport::spawn(
            &config.command,
            &config.args,
            &config.env,
            correlator.clone(),
        )?;

        let client = Self {
            config: config.clone(),
            transport,
            correlator,
        };

        if let Err(e) = client.initialize().await {
            client.shutdown().await;
            return Err(match e {
                McpError::Handshake(_) => e,
                other => McpError::Handshake(other.to_string()),
            });
        }

        tracing::info!("MCP server '{}' initialized", config.command);
        Ok(client)
    }

    async fn initialize(&self) -> Result<(), McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "radar",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result = match self
            .request("initialize", Some(params), self.config.timeout())
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_timeout() => {
                return Err(match self.correlator.take_unmatched() {
                    Some(id) => McpError::Handshake(format!(
                        "{e}; the server answered with unexpected id {id}"
                    )),
                    None => e,
                });
            }
            Err(e) => return Err(e),
        };
        if let Some(version) = result.get("protocolVersion").and_then(|v| v.as_str()) {
            tracing::debug!("MCP server speaks protocol {version}");
        }

        self.correlator
            .notify(&self.transport, "notifications/initialized", None)
            .await
    }

    /// Send a request and unwrap its result, mapping error responses to [`McpError::Rpc`].
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<serde_json::Value, McpError> {
        let Response { outcome, .. } = self
            .correlator
            .call(&self.transport, method, params, timeout)
            .await?;
        outcome.map_err(|err| McpError::Rpc {
            method: method.to_string(),
            code: err.code,
            message: err.message,
        })
    }

    /// Discover the server's tools with one `tools/list` call.
    ///
    /// A timeout degrades to an empty list.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let result = match self.request("tools/list", None, self.config.timeout()).await {
            Ok(result) => result,
            Err(e) if e.is_timeout() => {
                tracing::warn!("{e}; continuing without tools");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if result.is_null() {
            return Ok(Vec::new());
        }
        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/list response: {e}")))?;

        tracing::info!(
            "MCP server '{}' offers {} tools",
            self.config.command,
            list.tools.len()
        );
        Ok(list.tools)
    }

    /// Invoke a tool and wait up to `timeout` for its result.
    ///
    /// Both an error response and a result flagged `isError` are returned as
    /// [`McpError::ToolExecution`].
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> Result<ToolCallResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let result = match self.request("tools/call", Some(params), timeout).await {
            Ok(result) => result,
            Err(McpError::Rpc { message, .. }) => {
                return Err(McpError::ToolExecution {
                    tool: name.to_string(),
                    message,
                });
            }
            Err(e) => return Err(e),
        };

        let call_result: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/call result: {e}")))?;

        if call_result.is_error {
            return Err(McpError::ToolExecution {
                tool: name.to_string(),
                message: call_result.text(),
            });
        }
        Ok(call_result)
    }

    /// Number of requests currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Terminate the server process and stop reading its output.
    pub async fn shutdown(self) {
        tracing::debug!("Shutting down MCP server '{}'", self.config.command);
        self.transport.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_for(command: &str, args: &[&str], timeout_ms: u64) -> McpServerConfig {
        McpServerConfig {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: HashMap::new(),
            timeout_ms,
            tool_timeout_ms: timeout_ms,
        }
    }

    #[tokio::test]
    async fn connect_fails_to_launch_missing_binary() {
        let config = config_for("this_command_does_not_exist_xyz123", &[], 1000);
        match McpClient::connect(&config).await {
            Err(McpError::Launch { .. }) => {}
            Err(other) => panic!("Expected Launch, got: {other:?}"),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    #[tokio::test]
    async fn silent_server_fails_handshake() {
        // `cat` echoes our initialize back as a request, which never resolves it.
        let config = config_for("cat", &[], 200);
        match McpClient::connect(&config).await {
            Err(McpError::Handshake(message)) => assert!(message.contains("timed out")),
            Err(other) => panic!("Expected Handshake, got: {other:?}"),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    #[tokio::test]
    async fn error_response_to_initialize_fails_handshake() {
        let script = r#"read -r line; echo '{"jsonrpc":"2.0","id":0,"error":{"code":-32600,"message":"unsupported"}}'; cat >/dev/null"#;
        let config = config_for("sh", &["-c", script], 2000);
        match McpClient::connect(&config).await {
            Err(McpError::Handshake(message)) => assert!(message.contains("unsupported")),
            Err(other) => panic!("Expected Handshake, got: {other:?}"),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }
}
