//! A live MCP session and the seam the agent uses to run tools.

use radar_mcp::{McpClient, McpError, McpServerConfig, ToolCallResult, ToolRegistry};
use radar_types::FunctionSpec;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A boxed future resolving to one tool result.
pub type ToolFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ToolCallResult, McpError>> + Send + 'a>>;

/// Anything that can execute the model's tool calls.
///
/// Implemented by [`Session`]; tests substitute scripted backends.
pub trait ToolBackend: Send + Sync {
    /// Tool definitions offered to the model.
    fn tools(&self) -> &[FunctionSpec];

    /// Held for the whole of a tool-enabled conversation.
    fn browser_lock(&self) -> &Mutex<()>;

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> ToolFuture<'a>;

    /// Release the backend's resources.
    fn shutdown(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>>;

    fn has_tool(&self, name: &str) -> bool {
        self.tools().iter().any(|t| t.name == name)
    }
}

/// One MCP server connection with its filtered tool set.
pub struct Session {
    id: Uuid,
    client: McpClient,
    registry: ToolRegistry,
    schema: Vec<FunctionSpec>,
    browser_lock: Mutex<()>,
}

impl Session {
    /// Launch the server, complete the handshake and discover its tools.
    pub async fn connect(
        config: &McpServerConfig,
        allowed_tools: Option<&[String]>,
    ) -> Result<Self, McpError> {
        let id = Uuid::new_v4();
        tracing::info!("Session {id}: starting MCP server '{}'", config.command);

        let client = McpClient::connect(config).await?;
        let tools = match client.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                client.shutdown().await;
                return Err(e);
            }
        };

        let registry = ToolRegistry::new(tools).filter(allowed_tools);
        let schema = registry.to_model_schema();
        tracing::info!(
            "Session {id}: exposing tools [{}]",
            registry.names().join(", ")
        );

        Ok(Self {
            id,
            client,
            registry,
            schema,
            browser_lock: Mutex::new(()),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Terminate the server process.
    pub async fn close(self) {
        tracing::info!("Session {}: shutting down", self.id);
        self.client.shutdown().await;
    }
}

impl ToolBackend for Session {
    fn tools(&self) -> &[FunctionSpec] {
        &self.schema
    }

    fn browser_lock(&self) -> &Mutex<()> {
        &self.browser_lock
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> ToolFuture<'a> {
        Box::pin(self.client.call_tool(name, arguments, timeout))
    }

    fn shutdown(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move { (*self).close().await })
    }
}
