//! MCP (Model Context Protocol) client for radar.
//!
//! Talks to a single stdio MCP server that exchanges newline-delimited
//! JSON-RPC 2.0 messages. The server is spawned as a child process,
//! initialized with a handshake, and its tools are collected into a
//! [`ToolRegistry`].

pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod jsonrpc;
pub mod registry;
pub mod tool;
pub mod transport;

pub use client::{McpClient, PROTOCOL_VERSION};
pub use config::McpServerConfig;
pub use correlator::{Correlator, InboundSink, Outbound};
pub use error::McpError;
pub use registry::ToolRegistry;
pub use tool::{ToolCallResult, ToolContent, ToolDescriptor};
pub use transport::StdioTransport;
