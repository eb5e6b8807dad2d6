//! The bounded tool-calling conversation loop and MCP sessions for radar.

mod agent;
pub mod session;
pub mod turn;

pub use agent::{Agent, AgentEvent, DEFAULT_MAX_ROUNDS, DEFAULT_TOOL_TIMEOUT};
pub use session::{Session, ToolBackend, ToolFuture};
pub use turn::{LoopState, ToolLoop};
