//! Request/response correlation for MCP.
//!
//! A single background reader hands every decoded message to the
//! [`Correlator`], while any number of callers wait on their own oneshot
//! slot keyed by request id. Responses that match no pending request are
//! dropped with a warning, and the last such id is kept for error reports.

use crate::error::McpError;
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, Message, Response};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Destination for serialized outgoing messages.
pub trait Outbound: Send + Sync {
    /// Write one serialized JSON message as a single line.
    fn send_line(&self, line: String) -> impl Future<Output = Result<(), McpError>> + Send;
}

/// Receiver of decoded inbound messages.
///
/// Called from the transport's reader task, so implementations must not block.
pub trait InboundSink: Send + Sync + 'static {
    fn deliver(&self, message: Message);
}

struct PendingRequest {
    method: String,
    created_at: Instant,
    slot: oneshot::Sender<Response>,
}

type PendingTable = HashMap<u64, PendingRequest>;

/// Matches responses to in-flight requests by id.
pub struct Correlator {
    next_id: AtomicU64,
    pending: Mutex<PendingTable>,
    last_unmatched: Mutex<Option<u64>>,
}

/// Removes a pending entry when the waiting call finishes or is dropped.
struct PendingGuard<'a> {
    correlator: &'a Correlator,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.correlator.lock_pending().remove(&self.id);
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            last_unmatched: Mutex::new(None),
        }
    }

    /// Allocate a fresh request id. Ids start at 0 and are never reused.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The id of the most recent response that matched no pending request,
    /// clearing it.
    pub fn take_unmatched(&self) -> Option<u64> {
        self.last_unmatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Send a request and wait for the response carrying its id.
    ///
    /// The pending entry is removed on every exit path, so a response
    /// arriving after the timeout is dropped rather than resurrected.
    pub async fn call<O: Outbound>(
        &self,
        outbound: &O,
        method: &str,
        params: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<Response, McpError> {
        let id = self.next_id();
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(
            id,
            PendingRequest {
                method: method.to_string(),
                created_at: Instant::now(),
                slot: tx,
            },
        );
        let _guard = PendingGuard {
            correlator: self,
            id,
        };

        tracing::debug!("MCP -> {method} (id {id})");
        outbound.send_line(line).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(McpError::Closed),
            Err(_) => Err(McpError::Timeout {
                method: method.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Send a notification (fire-and-forget, no response expected).
    pub async fn notify<O: Outbound>(
        &self,
        outbound: &O,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        tracing::debug!("MCP -> {method} (notification)");
        outbound.send_line(line).await
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundSink for Correlator {
    fn deliver(&self, message: Message) {
        match message {
            Message::Response(resp) => {
                let entry = self.lock_pending().remove(&resp.id);
                match entry {
                    Some(pending) => {
                        tracing::debug!(
                            "MCP <- {} (id {}) after {}ms",
                            pending.method,
                            resp.id,
                            pending.created_at.elapsed().as_millis()
                        );
                        // The caller may have given up in the meantime.
                        let _ = pending.slot.send(resp);
                    }
                    None => {
                        let waiting: Vec<String> = self
                            .lock_pending()
                            .iter()
                            .map(|(id, pending)| format!("{} (id {id})", pending.method))
                            .collect();
                        tracing::warn!(
                            "Dropping MCP response with unknown id {}; waiting on: [{}]",
                            resp.id,
                            waiting.join(", ")
                        );
                        *self
                            .last_unmatched
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner) = Some(resp.id);
                    }
                }
            }
            Message::Notification { method, .. } => {
                tracing::debug!("Ignoring MCP notification '{method}'");
            }
            Message::Request { method, .. } => {
                tracing::debug!("Ignoring server-initiated MCP request '{method}'");
            }
        }
    }
}
