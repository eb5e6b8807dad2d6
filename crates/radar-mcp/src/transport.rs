//! Stdio transport for MCP server communication.
//!
//! Spawns a child process and exchanges newline-delimited JSON-RPC messages
//! over its stdin/stdout. A background task drains stdout and hands each
//! decoded message to an [`InboundSink`].

use crate::correlator::{InboundSink, Outbound};
use crate::error::McpError;
use crate::jsonrpc::Message;
use radar_types::preview;
use std::collections::HashMap;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long a server gets to exit on its own after stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Async stdio transport for communicating with an MCP server process.
pub struct StdioTransport {
    command: String,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Child>,
    reader_handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl StdioTransport {
    /// Spawn the server process and start the background reader.
    ///
    /// The child's stderr is inherited so server diagnostics reach the host's stderr.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        sink: Arc<dyn InboundSink>,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let launch_err = |source: std::io::Error| McpError::Launch {
            command: command.to_string(),
            source,
        };

        let mut child = cmd.spawn().map_err(launch_err)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| launch_err(std::io::Error::other("stdin was not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| launch_err(std::io::Error::other("stdout was not captured")))?;

        let cancel = CancellationToken::new();
        let reader_handle = tokio::spawn(read_loop(stdout, sink, cancel.clone()));

        tracing::debug!("Spawned MCP server: {command} {}", args.join(" "));

        Ok(Self {
            command: command.to_string(),
            stdin: Mutex::new(Some(stdin)),
            child: Mutex::new(child),
            reader_handle,
            cancel,
        })
    }

    /// The command this transport was launched with.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the background reader is still draining stdout.
    pub fn is_reading(&self) -> bool {
        !self.reader_handle.is_finished()
    }

    /// Shut down the transport: close stdin, wait briefly, then kill.
    ///
    /// Output still buffered in the pipe may be lost.
    pub async fn shutdown(self) {
        // EOF on stdin asks well-behaved servers to exit.
        self.stdin.lock().await.take();

        let mut child = self.child.into_inner();
        if tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await.is_err() {
            tracing::debug!("MCP server '{}' ignored EOF, killing it", self.command);
            let _ = child.kill().await;
        }

        self.cancel.cancel();
        let _ = self.reader_handle.await;
    }
}

impl Outbound for StdioTransport {
    fn send_line(&self, line: String) -> impl Future<Output = Result<(), McpError>> + Send {
        async move {
            let mut line = line;
            line.push('\n');

            let mut stdin = self.stdin.lock().await;
            let stdin = stdin.as_mut().ok_or_else(|| {
                McpError::Transport(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "stdin already closed",
                ))
            })?;
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(McpError::Transport)?;
            stdin.flush().await.map_err(McpError::Transport)
        }
    }
}

/// Drain stdout line by line until EOF, a read error, or cancellation.
async fn read_loop(stdout: ChildStdout, sink: Arc<dyn InboundSink>, cancel: CancellationToken) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                tracing::debug!("MCP server closed stdout");
                break;
            }
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim();
                if line.is_empty() {
                    continue;
                }
                match Message::decode(line) {
                    Ok(message) => sink.deliver(message),
                    Err(e) => {
                        tracing::warn!("Dropping undecodable MCP line: {e}: {}", preview(line, 200));
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read MCP server stdout: {e}");
                break;
            }
        }
    }
}
