// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stdio transport: spawn the server and handshake over its standard streams.
//!
//! The whole handshake runs under one deadline. Whatever ends it first
//! (result, JSON-RPC error, stdout EOF, deadline) the child is killed
//! before [`StdioTransportClient::assess`] returns; `kill_on_drop` covers
//! the remaining unwind paths.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, instrument, trace};

use super::error::McpError;
use super::protocol::{self, RpcMessage, INITIALIZE_ID, TOOLS_LIST_ID};
use super::registry;
use super::types::TokenMetrics;

/// Default wall-clock budget for the full stdio handshake.
pub const DEFAULT_STDIO_TIMEOUT: Duration = Duration::from_secs(15);

/// Incremental newline framer over a byte stream.
///
/// Bytes are buffered until a `\n` arrives, so messages split across
/// arbitrary read boundaries (including inside a UTF-8 sequence) come out
/// whole. A trailing fragment without a newline at EOF is dropped.
pub struct LineFramer<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Next complete line without its terminator, or `None` at EOF.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 || self.buf.last() != Some(&b'\n') {
            return Ok(None);
        }

        self.buf.pop();
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> Result<(), McpError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Drive `initialize` → `notifications/initialized` → `tools/list`.
///
/// Returns the raw tools array. Generic over the streams so it can run
/// against in-memory pipes.
pub async fn handshake<W, R>(
    server: &str,
    client_name: &str,
    mut stdin: W,
    stdout: R,
) -> Result<Vec<Value>, McpError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new(stdout);

    write_message(
        &mut stdin,
        &protocol::initialize_request(client_name, crate::VERSION),
    )
    .await?;

    loop {
        let Some(line) = framer.next_line().await? else {
            return Err(McpError::ProcessExited {
                server: server.to_string(),
                status: None,
            });
        };

        if line.trim().is_empty() {
            continue;
        }

        match RpcMessage::parse(&line) {
            RpcMessage::InitializeResult {
                server_name,
                protocol_version,
            } => {
                debug!(
                    server,
                    server_name = server_name.as_deref().unwrap_or("unknown"),
                    protocol_version = protocol_version.as_deref().unwrap_or("unknown"),
                    "Initialized"
                );
                write_message(&mut stdin, &protocol::initialized_notification()).await?;
                write_message(&mut stdin, &protocol::tools_list_request()).await?;
            }
            RpcMessage::ToolsList(tools) => return Ok(tools),
            RpcMessage::MalformedToolsList => {
                return Err(McpError::InvalidResponse(
                    "tools/list result has no tools array".to_string(),
                ))
            }
            RpcMessage::Error {
                id: Some(INITIALIZE_ID | TOOLS_LIST_ID),
                code,
                message,
            } => return Err(McpError::protocol(code, message)),
            RpcMessage::Error { .. } | RpcMessage::Other => {}
            RpcMessage::Unparseable => {
                trace!(server, line = %line, "Ignoring non JSON-RPC output");
            }
        }
    }
}

async fn forward_stderr(server: String, stderr: ChildStderr) {
    let mut framer = LineFramer::new(stderr);
    while let Ok(Some(line)) = framer.next_line().await {
        if !line.trim().is_empty() {
            debug!(server = %server, "stderr: {}", line);
        }
    }
}

/// Kill the child unless it already exited. Errors are ignored.
async fn terminate(child: &mut Child) -> Option<String> {
    match child.try_wait() {
        Ok(Some(status)) => Some(status.to_string()),
        _ => {
            if let Err(e) = child.kill().await {
                trace!(error = %e, "Kill failed");
            }
            None
        }
    }
}

/// Assesses process-based servers.
#[derive(Debug, Clone)]
pub struct StdioTransportClient {
    timeout: Duration,
    client_name: String,
}

impl Default for StdioTransportClient {
    fn default() -> Self {
        Self::new(DEFAULT_STDIO_TIMEOUT, crate::CLIENT_NAME)
    }
}

impl StdioTransportClient {
    pub fn new(timeout: Duration, client_name: impl Into<String>) -> Self {
        Self {
            timeout,
            client_name: client_name.into(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Spawn the server and list its tools.
    ///
    /// Package-runner launches get `package_name` / `installed_version`.
    #[instrument(skip(self, args, env))]
    pub async fn assess(
        &self,
        server: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<TokenMetrics, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| McpError::SpawnFailed {
            command: command.to_string(),
            source,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            terminate(&mut child).await;
            return Err(McpError::Config("child stdio was not captured".to_string()));
        };
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(server.to_string(), stderr));
        }

        let outcome = tokio::time::timeout(
            self.timeout,
            handshake(server, &self.client_name, stdin, stdout),
        )
        .await;

        let exit_status = terminate(&mut child).await;

        let tools = match outcome {
            Ok(Ok(tools)) => tools,
            Ok(Err(McpError::ProcessExited { server, .. })) => {
                return Err(McpError::ProcessExited {
                    server,
                    status: exit_status,
                })
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(McpError::HandshakeTimeout {
                    server: server.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        };

        let mut metrics = TokenMetrics::from_tools(&tools);
        if let Some(package) = registry::package_from_command(command, args) {
            registry::apply_package(&mut metrics, &package);
        }

        debug!(
            tools = metrics.tool_count,
            tokens = metrics.estimated_tokens,
            "Stdio assessment complete"
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_framer_reassembles_chunks() {
        let (mut tx, rx) = duplex(64);
        let mut framer = LineFramer::new(rx);

        let writer = tokio::spawn(async move {
            tx.write_all(b"{\"a\":").await.unwrap();
            tokio::task::yield_now().await;
            tx.write_all(b"1}\r\n{\"b\"").await.unwrap();
            tx.write_all(b":2}\npartial").await.unwrap();
        });

        assert_eq!(framer.next_line().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(framer.next_line().await.unwrap().as_deref(), Some("{\"b\":2}"));
        writer.await.unwrap();
        assert_eq!(framer.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_framer_split_utf8() {
        let bytes = "{\"name\":\"café\"}\n".as_bytes();
        let split = bytes.len() - 4; // inside the two-byte 'é'
        let (mut tx, rx) = duplex(8);
        let (head, tail) = (bytes[..split].to_vec(), bytes[split..].to_vec());

        tokio::spawn(async move {
            tx.write_all(&head).await.unwrap();
            tx.write_all(&tail).await.unwrap();
        });

        let mut framer = LineFramer::new(rx);
        assert_eq!(
            framer.next_line().await.unwrap().as_deref(),
            Some("{\"name\":\"café\"}")
        );
    }

    #[tokio::test]
    async fn test_handshake_in_memory() {
        let (client_in, mut server_in) = duplex(4096);
        let (mut server_out, client_out) = duplex(4096);

        let server = tokio::spawn(async move {
            let mut seen = String::new();
            let mut buf = [0u8; 1024];

            server_out
                .write_all(b"booting...\n{\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\"}\n")
                .await
                .unwrap();

            while !seen.contains("\"method\":\"initialize\"") {
                let n = server_in.read(&mut buf).await.unwrap();
                seen.push_str(std::str::from_utf8(&buf[..n]).unwrap());
            }
            server_out
                .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"serverInfo\":{\"name\":\"mem\"}}}\n")
                .await
                .unwrap();

            while !seen.contains("tools/list") {
                let n = server_in.read(&mut buf).await.unwrap();
                seen.push_str(std::str::from_utf8(&buf[..n]).unwrap());
            }
            server_out
                .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[{\"name\":\"t\"}]}}\n")
                .await
                .unwrap();
            seen
        });

        let tools = handshake("mem", "mcp-assess", client_in, client_out)
            .await
            .unwrap();
        assert_eq!(tools.len(), 1);

        let seen = server.await.unwrap();
        let init_at = seen.find("notifications/initialized").unwrap();
        let list_at = seen.find("tools/list").unwrap();
        assert!(init_at < list_at);
    }

    #[tokio::test]
    async fn test_handshake_rpc_error() {
        let (client_in, _server_in) = duplex(4096);
        let (mut server_out, client_out) = duplex(4096);

        server_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32602,\"message\":\"bad version\"}}\n")
            .await
            .unwrap();

        let err = handshake("e", "mcp-assess", client_in, client_out)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Protocol { code: -32602, .. }));
    }

    #[tokio::test]
    async fn test_handshake_malformed_tools_list() {
        let (client_in, _server_in) = duplex(4096);
        let (mut server_out, client_out) = duplex(4096);

        server_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":{\"oops\":1}}}\n")
            .await
            .unwrap();

        let err = handshake("m", "mcp-assess", client_in, client_out)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidResponse(ref m) if m.contains("no tools array")));
    }

    #[tokio::test]
    async fn test_handshake_eof() {
        let (client_in, _server_in) = duplex(4096);
        let (server_out, client_out) = duplex(4096);
        drop(server_out);

        let err = handshake("gone", "mcp-assess", client_in, client_out)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ProcessExited { .. }));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let client = StdioTransportClient::default();
        let err = client
            .assess("missing", "definitely-not-a-real-binary-4242", &[], &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::SpawnFailed { .. }));
    }
}
