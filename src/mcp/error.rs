// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transport-level error types.
//!
//! These never leave the engine: the orchestrator maps them onto the
//! [`ErrorKind`](super::types::ErrorKind) taxonomy.

use thiserror::Error;

/// Errors raised while talking to an MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process could not be started.
    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The handshake did not finish in time.
    #[error("Handshake with MCP server '{server}' timed out after {timeout_secs}s")]
    HandshakeTimeout { server: String, timeout_secs: u64 },

    /// The server process exited before answering `tools/list`.
    #[error("MCP server '{server}' exited before listing tools{}", status_suffix(.status))]
    ProcessExited {
        server: String,
        status: Option<String>,
    },

    /// The server answered with a JSON-RPC error.
    #[error("Protocol error: code={code}, message={message}")]
    Protocol { code: i64, message: String },

    /// Invalid response from server.
    #[error("Invalid response from MCP server: {0}")]
    InvalidResponse(String),

    /// Descriptor cannot be used with the requested transport.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<String>) -> String {
    status
        .as_ref()
        .map(|s| format!(" ({})", s))
        .unwrap_or_default()
}

impl McpError {
    /// Create a protocol error.
    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Whether the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::HandshakeTimeout { .. })
    }
}
