// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stdio transport scenarios driven by small shell scripts.

#![cfg(unix)]

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tempfile::TempDir;

use mcp_assess::config::AssessConfig;
use mcp_assess::mcp::estimator::{estimate_tokens, schema_chars};
use mcp_assess::mcp::{Assessor, ErrorKind, ServerDescriptor};

const INIT_RESULT: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"script","version":"0.0.1"}}}"#;

fn tools() -> Value {
    json!([
        {"name": "read_file", "description": "Read a file", "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}}}},
        {"name": "write_file", "description": "Write a file", "inputSchema": {"type": "object"}},
        {"name": "list_dir", "inputSchema": {"type": "object"}}
    ])
}

fn tools_line(tools: &Value) -> String {
    json!({"jsonrpc": "2.0", "id": 2, "result": {"tools": tools}}).to_string()
}

fn script(name: &str, body: String) -> ServerDescriptor {
    ServerDescriptor::stdio(name, "sh").with_args(["-c".to_string(), body])
}

fn assessor(timeout_secs: u64) -> Assessor {
    Assessor::new(AssessConfig {
        stdio_timeout_secs: timeout_secs,
        sdk_validation: false,
        ..AssessConfig::default()
    })
}

/// Answers initialize, swallows the notification, answers tools/list.
fn well_behaved(tools: &Value) -> String {
    format!(
        "read line; printf '%s\\n' '{}'; read line; read line; printf '%s\\n' '{}'; sleep 5",
        INIT_RESULT,
        tools_line(tools)
    )
}

#[tokio::test]
async fn test_stdio_handshake_counts_tools() {
    let tools = tools();
    let descriptor = script("fs", well_behaved(&tools));

    let start = Instant::now();
    let metrics = assessor(15)
        .assess(&descriptor)
        .await
        .into_result()
        .unwrap();

    assert_eq!(metrics.tool_count, 3);
    let chars = schema_chars(tools.as_array().unwrap());
    assert_eq!(metrics.schema_chars, chars);
    assert_eq!(metrics.estimated_tokens, estimate_tokens(chars));
    assert!(metrics.package_name.is_none());
    // The trailing sleep is killed rather than waited out.
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_stdio_chunked_output_and_noise() {
    let tools = tools();
    let line = tools_line(&tools);
    let (head, tail) = line.split_at(line.len() / 2);
    let body = format!(
        "read line; echo 'starting server...' >&2; echo 'not json'; \
         printf '%s\\n' '{}'; read line; read line; \
         printf '%s' '{}'; sleep 0.2; printf '%s\\n' '{}'",
        INIT_RESULT, head, tail
    );

    let metrics = assessor(15)
        .assess(&script("chunked", body))
        .await
        .into_result()
        .unwrap();
    assert_eq!(metrics.tool_count, 3);
}

#[tokio::test]
async fn test_stdio_silent_server_times_out_and_is_killed() {
    let dir = TempDir::new().unwrap();
    let pidfile = dir.path().join("pid");
    let body = format!("echo $$ > '{}'; exec sleep 30", pidfile.display());

    let start = Instant::now();
    let err = assessor(1)
        .assess(&script("silent", body))
        .await
        .into_result()
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(err.kind, ErrorKind::Unknown);
    assert!(err.message.contains("timed out"), "{}", err.message);
    assert!(err.diagnostics.is_none());

    let pid = std::fs::read_to_string(&pidfile).unwrap();
    let alive = std::process::Command::new("kill")
        .args(["-0", pid.trim()])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(!alive.success(), "server process {} still running", pid.trim());
}

#[tokio::test]
async fn test_stdio_early_exit() {
    let err = assessor(15)
        .assess(&script("crash", "read line; exit 3".to_string()))
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unknown);
    assert!(err.message.contains("exited"), "{}", err.message);
}

#[tokio::test]
async fn test_stdio_initialize_error() {
    let body = r#"read line; printf '%s\n' '{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"unsupported protocol"}}'; sleep 10"#;

    let start = Instant::now();
    let err = assessor(15)
        .assess(&script("rejecting", body.to_string()))
        .await
        .into_result()
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(err.kind, ErrorKind::Unknown);
    assert!(err.message.contains("Protocol error"), "{}", err.message);
    assert!(err.message.contains("unsupported protocol"));
}

#[tokio::test]
async fn test_stdio_malformed_tools_list_fails_fast() {
    let body = format!(
        "read line; printf '%s\\n' '{}'; read line; read line; \
         printf '%s\\n' '{{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{{\"tools\":{{\"oops\":1}}}}}}'; sleep 10",
        INIT_RESULT
    );

    let start = Instant::now();
    let err = assessor(4)
        .assess(&script("malformed", body))
        .await
        .into_result()
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(err.kind, ErrorKind::Unknown);
    assert!(err.message.contains("no tools array"), "{}", err.message);
    assert!(!err.message.contains("timed out"));
}

#[tokio::test]
async fn test_stdio_zero_tools() {
    let err = assessor(15)
        .assess(&script("empty", well_behaved(&json!([]))))
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unknown);
    assert_eq!(err.message, "Server returned no tools");
}

#[tokio::test]
async fn test_stdio_env_is_passed() {
    let body = format!(
        "read line; printf '%s\\n' '{}'; read line; read line; \
         if [ \"$MCP_TEST_TOKEN\" = secret ]; then printf '%s\\n' '{}'; fi",
        INIT_RESULT,
        tools_line(&tools())
    );
    let descriptor = script("env", body).with_env([("MCP_TEST_TOKEN", "secret")]);

    let metrics = assessor(15)
        .assess(&descriptor)
        .await
        .into_result()
        .unwrap();
    assert_eq!(metrics.tool_count, 3);
}
