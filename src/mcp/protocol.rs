// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! JSON-RPC 2.0 framing for the MCP handshake.
//!
//! Only two requests are ever sent: `initialize` (id 1) and `tools/list`
//! (id 2). Incoming messages are decoded into a strict [`RpcMessage`]
//! variant, with [`RpcMessage::Unparseable`] for anything else.
//!
//! `tools/list` bodies arrive either as one JSON document or as a
//! server-sent event stream. [`decode_tools`] runs an ordered chain of
//! [`ToolsDecoder`]s and returns the first hit.

use serde_json::{json, Value};

/// MCP protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Request id of `initialize`.
pub const INITIALIZE_ID: u64 = 1;

/// Request id of `tools/list`.
pub const TOOLS_LIST_ID: u64 = 2;

/// Build the `initialize` request.
pub fn initialize_request(client_name: &str, client_version: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": INITIALIZE_ID,
        "method": "initialize",
        "params": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": client_name,
                "version": client_version
            }
        }
    })
}

/// Build the `notifications/initialized` notification.
pub fn initialized_notification() -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    })
}

/// Build the `tools/list` request.
pub fn tools_list_request() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": TOOLS_LIST_ID,
        "method": "tools/list",
        "params": {}
    })
}

/// A decoded JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    /// Result of `initialize`.
    InitializeResult {
        server_name: Option<String>,
        protocol_version: Option<String>,
    },
    /// Result of `tools/list`.
    ToolsList(Vec<Value>),
    /// Reply to `tools/list` whose `result.tools` is missing or not an array.
    MalformedToolsList,
    /// Error response to one of our requests.
    Error {
        id: Option<u64>,
        code: i64,
        message: String,
    },
    /// Valid JSON-RPC that is not a reply we care about (notifications,
    /// server requests, replies to unknown ids).
    Other,
    /// Not JSON, or a reply whose shape did not type-check.
    Unparseable,
}

impl RpcMessage {
    /// Decode one JSON-RPC message from text.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Self::Unparseable,
        }
    }

    /// Decode one JSON-RPC message from a JSON value.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::Unparseable;
        };

        let id = object.get("id").and_then(Value::as_u64);

        if let Some(error) = object.get("error") {
            return Self::Error {
                id,
                code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
            };
        }

        let Some(result) = object.get("result") else {
            return Self::Other;
        };

        match id {
            Some(INITIALIZE_ID) => {
                if !result.is_object() {
                    return Self::Unparseable;
                }
                Self::InitializeResult {
                    server_name: result
                        .pointer("/serverInfo/name")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    protocol_version: result
                        .get("protocolVersion")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }
            }
            Some(TOOLS_LIST_ID) => match result.get("tools").and_then(Value::as_array) {
                Some(tools) => Self::ToolsList(tools.clone()),
                None => Self::MalformedToolsList,
            },
            _ => Self::Other,
        }
    }
}

/// One strategy for pulling a `result.tools` array out of a response body.
pub trait ToolsDecoder: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Return the tools if this decoder recognizes the body.
    fn decode(&self, body: &str) -> Option<Vec<Value>>;
}

/// The body is a single JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl ToolsDecoder for JsonDecoder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, body: &str) -> Option<Vec<Value>> {
        let value: Value = serde_json::from_str(body.trim()).ok()?;
        tools_from_value(&value)
    }
}

/// The body is an event stream; the first `data:` line carrying
/// `result.tools` wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseDecoder;

impl ToolsDecoder for SseDecoder {
    fn name(&self) -> &'static str {
        "sse"
    }

    fn decode(&self, body: &str) -> Option<Vec<Value>> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
            .find_map(|value| tools_from_value(&value))
    }
}

fn tools_from_value(value: &Value) -> Option<Vec<Value>> {
    value
        .pointer("/result/tools")
        .and_then(Value::as_array)
        .cloned()
}

/// Decoders tried in order: plain JSON, then event stream.
pub fn default_decoders() -> Vec<Box<dyn ToolsDecoder>> {
    vec![Box::new(JsonDecoder), Box::new(SseDecoder)]
}

/// Run a decoder chain over a `tools/list` body.
pub fn decode_tools_with(decoders: &[Box<dyn ToolsDecoder>], body: &str) -> Option<Vec<Value>> {
    decoders.iter().find_map(|decoder| {
        let tools = decoder.decode(body)?;
        tracing::trace!(decoder = decoder.name(), tools = tools.len(), "Decoded tools/list body");
        Some(tools)
    })
}

/// Run the default decoder chain over a `tools/list` body.
pub fn decode_tools(body: &str) -> Option<Vec<Value>> {
    decode_tools_with(&default_decoders(), body)
}

/// Pull a JSON-RPC error out of a body in either encoding.
pub fn decode_error(body: &str) -> Option<(i64, String)> {
    let from_message = |message: RpcMessage| match message {
        RpcMessage::Error { code, message, .. } => Some((code, message)),
        _ => None,
    };

    from_message(RpcMessage::parse(body)).or_else(|| {
        body.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .find_map(|data| from_message(RpcMessage::parse(data)))
    })
}
