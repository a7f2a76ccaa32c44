// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Streamable HTTP transport.
//!
//! `initialize` and `tools/list` are sent as independent POSTs, each with
//! its own timeout. A session id returned on `initialize` is replayed on
//! `tools/list`. Every failure is classified into the
//! [`ErrorKind`](super::types::ErrorKind) taxonomy here, with a diagnostics
//! bundle attached.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::diagnostics::{self, DiagnosticsBuilder};
use super::oauth::{self, OAuthDiscovery};
use super::protocol;
use super::types::{AssessmentError, Diagnostics, ErrorKind, TokenMetrics};

/// Default per-request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the well-known OAuth lookup.
pub const DEFAULT_OAUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Session header, matched case-insensitively.
pub const MCP_SESSION_ID: &str = "mcp-session-id";

/// Accept header value sent on every request.
pub const ACCEPT_VALUE: &str = "application/json, text/event-stream";

/// Which request of the handshake an exchange belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialize,
    ToolsList,
}

impl Phase {
    pub fn method(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ToolsList => "tools/list",
        }
    }
}

/// One completed POST: what was sent and what came back.
#[derive(Debug, Clone)]
pub struct RpcExchange {
    pub url: String,
    /// Headers as sent, unmasked.
    pub request_headers: HashMap<String, String>,
    pub request_body: String,
    pub status: StatusCode,
    pub response_headers: HeaderMap,
    pub body: String,
}

impl RpcExchange {
    /// Session id from the response, if any.
    pub fn session_id(&self) -> Option<String> {
        self.response_headers
            .get(MCP_SESSION_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        DiagnosticsBuilder::request(
            "POST",
            &self.url,
            &self.request_headers,
            self.request_body.clone(),
        )
        .response(&self.response_headers, &self.body)
        .build()
    }

    /// Masked request, for display.
    pub fn request_text(&self) -> String {
        diagnostics::format_request(
            "POST",
            &self.url,
            &diagnostics::mask_headers(&self.request_headers),
            &self.request_body,
        )
    }

    /// Status line, headers and truncated body, for display.
    pub fn response_text(&self) -> String {
        format!(
            "HTTP {} {}\n{}\n\n{}",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or(""),
            diagnostics::format_headers(&diagnostics::header_map_to_strings(&self.response_headers)),
            diagnostics::truncate_body(&self.body)
        )
    }
}

/// Build the header set for a request.
///
/// `Content-Type` and `Accept` are fixed by the wire contract and always
/// win over caller headers. Invalid caller names or values are skipped.
pub fn build_headers(
    caller: &HashMap<String, String>,
    session_id: Option<&str>,
) -> (HeaderMap, HashMap<String, String>) {
    let mut map = HeaderMap::new();

    for (name, value) in caller {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                if name == CONTENT_TYPE || name == ACCEPT {
                    debug!(header = %name, "Ignoring caller override of a fixed header");
                    continue;
                }
                map.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid header"),
        }
    }

    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    map.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));

    if let Some(session_id) = session_id {
        if let Ok(value) = HeaderValue::from_str(session_id) {
            map.insert(HeaderName::from_static(MCP_SESSION_ID), value);
        }
    }

    let display = diagnostics::header_map_to_strings(&map);
    (map, display)
}

/// Decode the tools array of a successful `tools/list` exchange.
///
/// A missing array (including a JSON-RPC error body) and an empty array
/// are both `unknown` failures.
pub fn tools_from_exchange(exchange: &RpcExchange) -> Result<Vec<Value>, AssessmentError> {
    let Some(tools) = protocol::decode_tools(&exchange.body) else {
        let message = match protocol::decode_error(&exchange.body) {
            Some((code, message)) => format!("tools/list failed: {} (code {})", message, code),
            None => "Invalid tools/list response: no tools array found".to_string(),
        };
        return Err(AssessmentError::unknown(message).with_diagnostics(exchange.diagnostics()));
    };

    if tools.is_empty() {
        return Err(AssessmentError::unknown("Server returned no tools")
            .with_diagnostics(exchange.diagnostics()));
    }
    Ok(tools)
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown").to_string()
}

/// Assesses URL-based servers.
#[derive(Debug, Clone)]
pub struct HttpTransportClient {
    client: Client,
    timeout: Duration,
    client_name: String,
    oauth: OAuthDiscovery,
}

impl Default for HttpTransportClient {
    fn default() -> Self {
        Self::new(
            Client::new(),
            DEFAULT_HTTP_TIMEOUT,
            DEFAULT_OAUTH_TIMEOUT,
            crate::CLIENT_NAME,
        )
    }
}

impl HttpTransportClient {
    pub fn new(
        client: Client,
        timeout: Duration,
        oauth_timeout: Duration,
        client_name: impl Into<String>,
    ) -> Self {
        Self {
            oauth: OAuthDiscovery::new(client.clone(), oauth_timeout),
            client,
            timeout,
            client_name: client_name.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// JSON-RPC body for a handshake phase.
    pub fn request_body(&self, phase: Phase) -> Value {
        match phase {
            Phase::Initialize => protocol::initialize_request(&self.client_name, crate::VERSION),
            Phase::ToolsList => protocol::tools_list_request(),
        }
    }

    /// POST one JSON-RPC message.
    ///
    /// Only transport failures are errors here: `timeout` if the request
    /// ran out of time, `connection_failed` otherwise. Any HTTP status is
    /// returned as an exchange.
    pub async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        session_id: Option<&str>,
        body: &Value,
    ) -> Result<RpcExchange, AssessmentError> {
        let (header_map, sent_headers) = build_headers(headers, session_id);
        let request_body = body.to_string();

        let result = self
            .client
            .post(url)
            .headers(header_map)
            .body(request_body.clone())
            .timeout(self.timeout)
            .send()
            .await;

        let transport_error = |e: reqwest::Error| {
            let diag = DiagnosticsBuilder::request("POST", url, &sent_headers, request_body.clone())
                .raw_error(&e)
                .build();
            let err = if e.is_timeout() {
                AssessmentError::timeout(format!(
                    "Request timed out after {}s",
                    self.timeout.as_secs()
                ))
            } else {
                AssessmentError::connection_failed(format!("Failed to connect: {}", e))
            };
            err.with_diagnostics(diag)
        };

        let response = result.map_err(transport_error)?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await.map_err(transport_error)?;

        Ok(RpcExchange {
            url: url.to_string(),
            request_headers: sent_headers,
            request_body,
            status,
            response_headers,
            body,
        })
    }

    /// Send `initialize`. Non-2xx responses are classified.
    pub async fn initialize(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<RpcExchange, AssessmentError> {
        let exchange = self
            .post(url, headers, None, &self.request_body(Phase::Initialize))
            .await?;

        if !exchange.status.is_success() {
            return Err(self.classify_failure(Phase::Initialize, &exchange, None).await);
        }
        Ok(exchange)
    }

    /// Send `tools/list` and decode the tools.
    ///
    /// An empty array is an error.
    pub async fn list_tools(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        session_id: Option<&str>,
    ) -> Result<(Vec<Value>, RpcExchange), AssessmentError> {
        let exchange = self
            .post(url, headers, session_id, &self.request_body(Phase::ToolsList))
            .await?;

        if !exchange.status.is_success() {
            return Err(self
                .classify_failure(Phase::ToolsList, &exchange, session_id)
                .await);
        }

        let tools = tools_from_exchange(&exchange)?;
        Ok((tools, exchange))
    }

    /// Full handshake: `initialize` then `tools/list` with session replay.
    #[instrument(skip(self, headers))]
    pub async fn assess(
        &self,
        server: &str,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<TokenMetrics, AssessmentError> {
        let init = self.initialize(url, headers).await?;
        let session_id = init.session_id();
        debug!(session = session_id.is_some(), "Initialized");

        let (tools, _) = self.list_tools(url, headers, session_id.as_deref()).await?;
        let metrics = TokenMetrics::from_tools(&tools);

        debug!(
            tools = metrics.tool_count,
            tokens = metrics.estimated_tokens,
            "HTTP assessment complete"
        );
        Ok(metrics)
    }

    /// Best-effort HEAD used to probe reachability.
    pub async fn head(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<StatusCode, reqwest::Error> {
        let (header_map, _) = build_headers(headers, None);
        let response = self
            .client
            .head(url)
            .headers(header_map)
            .timeout(timeout)
            .send()
            .await?;
        Ok(response.status())
    }

    /// Map a non-2xx exchange onto the error taxonomy.
    ///
    /// 401/403 check OAuth signals before falling back to `auth_failed`.
    pub async fn classify_failure(
        &self,
        phase: Phase,
        exchange: &RpcExchange,
        session_id: Option<&str>,
    ) -> AssessmentError {
        let status = exchange.status;
        let code = status.as_u16();
        let text = status_text(status);

        let err = if oauth::is_auth_status(status) {
            match self.oauth.detect(&exchange.url, &exchange.response_headers).await {
                Some(metadata) => AssessmentError::new(
                    ErrorKind::OauthRequired,
                    format!("Server requires OAuth authentication ({} {})", code, text),
                )
                .with_oauth(metadata),
                None => AssessmentError::new(
                    ErrorKind::AuthFailed,
                    format!(
                        "Authentication failed during {} ({} {})",
                        phase.method(),
                        code,
                        text
                    ),
                ),
            }
        } else if phase == Phase::ToolsList
            && status == StatusCode::BAD_REQUEST
            && is_session_rejection(session_id, &exchange.body)
        {
            let detail = if session_id.is_none() {
                "no Mcp-Session-Id was issued by initialize"
            } else {
                "the session was rejected"
            };
            AssessmentError::connection_failed(format!(
                "tools/list rejected with 400 Bad Request; the server likely requires \
                 session-based authentication ({})",
                detail
            ))
        } else {
            AssessmentError::connection_failed(format!(
                "HTTP {} {} during {}",
                code,
                text,
                phase.method()
            ))
        };

        debug!(status = code, kind = %err.kind, phase = phase.method(), "Request failed");
        err.with_status(code, text)
            .with_diagnostics(exchange.diagnostics())
    }
}

fn is_session_rejection(session_id: Option<&str>, body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    session_id.is_none() || body.contains("session") || body.contains("invalid")
}
