// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Value types shared by the transports, the connection test runner and
//! the orchestrator.
//!
//! Everything here is plain data: serializable, cloneable and free of I/O.
//! Field names serialize in camelCase so the editor panel and the CLI can
//! consume them unchanged.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity and reachability info for one MCP server.
///
/// Supplied by the configuration collaborator. A descriptor is either
/// process-based (`command`) or HTTP-based (`url`); see [`ServerDescriptor::transport`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDescriptor {
    /// Unique server name.
    pub name: String,

    /// Command to launch a process-based server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments for `command`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Extra environment for `command`, merged over the inherited one.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Endpoint of an HTTP-based server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Extra request headers for `url`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// Resolved transport of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport<'a> {
    /// Child process speaking newline-delimited JSON-RPC.
    Process {
        command: &'a str,
        args: &'a [String],
        env: &'a HashMap<String, String>,
    },
    /// JSON-RPC over HTTP POST.
    Http {
        url: &'a str,
        headers: &'a HashMap<String, String>,
    },
}

impl ServerDescriptor {
    /// Create a process-based descriptor.
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: Some(command.into()),
            ..Default::default()
        }
    }

    /// Create an HTTP-based descriptor.
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Add command arguments.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Set environment variables.
    pub fn with_env(
        mut self,
        env: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.env = env.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Resolve the transport. A `command` wins over a `url` when both are set.
    pub fn transport(&self) -> Option<Transport<'_>> {
        let command = self.command.as_deref().filter(|c| !c.trim().is_empty());
        let url = self.url.as_deref().filter(|u| !u.trim().is_empty());

        match (command, url) {
            (Some(command), _) => Some(Transport::Process {
                command,
                args: &self.args,
                env: &self.env,
            }),
            (None, Some(url)) => Some(Transport::Http {
                url,
                headers: &self.headers,
            }),
            (None, None) => None,
        }
    }

    /// Whether this descriptor launches a child process.
    pub fn is_process(&self) -> bool {
        matches!(self.transport(), Some(Transport::Process { .. }))
    }
}

/// Context-window cost of one successfully assessed server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetrics {
    /// Number of tools the server advertises.
    pub tool_count: usize,

    /// Character length of the serialized tool array.
    pub schema_chars: usize,

    /// `round(schema_chars / 3.5)`.
    pub estimated_tokens: u64,

    /// When the assessment completed.
    pub assessed_at: DateTime<Utc>,

    /// Package launched by a package-runner command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,

    /// Version pinned in the launch arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,

    /// Latest published version of `package_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,

    /// When `latest_version` was looked up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_checked_at: Option<DateTime<Utc>>,
}

impl TokenMetrics {
    /// Build metrics from a raw `tools` array.
    pub fn from_tools(tools: &[serde_json::Value]) -> Self {
        let schema_chars = super::estimator::schema_chars(tools);
        Self {
            tool_count: tools.len(),
            schema_chars,
            estimated_tokens: super::estimator::estimate_tokens(schema_chars),
            assessed_at: Utc::now(),
            package_name: None,
            installed_version: None,
            latest_version: None,
            version_checked_at: None,
        }
    }
}

/// Closed taxonomy of assessment failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthFailed,
    OauthRequired,
    ConnectionFailed,
    Timeout,
    SdkMismatch,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthFailed => write!(f, "auth_failed"),
            Self::OauthRequired => write!(f, "oauth_required"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::SdkMismatch => write!(f, "sdk_mismatch"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// How OAuth metadata was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectedVia {
    #[serde(rename = "well-known")]
    WellKnown,
    #[serde(rename = "www-authenticate")]
    WwwAuthenticate,
}

/// OAuth protected-resource metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    #[serde(rename = "authorization_servers", default)]
    pub authorization_servers: Vec<String>,

    #[serde(rename = "scopes_supported", default)]
    pub scopes_supported: Vec<String>,

    #[serde(rename = "bearer_methods_supported", default)]
    pub bearer_methods_supported: Vec<String>,

    #[serde(
        rename = "resource_documentation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_documentation: Option<String>,

    pub detected_via: DetectedVia,

    /// Raw `WWW-Authenticate` challenge, when one was seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub www_authenticate: Option<String>,

    pub discovered_at: DateTime<Utc>,
}

impl OAuthMetadata {
    /// Minimal record synthesized from a bearer challenge header.
    pub fn from_challenge(www_authenticate: impl Into<String>) -> Self {
        Self {
            resource: None,
            authorization_servers: Vec::new(),
            scopes_supported: Vec::new(),
            bearer_methods_supported: Vec::new(),
            resource_documentation: None,
            detected_via: DetectedVia::WwwAuthenticate,
            www_authenticate: Some(www_authenticate.into()),
            discovered_at: Utc::now(),
        }
    }

    /// Well-known metadata needs at least one authorization server; a
    /// challenge-derived record only needs the raw header.
    pub fn is_valid(&self) -> bool {
        match self.detected_via {
            DetectedVia::WellKnown => !self.authorization_servers.is_empty(),
            DetectedVia::WwwAuthenticate => self
                .www_authenticate
                .as_deref()
                .is_some_and(|h| !h.is_empty()),
        }
    }
}

/// Tool counts seen by the raw client and the reference client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkValidation {
    pub direct_fetch_tools: usize,

    /// `-1` when the reference client failed outright.
    pub sdk_transport_tools: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_error: Option<String>,
}

/// Request/response capture attached to an HTTP failure.
///
/// Human troubleshooting text only; nothing parses it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub request_url: String,
    pub request_method: String,
    /// Sensitive values masked.
    pub request_headers: HashMap<String, String>,
    pub request_body: String,
    /// Truncated to 500 characters.
    pub response_body: String,
    pub response_headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_error: Option<String>,
}

/// Structured assessment failure.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct AssessmentError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,

    pub error_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_metadata: Option<OAuthMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_validation: Option<SdkValidation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl AssessmentError {
    /// Create an error of the given kind, stamped now.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            status_text: None,
            error_at: Utc::now(),
            oauth_metadata: None,
            sdk_validation: None,
            diagnostics: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Attach an HTTP status and its canonical reason.
    pub fn with_status(mut self, code: u16, text: impl Into<String>) -> Self {
        self.status_code = Some(code);
        self.status_text = Some(text.into());
        self
    }

    pub fn with_oauth(mut self, metadata: OAuthMetadata) -> Self {
        self.oauth_metadata = Some(metadata);
        self
    }

    pub fn with_sdk_validation(mut self, validation: SdkValidation) -> Self {
        self.sdk_validation = Some(validation);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }
}

/// Outcome of one assessment: metrics or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "camelCase")]
pub enum Assessment {
    Metrics(TokenMetrics),
    Error(AssessmentError),
}

impl Assessment {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Metrics(_))
    }

    pub fn metrics(&self) -> Option<&TokenMetrics> {
        match self {
            Self::Metrics(m) => Some(m),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AssessmentError> {
        match self {
            Self::Metrics(_) => None,
            Self::Error(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<TokenMetrics, AssessmentError> {
        match self {
            Self::Metrics(m) => Ok(m),
            Self::Error(e) => Err(e),
        }
    }
}

impl From<Result<TokenMetrics, AssessmentError>> for Assessment {
    fn from(result: Result<TokenMetrics, AssessmentError>) -> Self {
        match result {
            Ok(m) => Self::Metrics(m),
            Err(e) => Self::Error(e),
        }
    }
}

/// Masked request and response text captured by a test step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    pub request: String,
    pub response: String,
}

/// One step of a connection test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    pub name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StepData>,
}

impl TestStep {
    pub fn passed(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            details: Some(details.into()),
            duration_ms: None,
            data: None,
        }
    }

    pub fn failed(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::passed(name, details)
        }
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn with_data(mut self, data: StepData) -> Self {
        self.data = Some(data);
        self
    }
}

/// Step-by-step report for one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    pub mcp_name: String,
    pub steps: Vec<TestStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AssessmentError>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_resolution() {
        let d = ServerDescriptor::stdio("fs", "npx").with_args(["-y", "pkg"]);
        assert!(matches!(d.transport(), Some(Transport::Process { command: "npx", .. })));

        let d = ServerDescriptor::http("remote", "https://example.com/mcp");
        assert!(matches!(d.transport(), Some(Transport::Http { .. })));

        let mut both = ServerDescriptor::stdio("both", "node");
        both.url = Some("https://example.com".to_string());
        assert!(both.is_process());

        let empty = ServerDescriptor {
            name: "empty".to_string(),
            command: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(empty.transport().is_none());
    }

    #[test]
    fn test_descriptor_deserialize() {
        let d: ServerDescriptor = serde_json::from_str(
            r#"{"name":"gh","url":"https://api.example.com/mcp","headers":{"Authorization":"Bearer x"}}"#,
        )
        .unwrap();
        assert_eq!(d.url.as_deref(), Some("https://api.example.com/mcp"));
        assert_eq!(d.headers.get("Authorization").map(String::as_str), Some("Bearer x"));
        assert!(d.args.is_empty());
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::OauthRequired).unwrap();
        assert_eq!(json, "\"oauth_required\"");
        assert_eq!(ErrorKind::SdkMismatch.to_string(), "sdk_mismatch");
    }

    #[test]
    fn test_assessment_error_shape() {
        let err = AssessmentError::connection_failed("HTTP 502")
            .with_status(502, "Bad Gateway");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "connection_failed");
        assert_eq!(json["statusCode"], 502);
        assert!(json.get("diagnostics").is_none());
        assert_eq!(err.to_string(), "connection_failed: HTTP 502");
    }

    #[test]
    fn test_oauth_metadata_validity() {
        let challenge = OAuthMetadata::from_challenge("Bearer realm=\"x\"");
        assert!(challenge.is_valid());

        let mut well_known = OAuthMetadata::from_challenge("");
        well_known.detected_via = DetectedVia::WellKnown;
        assert!(!well_known.is_valid());
        well_known.authorization_servers.push("https://auth.example.com".to_string());
        assert!(well_known.is_valid());

        let json = serde_json::to_value(&challenge).unwrap();
        assert_eq!(json["detectedVia"], "www-authenticate");
        assert!(json["authorization_servers"].is_array());
    }

    #[test]
    fn test_assessment_exactly_one() {
        let ok = Assessment::from(Ok::<_, AssessmentError>(TokenMetrics::from_tools(&[])));
        assert!(ok.metrics().is_some() && ok.error().is_none());

        let err = Assessment::from(Err::<TokenMetrics, _>(AssessmentError::unknown("boom")));
        assert!(err.metrics().is_none() && err.error().is_some());
        assert!(!err.is_success());
    }

    #[test]
    fn test_step_builders() {
        let step = TestStep::failed("Initialize", "HTTP 500").with_duration_ms(12);
        assert!(!step.success);
        assert_eq!(step.duration_ms, Some(12));
        assert!(step.data.is_none());
    }
}
