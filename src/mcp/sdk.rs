// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Cross-validation against the reference MCP client.
//!
//! The raw HTTP client is forgiving; the guard itself talks to servers
//! through `rmcp`. A server that answers the former but not the latter is
//! reported as `sdk_mismatch`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::transport::streamable_http_client::{
    StreamableHttpClientTransport, StreamableHttpClientTransportConfig,
};
use rmcp::ServiceExt;
use tracing::{debug, warn};

use super::types::{AssessmentError, ErrorKind, SdkValidation, TokenMetrics};

/// Default budget for connecting and listing through the reference client.
pub const DEFAULT_SDK_TIMEOUT: Duration = Duration::from_secs(10);

/// Lists tools through an independent client implementation.
#[async_trait]
pub trait SdkValidator: Send + Sync {
    /// Number of tools the reference client sees, or a description of why
    /// it could not connect.
    async fn count_tools(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<usize, String>;
}

/// [`SdkValidator`] backed by `rmcp`'s streamable HTTP client.
#[derive(Debug, Clone)]
pub struct RmcpValidator {
    timeout: Duration,
}

impl Default for RmcpValidator {
    fn default() -> Self {
        Self::new(DEFAULT_SDK_TIMEOUT)
    }
}

impl RmcpValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn http_client(headers: &HashMap<String, String>) -> Result<reqwest::Client, String> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    default_headers.insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid header for reference client"),
            }
        }

        reqwest::Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {}", e))
    }
}

#[async_trait]
impl SdkValidator for RmcpValidator {
    async fn count_tools(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<usize, String> {
        let client = Self::http_client(headers)?;
        let transport = StreamableHttpClientTransport::with_client(
            client,
            StreamableHttpClientTransportConfig::with_uri(url.to_string()),
        );

        let service = match tokio::time::timeout(self.timeout, ().serve(transport)).await {
            Ok(Ok(service)) => service,
            Ok(Err(e)) => return Err(format!("SDK initialize failed: {}", e)),
            Err(_) => {
                return Err(format!(
                    "SDK connection timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        };

        let listed = tokio::time::timeout(self.timeout, service.list_all_tools()).await;
        if let Err(e) = service.cancel().await {
            debug!(error = %e, "Reference client shutdown failed");
        }

        match listed {
            Ok(Ok(tools)) => Ok(tools.len()),
            Ok(Err(e)) => Err(format!("SDK tools/list failed: {}", e)),
            Err(_) => Err(format!(
                "SDK tools/list timed out after {}s",
                self.timeout.as_secs()
            )),
        }
    }
}

/// Compare the raw result with the reference client.
///
/// Returns the metrics untouched when the reference client agrees that
/// the server has tools.
pub async fn cross_validate(
    validator: &dyn SdkValidator,
    url: &str,
    headers: &HashMap<String, String>,
    metrics: TokenMetrics,
) -> Result<TokenMetrics, AssessmentError> {
    let direct = metrics.tool_count;

    match validator.count_tools(url, headers).await {
        Ok(0) => {
            warn!(url, direct, "Reference client sees no tools");
            Err(AssessmentError::new(
                ErrorKind::SdkMismatch,
                format!(
                    "Direct request found {} tools but the MCP SDK transport found none",
                    direct
                ),
            )
            .with_sdk_validation(SdkValidation {
                direct_fetch_tools: direct,
                sdk_transport_tools: 0,
                sdk_error: None,
            }))
        }
        Ok(count) => {
            debug!(url, direct, sdk = count, "Reference client agrees");
            Ok(metrics)
        }
        Err(sdk_error) => {
            warn!(url, direct, error = %sdk_error, "Reference client failed");
            Err(AssessmentError::new(
                ErrorKind::SdkMismatch,
                format!(
                    "Direct request found {} tools but the MCP SDK transport failed: {}",
                    direct, sdk_error
                ),
            )
            .with_sdk_validation(SdkValidation {
                direct_fetch_tools: direct,
                sdk_transport_tools: -1,
                sdk_error: Some(sdk_error),
            }))
        }
    }
}
