// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration types.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mcp::estimator::{SavingsPolicy, DEFAULT_UNASSESSED_TOKENS, GUARD_BASELINE_TOKENS};
use crate::mcp::ServerDescriptor;

/// Config file contents. Every field is optional; unset fields fall
/// through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdio_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachability_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_timeout_secs: Option<u64>,

    /// Maximum servers assessed per sweep
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_limit: Option<usize>,

    /// Token estimate for guarded servers that have not been assessed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_unassessed_tokens: Option<u64>,

    /// Fixed token cost of the guard's own tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard_baseline_tokens: Option<u64>,

    /// Cross-check HTTP results against the reference client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_validation: Option<bool>,

    /// Look up the latest published version of package-runner servers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_package_versions: Option<bool>,

    /// Name sent as `clientInfo.name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessConfig {
    pub stdio_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub oauth_timeout_secs: u64,
    pub reachability_timeout_secs: u64,
    pub sdk_timeout_secs: u64,
    pub sweep_limit: usize,
    pub default_unassessed_tokens: u64,
    pub guard_baseline_tokens: u64,
    pub sdk_validation: bool,
    pub check_package_versions: bool,
    pub client_name: String,
}

impl Default for AssessConfig {
    fn default() -> Self {
        Self {
            stdio_timeout_secs: 15,
            http_timeout_secs: 10,
            oauth_timeout_secs: 5,
            reachability_timeout_secs: 5,
            sdk_timeout_secs: 10,
            sweep_limit: 3,
            default_unassessed_tokens: DEFAULT_UNASSESSED_TOKENS,
            guard_baseline_tokens: GUARD_BASELINE_TOKENS,
            sdk_validation: true,
            check_package_versions: false,
            client_name: crate::CLIENT_NAME.to_string(),
        }
    }
}

impl AssessConfig {
    pub fn stdio_timeout(&self) -> Duration {
        Duration::from_secs(self.stdio_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn oauth_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth_timeout_secs)
    }

    pub fn reachability_timeout(&self) -> Duration {
        Duration::from_secs(self.reachability_timeout_secs)
    }

    pub fn sdk_timeout(&self) -> Duration {
        Duration::from_secs(self.sdk_timeout_secs)
    }

    pub fn savings_policy(&self) -> SavingsPolicy {
        SavingsPolicy {
            default_unassessed_tokens: self.default_unassessed_tokens,
            guard_baseline_tokens: self.guard_baseline_tokens,
        }
    }
}

/// One entry of a server list file.
///
/// Both shapes share the struct; which one applies is decided by
/// [`ServerDescriptor::transport`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Disabled entries are skipped when loading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl McpServerEntry {
    pub fn into_descriptor(self, name: impl Into<String>) -> ServerDescriptor {
        ServerDescriptor {
            name: name.into(),
            command: self.command,
            args: self.args,
            env: self.env,
            url: self.url,
            headers: self.headers,
        }
    }
}

/// Server list file: `{"mcpServers": {"name": {...}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServersFile {
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AssessConfig::default();
        assert_eq!(config.stdio_timeout(), Duration::from_secs(15));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.reachability_timeout(), Duration::from_secs(5));
        assert_eq!(config.sweep_limit, 3);
        assert!(config.sdk_validation);
        assert!(!config.check_package_versions);
        assert_eq!(config.savings_policy(), SavingsPolicy::default());
    }

    #[test]
    fn test_config_file_camel_case() {
        let file: AssessConfigFile =
            serde_json::from_str(r#"{"httpTimeoutSecs": 3, "sdkValidation": false}"#).unwrap();
        assert_eq!(file.http_timeout_secs, Some(3));
        assert_eq!(file.sdk_validation, Some(false));
        assert!(file.sweep_limit.is_none());
    }

    #[test]
    fn test_server_entry_into_descriptor() {
        let entry: McpServerEntry = serde_json::from_str(
            r#"{"url": "https://example.com/mcp", "headers": {"X-Api-Key": "k"}}"#,
        )
        .unwrap();
        let descriptor = entry.into_descriptor("remote");
        assert_eq!(descriptor.name, "remote");
        assert_eq!(descriptor.url.as_deref(), Some("https://example.com/mcp"));
        assert_eq!(descriptor.headers["X-Api-Key"], "k");
        assert!(descriptor.command.is_none());
    }
}
