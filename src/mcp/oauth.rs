// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OAuth requirement detection.
//!
//! Two independent signals, either of which is enough:
//!
//! - `GET {origin}/.well-known/oauth-protected-resource` returning metadata
//!   with at least one authorization server.
//! - A `WWW-Authenticate` header containing a bearer challenge on a 401/403.
//!
//! When both fire, the well-known metadata is preferred.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::types::{DetectedVia, OAuthMetadata};

/// Path of the protected-resource metadata document.
pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-protected-resource";

/// Wire shape of the protected-resource metadata document.
#[derive(Debug, Deserialize)]
struct ProtectedResourceDocument {
    resource: Option<String>,
    #[serde(default)]
    authorization_servers: Vec<String>,
    #[serde(default)]
    scopes_supported: Vec<String>,
    #[serde(default)]
    bearer_methods_supported: Vec<String>,
    resource_documentation: Option<String>,
}

/// Whether a status code should trigger OAuth discovery.
pub fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Well-known metadata URL for a server endpoint.
pub fn well_known_url(server_url: &str) -> Option<String> {
    let url = Url::parse(server_url).ok()?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(format!("{}{}", origin.ascii_serialization(), WELL_KNOWN_PATH))
}

/// Inspect a `WWW-Authenticate` header for a bearer challenge.
pub fn challenge_from_headers(headers: &HeaderMap) -> Option<OAuthMetadata> {
    let value = headers.get(WWW_AUTHENTICATE)?.to_str().ok()?;
    if value.to_ascii_lowercase().contains("bearer") {
        Some(OAuthMetadata::from_challenge(value))
    } else {
        None
    }
}

/// Detects whether a server requires OAuth.
#[derive(Debug, Clone)]
pub struct OAuthDiscovery {
    client: Client,
    timeout: Duration,
}

impl OAuthDiscovery {
    /// Create a discovery helper with the given lookup timeout.
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch and validate well-known metadata. Any failure yields `None`.
    pub async fn fetch_well_known(&self, server_url: &str) -> Option<OAuthMetadata> {
        let url = well_known_url(server_url)?;

        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "Well-known OAuth lookup failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(url = %url, status = response.status().as_u16(), "No OAuth metadata");
            return None;
        }

        let document: ProtectedResourceDocument = response.json().await.ok()?;
        let metadata = OAuthMetadata {
            resource: document.resource,
            authorization_servers: document.authorization_servers,
            scopes_supported: document.scopes_supported,
            bearer_methods_supported: document.bearer_methods_supported,
            resource_documentation: document.resource_documentation,
            detected_via: DetectedVia::WellKnown,
            www_authenticate: None,
            discovered_at: Utc::now(),
        };

        metadata.is_valid().then_some(metadata)
    }

    /// Check both signals for a 401/403 response.
    ///
    /// Well-known metadata wins; the raw challenge is still kept on it.
    pub async fn detect(&self, server_url: &str, headers: &HeaderMap) -> Option<OAuthMetadata> {
        let challenge = challenge_from_headers(headers);

        match self.fetch_well_known(server_url).await {
            Some(mut metadata) => {
                metadata.www_authenticate = challenge.and_then(|c| c.www_authenticate);
                Some(metadata)
            }
            None => challenge,
        }
    }
}
