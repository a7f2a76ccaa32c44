// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Package metadata for servers launched through a package runner.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::types::TokenMetrics;

/// Commands that fetch and run a package ad hoc.
pub const PACKAGE_RUNNERS: &[&str] = &["npx", "bunx", "pnpx", "uvx"];

/// Default npm registry.
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// A package referenced by launch arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub name: String,
    /// Pinned version, if the argument carried one other than `latest`.
    pub version: Option<String>,
}

impl PackageRef {
    /// Split `pkg@1.2.3` or `@scope/pkg@1.2.3`.
    pub fn parse(spec: &str) -> Self {
        let search_from = usize::from(spec.starts_with('@'));
        match spec[search_from..].find('@') {
            Some(at) => {
                let at = at + search_from;
                let version = &spec[at + 1..];
                Self {
                    name: spec[..at].to_string(),
                    version: (!version.is_empty() && version != "latest")
                        .then(|| version.to_string()),
                }
            }
            None => Self {
                name: spec.to_string(),
                version: None,
            },
        }
    }
}

/// Whether `command` is a package runner, ignoring path and `.cmd`/`.exe`.
pub fn is_package_runner(command: &str) -> bool {
    let stem = Path::new(command)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(command);
    PACKAGE_RUNNERS.contains(&stem)
}

/// The package a runner command launches: the first non-flag argument.
pub fn package_from_command(command: &str, args: &[String]) -> Option<PackageRef> {
    if !is_package_runner(command) {
        return None;
    }

    args.iter()
        .find(|arg| !arg.starts_with('-'))
        .filter(|arg| !arg.is_empty())
        .map(|arg| PackageRef::parse(arg))
}

/// Record package metadata on metrics.
pub fn apply_package(metrics: &mut TokenMetrics, package: &PackageRef) {
    metrics.package_name = Some(package.name.clone());
    metrics.installed_version = package.version.clone();
}

#[derive(Debug, Deserialize)]
struct LatestManifest {
    version: String,
}

/// Looks up the latest published version of a package.
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl NpmRegistry {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self::with_base_url(client, NPM_REGISTRY_URL, timeout)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Latest version of `package`, or `None` on any failure.
    pub async fn latest_version(&self, package: &str) -> Option<String> {
        let url = format!("{}/{}/latest", self.base_url, package.replace('/', "%2f"));
        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(package, status = r.status().as_u16(), "Registry lookup rejected");
                return None;
            }
            Err(e) => {
                debug!(package, error = %e, "Registry lookup failed");
                return None;
            }
        };

        response
            .json::<LatestManifest>()
            .await
            .ok()
            .map(|m| m.version)
    }

    /// Stamp `latest_version` and `version_checked_at` on metrics that
    /// carry a package name.
    pub async fn annotate(&self, metrics: &mut TokenMetrics) {
        let Some(name) = metrics.package_name.clone() else {
            return;
        };
        if let Some(latest) = self.latest_version(&name).await {
            metrics.latest_version = Some(latest);
            metrics.version_checked_at = Some(Utc::now());
        }
    }
}
