// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Assessment orchestration.
//!
//! [`Assessor`] picks a transport from the descriptor, runs it, applies
//! the SDK cross-check to HTTP successes and always ends in exactly one
//! [`Assessment`] value. It owns no state between calls: the cache is
//! supplied by the caller and only read before and written after an
//! assessment.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tracing::Instrument;

use super::connection_test::ConnectionTester;
use super::error::McpError;
use super::estimator::{self, GuardStatus, SavingsSummary};
use super::http::HttpTransportClient;
use super::registry::NpmRegistry;
use super::sdk::{self, RmcpValidator, SdkValidator};
use super::stdio::StdioTransportClient;
use super::types::{
    Assessment, AssessmentError, ConnectionTestResult, ServerDescriptor, TestStep, TokenMetrics,
    Transport,
};
use crate::config::AssessConfig;
use crate::telemetry::AssessmentSpan;

/// Caller-owned store of assessment results.
///
/// Storing metrics for a server clears its error and vice versa.
pub trait AssessmentCache {
    fn metrics(&self, name: &str) -> Option<TokenMetrics>;
    fn error(&self, name: &str) -> Option<AssessmentError>;
    fn store_metrics(&mut self, name: &str, metrics: TokenMetrics);
    fn store_error(&mut self, name: &str, error: AssessmentError);
    fn clear_error(&mut self, name: &str);

    /// Store whichever side of an assessment is present.
    fn store(&mut self, name: &str, assessment: &Assessment) {
        match assessment {
            Assessment::Metrics(m) => self.store_metrics(name, m.clone()),
            Assessment::Error(e) => self.store_error(name, e.clone()),
        }
    }

    /// Neither metrics nor an error are cached.
    fn is_pending(&self, name: &str) -> bool {
        self.metrics(name).is_none() && self.error(name).is_none()
    }
}

/// In-memory [`AssessmentCache`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    metrics: HashMap<String, TokenMetrics>,
    errors: HashMap<String, AssessmentError>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.metrics.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssessmentCache for MemoryCache {
    fn metrics(&self, name: &str) -> Option<TokenMetrics> {
        self.metrics.get(name).cloned()
    }

    fn error(&self, name: &str) -> Option<AssessmentError> {
        self.errors.get(name).cloned()
    }

    fn store_metrics(&mut self, name: &str, metrics: TokenMetrics) {
        self.errors.remove(name);
        self.metrics.insert(name.to_string(), metrics);
    }

    fn store_error(&mut self, name: &str, error: AssessmentError) {
        self.metrics.remove(name);
        self.errors.insert(name.to_string(), error);
    }

    fn clear_error(&mut self, name: &str) {
        self.errors.remove(name);
    }
}

/// Top-level entry point for assessing servers.
#[derive(Clone)]
pub struct Assessor {
    config: AssessConfig,
    http: HttpTransportClient,
    stdio: StdioTransportClient,
    sdk: Option<Arc<dyn SdkValidator>>,
    registry: Option<NpmRegistry>,
}

impl Default for Assessor {
    fn default() -> Self {
        Self::new(AssessConfig::default())
    }
}

impl Assessor {
    /// Build an assessor with the reference `rmcp` validator.
    pub fn new(config: AssessConfig) -> Self {
        let client = Client::new();
        let http = HttpTransportClient::new(
            client.clone(),
            config.http_timeout(),
            config.oauth_timeout(),
            config.client_name.clone(),
        );
        let stdio = StdioTransportClient::new(config.stdio_timeout(), config.client_name.clone());
        let sdk: Option<Arc<dyn SdkValidator>> = config
            .sdk_validation
            .then(|| Arc::new(RmcpValidator::new(config.sdk_timeout())) as Arc<dyn SdkValidator>);
        let registry = config
            .check_package_versions
            .then(|| NpmRegistry::new(client, config.oauth_timeout()));

        Self {
            config,
            http,
            stdio,
            sdk,
            registry,
        }
    }

    /// Replace the SDK validator (or disable it with `None`).
    pub fn with_sdk_validator(mut self, validator: Option<Arc<dyn SdkValidator>>) -> Self {
        self.sdk = validator;
        self
    }

    /// Replace the package registry (or disable version checks with `None`).
    pub fn with_registry(mut self, registry: Option<NpmRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &AssessConfig {
        &self.config
    }

    pub fn http(&self) -> &HttpTransportClient {
        &self.http
    }

    /// Assess one server.
    ///
    /// Always completes with exactly one of metrics or an error.
    pub async fn assess(&self, descriptor: &ServerDescriptor) -> Assessment {
        let transport = descriptor.transport();
        let label = match &transport {
            Some(Transport::Process { .. }) => "stdio",
            Some(Transport::Http { .. }) => "http",
            None => "none",
        };
        let span = AssessmentSpan::start(&descriptor.name, label);

        let result = match transport {
            Some(Transport::Process { command, args, env }) => {
                self.assess_process(descriptor, command, args, env)
                    .instrument(span.span().clone())
                    .await
            }
            Some(Transport::Http { url, headers }) => {
                self.assess_http(&descriptor.name, url, headers)
                    .instrument(span.span().clone())
                    .await
            }
            None => Err(AssessmentError::unknown(
                "Server has neither a command nor a url",
            )),
        };

        span.finish(&result);
        result.into()
    }

    async fn assess_process(
        &self,
        descriptor: &ServerDescriptor,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<TokenMetrics, AssessmentError> {
        let mut metrics = self
            .stdio
            .assess(&descriptor.name, command, args, env)
            .await
            .map_err(process_error)?;

        if metrics.tool_count == 0 {
            return Err(AssessmentError::unknown("Server returned no tools"));
        }

        if let Some(registry) = &self.registry {
            registry.annotate(&mut metrics).await;
        }
        Ok(metrics)
    }

    async fn assess_http(
        &self,
        name: &str,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<TokenMetrics, AssessmentError> {
        let metrics = self.http.assess(name, url, headers).await?;

        match &self.sdk {
            Some(validator) => sdk::cross_validate(validator.as_ref(), url, headers, metrics).await,
            None => Ok(metrics),
        }
    }

    /// Assess and record the outcome in the cache.
    pub async fn assess_into(
        &self,
        descriptor: &ServerDescriptor,
        cache: &mut dyn AssessmentCache,
    ) -> Assessment {
        let assessment = self.assess(descriptor).await;
        cache.store(&descriptor.name, &assessment);
        assessment
    }

    /// Clear the previous error, then assess again.
    pub async fn reassess(
        &self,
        descriptor: &ServerDescriptor,
        cache: &mut dyn AssessmentCache,
    ) -> Assessment {
        cache.clear_error(&descriptor.name);
        self.assess_into(descriptor, cache).await
    }

    /// Assess up to `sweep_limit` servers that have nothing cached, one
    /// after another, in input order. Later candidates wait for the next
    /// sweep.
    pub async fn sweep(
        &self,
        descriptors: &[ServerDescriptor],
        cache: &mut dyn AssessmentCache,
    ) -> Vec<(String, Assessment)> {
        let candidates: Vec<&ServerDescriptor> = descriptors
            .iter()
            .filter(|d| cache.is_pending(&d.name))
            .take(self.config.sweep_limit)
            .collect();

        let mut results = Vec::with_capacity(candidates.len());
        for descriptor in candidates {
            let assessment = self.assess_into(descriptor, cache).await;
            results.push((descriptor.name.clone(), assessment));
        }
        results
    }
}

impl Assessor {
    /// Step-by-step diagnostic run for one server.
    pub async fn test_connection<F>(
        &self,
        descriptor: &ServerDescriptor,
        on_progress: F,
    ) -> ConnectionTestResult
    where
        F: FnMut(&TestStep),
    {
        ConnectionTester::new(self.http.clone(), self.config.reachability_timeout())
            .run(descriptor, on_progress)
            .await
    }

    /// Savings across `descriptors` using the configured token constants.
    pub fn savings(
        &self,
        descriptors: &[ServerDescriptor],
        guard: &dyn GuardStatus,
        cache: &dyn AssessmentCache,
    ) -> SavingsSummary {
        estimator::calculate_savings_with(descriptors, guard, cache, self.config.savings_policy())
    }
}

/// Process failures carry no status to classify against; they are all
/// `unknown`, with the transport's description as the message.
fn process_error(error: McpError) -> AssessmentError {
    AssessmentError::unknown(format!("Failed to assess stdio server: {}", error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_exclusive() {
        let mut cache = MemoryCache::new();
        assert!(cache.is_pending("a"));

        cache.store_error("a", AssessmentError::unknown("x"));
        assert!(cache.error("a").is_some());
        assert!(!cache.is_pending("a"));

        cache.store_metrics("a", TokenMetrics::from_tools(&[]));
        assert!(cache.error("a").is_none());
        assert!(cache.metrics("a").is_some());
        assert_eq!(cache.len(), 1);

        cache.store("a", &Assessment::Error(AssessmentError::timeout("t")));
        assert!(cache.metrics("a").is_none());
    }

    #[tokio::test]
    async fn test_descriptor_without_transport() {
        let assessor = Assessor::default().with_sdk_validator(None);
        let descriptor = ServerDescriptor {
            name: "empty".to_string(),
            ..Default::default()
        };

        let assessment = assessor.assess(&descriptor).await;
        let err = assessment.error().unwrap();
        assert_eq!(err.kind, super::super::types::ErrorKind::Unknown);
        assert!(err.message.contains("neither"));
    }

    #[tokio::test]
    async fn test_spawn_failure_maps_to_unknown() {
        let assessor = Assessor::default();
        let descriptor = ServerDescriptor::stdio("missing", "definitely-not-a-real-binary-4242");

        let assessment = assessor.assess(&descriptor).await;
        let err = assessment.error().unwrap();
        assert_eq!(err.kind, super::super::types::ErrorKind::Unknown);
        assert!(err.message.starts_with("Failed to assess stdio server"));
        assert!(err.diagnostics.is_none());
    }

    #[tokio::test]
    async fn test_reassess_clears_previous_error() {
        let assessor = Assessor::default();
        let descriptor = ServerDescriptor::stdio("missing", "definitely-not-a-real-binary-4242");
        let mut cache = MemoryCache::new();

        let first_error = AssessmentError::timeout("old");
        cache.store_error("missing", first_error.clone());

        let assessment = assessor.reassess(&descriptor, &mut cache).await;
        let cached = cache.error("missing").unwrap();
        assert_ne!(cached, first_error);
        assert_eq!(Some(&cached), assessment.error());
    }

    #[tokio::test]
    async fn test_sweep_takes_first_three_pending() {
        let assessor = Assessor::default();
        let descriptors: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| ServerDescriptor::stdio(*n, "definitely-not-a-real-binary-4242"))
            .collect();

        let mut cache = MemoryCache::new();
        cache.store_metrics("b", TokenMetrics::from_tools(&[]));

        let first: Vec<String> = assessor
            .sweep(&descriptors, &mut cache)
            .await
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(first, vec!["a", "c", "d"]);

        let second: Vec<String> = assessor
            .sweep(&descriptors, &mut cache)
            .await
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(second, vec!["e"]);

        assert!(assessor.sweep(&descriptors, &mut cache).await.is_empty());
    }
}
