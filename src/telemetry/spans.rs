// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span helpers for consistent instrumentation.

use std::time::Instant;
use tracing::{info_span, Span};

use crate::mcp::{AssessmentError, TokenMetrics};

/// Timing guard for one assessment.
///
/// Carries a `assessment` span with the server and transport; `finish`
/// records the outcome on the span, logs it, and feeds the global metrics.
pub struct AssessmentSpan {
    transport: &'static str,
    start: Instant,
    span: Span,
}

impl AssessmentSpan {
    pub fn start(server: &str, transport: &'static str) -> Self {
        let span = info_span!(
            "assessment",
            server = %server,
            transport,
            duration_ms = tracing::field::Empty,
            success = tracing::field::Empty,
            tools = tracing::field::Empty,
            kind = tracing::field::Empty,
        );

        Self {
            transport,
            start: Instant::now(),
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn transport(&self) -> &'static str {
        self.transport
    }

    /// Record the outcome and close the span.
    pub fn finish(self, result: &Result<TokenMetrics, AssessmentError>) {
        let duration = self.start.elapsed();
        self.span
            .record("duration_ms", duration.as_millis() as u64)
            .record("success", result.is_ok());

        match result {
            Ok(metrics) => {
                self.span.record("tools", metrics.tool_count);
                tracing::info!(
                    parent: &self.span,
                    tokens = metrics.estimated_tokens,
                    "Assessment succeeded"
                );
                #[cfg(feature = "telemetry")]
                super::metrics::GLOBAL_METRICS.record_success(
                    self.transport,
                    duration,
                    metrics.tool_count,
                    metrics.estimated_tokens,
                );
            }
            Err(error) => {
                self.span.record("kind", tracing::field::display(error.kind));
                tracing::warn!(parent: &self.span, "Assessment failed: {}", error.message);
                #[cfg(feature = "telemetry")]
                super::metrics::GLOBAL_METRICS.record_failure(self.transport, duration, error.kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ErrorKind;

    #[test]
    fn test_assessment_span_success() {
        let span = AssessmentSpan::start("fs-span-test", "stdio");
        assert_eq!(span.transport(), "stdio");
        let metrics = TokenMetrics::from_tools(&[serde_json::json!({"name": "read"})]);
        span.finish(&Ok(metrics));

        #[cfg(feature = "telemetry")]
        {
            let recorded = super::super::metrics::GLOBAL_METRICS
                .transport_metrics("stdio")
                .unwrap();
            assert!(recorded.successes >= 1);
        }
    }

    #[test]
    fn test_assessment_span_failure() {
        let span = AssessmentSpan::start("remote-span-test", "http");
        span.finish(&Err(AssessmentError::new(ErrorKind::SdkMismatch, "zero tools")));

        #[cfg(feature = "telemetry")]
        assert!(
            super::super::metrics::GLOBAL_METRICS.failure_count(ErrorKind::SdkMismatch) >= 1
        );
    }
}
