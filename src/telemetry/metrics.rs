// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collection for assessments.
//!
//! Lightweight in-process counters: per-transport latency and outcome,
//! failures by kind, and totals of tools and tokens seen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::mcp::ErrorKind;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Assessment metrics keyed by transport (`stdio`, `http`, `none`).
    transports: RwLock<HashMap<String, AssessmentMetrics>>,

    /// Failure counts by classification.
    failures: RwLock<HashMap<ErrorKind, u64>>,

    /// Connection test runs.
    connection_tests: RwLock<AssessmentMetrics>,

    tools_seen: AtomicU64,
    tokens_estimated: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            transports: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            connection_tests: RwLock::new(AssessmentMetrics::new()),
            tools_seen: AtomicU64::new(0),
            tokens_estimated: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a successful assessment.
    pub fn record_success(&self, transport: &str, duration: Duration, tools: usize, tokens: u64) {
        write(&self.transports)
            .entry(transport.to_string())
            .or_default()
            .record(duration, true);
        self.tools_seen.fetch_add(tools as u64, Ordering::Relaxed);
        self.tokens_estimated.fetch_add(tokens, Ordering::Relaxed);
    }

    /// Record a failed assessment.
    pub fn record_failure(&self, transport: &str, duration: Duration, kind: ErrorKind) {
        write(&self.transports)
            .entry(transport.to_string())
            .or_default()
            .record(duration, false);
        *write(&self.failures).entry(kind).or_insert(0) += 1;
    }

    /// Record a connection test run.
    pub fn record_connection_test(&self, duration: Duration, success: bool) {
        write(&self.connection_tests).record(duration, success);
    }

    pub fn transport_metrics(&self, transport: &str) -> Option<AssessmentMetrics> {
        read(&self.transports).get(transport).cloned()
    }

    pub fn failure_count(&self, kind: ErrorKind) -> u64 {
        read(&self.failures).get(&kind).copied().unwrap_or(0)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transports: read(&self.transports).clone(),
            failures: read(&self.failures).clone(),
            connection_tests: read(&self.connection_tests).clone(),
            tools_seen: self.tools_seen.load(Ordering::Relaxed),
            tokens_estimated: self.tokens_estimated.load(Ordering::Relaxed),
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        write(&self.transports).clear();
        write(&self.failures).clear();
        *write(&self.connection_tests) = AssessmentMetrics::new();
        self.tools_seen.store(0, Ordering::Relaxed);
        self.tokens_estimated.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome and latency counters for one kind of run.
#[derive(Debug, Clone)]
pub struct AssessmentMetrics {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl AssessmentMetrics {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            successes: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration, success: bool) {
        self.attempts += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        if self.attempts == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.attempts as u32
        }
    }

    /// Success rate (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            1.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

impl Default for AssessmentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple histogram with fixed buckets for latency tracking.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Bucket boundaries in microseconds.
    buckets: Vec<u64>,

    /// Count per bucket, plus one overflow bucket.
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Approximate percentile as the upper bound of the containing bucket.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = match self.buckets.get(i) {
                    Some(&bound) => bound,
                    None => self.buckets.last().copied().unwrap_or(0) * 2,
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 10ms, 100ms, 1s, 5s, 10s, 15s: the last two match the HTTP and stdio budgets
        Self::with_buckets(vec![
            10_000, 100_000, 1_000_000, 5_000_000, 10_000_000, 15_000_000,
        ])
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub transports: HashMap<String, AssessmentMetrics>,
    pub failures: HashMap<ErrorKind, u64>,
    pub connection_tests: AssessmentMetrics,
    pub tools_seen: u64,
    pub tokens_estimated: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Assessment Metrics ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Tools seen: {}, estimated tokens: {}\n\n",
            self.tools_seen, self.tokens_estimated
        ));

        if !self.transports.is_empty() {
            let mut names: Vec<&String> = self.transports.keys().collect();
            names.sort();

            report.push_str("By transport:\n");
            for name in names {
                let m = &self.transports[name];
                report.push_str(&format!(
                    "  {}: {} runs, {:.1}% success, avg {:.2?}, p99 {:.2?}\n",
                    name,
                    m.attempts,
                    m.success_rate() * 100.0,
                    m.avg_duration(),
                    m.histogram.p99()
                ));
            }
            report.push('\n');
        }

        if !self.failures.is_empty() {
            let mut failures: Vec<(String, u64)> = self
                .failures
                .iter()
                .map(|(kind, count)| (kind.to_string(), *count))
                .collect();
            failures.sort();

            report.push_str("Failures:\n");
            for (kind, count) in failures {
                report.push_str(&format!("  {}: {}\n", kind, count));
            }
            report.push('\n');
        }

        if self.connection_tests.attempts > 0 {
            report.push_str(&format!(
                "Connection tests: {} runs, {} passed\n",
                self.connection_tests.attempts, self.connection_tests.successes
            ));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assessment_metrics() {
        let mut metrics = AssessmentMetrics::new();
        metrics.record(Duration::from_millis(100), true);
        metrics.record(Duration::from_millis(200), true);
        metrics.record(Duration::from_millis(60), false);

        assert_eq!(metrics.attempts, 3);
        assert_eq!(metrics.successes, 2);
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.avg_duration(), Duration::from_millis(120));
        assert!((metrics.success_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_histogram() {
        let mut hist = Histogram::default();
        hist.record(Duration::from_millis(5)); // <=10ms
        hist.record(Duration::from_millis(50)); // <=100ms
        hist.record(Duration::from_secs(12)); // <=15s
        hist.record(Duration::from_secs(20)); // overflow

        assert_eq!(hist.counts()[0], 1);
        assert_eq!(hist.counts()[1], 1);
        assert_eq!(hist.counts()[5], 1);
        assert_eq!(hist.counts()[6], 1);
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut hist = Histogram::default();
        for _ in 0..100 {
            hist.record(Duration::from_millis(400));
        }

        assert_eq!(hist.p50(), Duration::from_secs(1));
        assert_eq!(hist.p99(), Duration::from_secs(1));
    }

    #[test]
    fn test_record_outcomes() {
        let metrics = Metrics::new();
        metrics.record_success("http", Duration::from_millis(80), 4, 900);
        metrics.record_failure("http", Duration::from_millis(20), ErrorKind::OauthRequired);
        metrics.record_failure("stdio", Duration::from_secs(15), ErrorKind::Unknown);

        let http = metrics.transport_metrics("http").unwrap();
        assert_eq!(http.attempts, 2);
        assert_eq!(http.successes, 1);
        assert_eq!(metrics.failure_count(ErrorKind::OauthRequired), 1);
        assert_eq!(metrics.failure_count(ErrorKind::Timeout), 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tools_seen, 4);
        assert_eq!(snapshot.tokens_estimated, 900);

        let report = snapshot.format_report();
        assert!(report.contains("http: 2 runs"));
        assert!(report.contains("oauth_required: 1"));
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new();
        metrics.record_success("stdio", Duration::from_millis(100), 1, 10);
        metrics.record_connection_test(Duration::from_millis(10), true);

        metrics.reset();

        assert!(metrics.transport_metrics("stdio").is_none());
        assert_eq!(metrics.snapshot().tools_seen, 0);
        assert_eq!(metrics.snapshot().connection_tests.attempts, 0);
    }
}
