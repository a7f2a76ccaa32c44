// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry, tracing, and metrics infrastructure.
//!
//! - **Tracing**: structured logging with an `assessment` span per server
//! - **Metrics**: per-transport outcome counters and latency histograms
//!
//! The library never installs a subscriber; the binary does:
//!
//! ```rust,ignore
//! use mcp_assess::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```
//!
//! # Integration Guidelines
//!
//! 1. **Add `#[instrument]` to public async functions**
//! 2. **Record meaningful fields** (server names, status codes, counts; never header values)
//! 3. **Use appropriate log levels** (trace for raw output, debug for protocol steps, info/warn for outcomes)
//! 4. **Gate metric recording** behind the `telemetry` feature

mod init;
pub mod metrics;
mod spans;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{AssessmentMetrics, Histogram, Metrics, MetricsSnapshot, GLOBAL_METRICS};
pub use spans::AssessmentSpan;
