// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token estimation and fleet-wide savings.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::assess::AssessmentCache;
use super::types::ServerDescriptor;

/// Characters per token used for estimation.
pub const CHARS_PER_TOKEN: f64 = 3.5;

/// Tokens assumed for a guarded server that has not been assessed yet.
pub const DEFAULT_UNASSESSED_TOKENS: u64 = 800;

/// Tokens the guard's own tool surface always costs.
pub const GUARD_BASELINE_TOKENS: u64 = 500;

/// `round(chars / 3.5)`.
pub fn estimate_tokens(chars: usize) -> u64 {
    (chars as f64 / CHARS_PER_TOKEN).round() as u64
}

/// Length of the compact JSON serialization of a tool array, counted in
/// UTF-16 code units.
pub fn schema_chars(tools: &[Value]) -> usize {
    serde_json::to_string(tools)
        .map(|s| s.encode_utf16().count())
        .unwrap_or(0)
}

/// Guard-status lookup supplied by the caller.
pub trait GuardStatus {
    fn is_guarded(&self, name: &str) -> bool;
}

impl GuardStatus for HashSet<String> {
    fn is_guarded(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl GuardStatus for HashMap<String, bool> {
    fn is_guarded(&self, name: &str) -> bool {
        self.get(name).copied().unwrap_or(false)
    }
}

/// Constants used by [`calculate_savings_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavingsPolicy {
    pub default_unassessed_tokens: u64,
    pub guard_baseline_tokens: u64,
}

impl Default for SavingsPolicy {
    fn default() -> Self {
        Self {
            default_unassessed_tokens: DEFAULT_UNASSESSED_TOKENS,
            guard_baseline_tokens: GUARD_BASELINE_TOKENS,
        }
    }
}

/// Contribution of one guarded server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSavings {
    pub name: String,
    pub tokens: u64,
    pub estimated: bool,
}

/// Fleet-wide savings summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsSummary {
    /// `max(0, total_tokens_without_guard - guard_baseline_tokens)`.
    pub tokens_saved: u64,
    pub total_tokens_without_guard: u64,
    pub guard_baseline_tokens: u64,
    /// Servers with cached metrics, guarded or not.
    #[serde(rename = "assessedMCPs")]
    pub assessed_mcps: usize,
    /// Servers with guarded status.
    #[serde(rename = "guardedMCPs")]
    pub guarded_mcps: usize,
    /// True when any guarded server fell back to the default estimate.
    pub has_estimates: bool,
    pub servers: Vec<ServerSavings>,
}

/// Aggregate savings with the default policy.
pub fn calculate_savings(
    descriptors: &[ServerDescriptor],
    guard: &dyn GuardStatus,
    cache: &dyn AssessmentCache,
) -> SavingsSummary {
    calculate_savings_with(descriptors, guard, cache, SavingsPolicy::default())
}

/// Aggregate savings over the servers currently known to the caller.
pub fn calculate_savings_with(
    descriptors: &[ServerDescriptor],
    guard: &dyn GuardStatus,
    cache: &dyn AssessmentCache,
    policy: SavingsPolicy,
) -> SavingsSummary {
    let mut summary = SavingsSummary {
        guard_baseline_tokens: policy.guard_baseline_tokens,
        ..Default::default()
    };

    for descriptor in descriptors {
        let metrics = cache.metrics(&descriptor.name);
        if metrics.is_some() {
            summary.assessed_mcps += 1;
        }

        if !guard.is_guarded(&descriptor.name) {
            continue;
        }
        summary.guarded_mcps += 1;

        let (tokens, estimated) = match metrics {
            Some(m) => (m.estimated_tokens, false),
            None => (policy.default_unassessed_tokens, true),
        };

        summary.total_tokens_without_guard += tokens;
        summary.has_estimates |= estimated;
        summary.servers.push(ServerSavings {
            name: descriptor.name.clone(),
            tokens,
            estimated,
        });
    }

    summary.tokens_saved = summary
        .total_tokens_without_guard
        .saturating_sub(policy.guard_baseline_tokens);
    summary
}
