// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use super::types::{AssessConfig, AssessConfigFile};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub http_timeout_secs: Option<u64>,
    pub stdio_timeout_secs: Option<u64>,
    pub sweep_limit: Option<usize>,
    pub no_sdk_validation: bool,
    pub check_package_versions: bool,
}

/// Merge configuration layers.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Explicit config file (`--config`)
/// 3. Workspace config (.mcp-assess.json / .mcp-assess.yaml)
/// 4. Global config (~/.mcp-assess/config.json)
/// 5. Default values
pub fn merge_config(layers: &[Option<AssessConfigFile>], cli: &CliOptions) -> AssessConfig {
    let mut result = AssessConfig::default();

    for layer in layers.iter().flatten() {
        apply_file(&mut result, layer);
    }
    apply_cli_options(&mut result, cli);

    result
}

fn apply_file(result: &mut AssessConfig, file: &AssessConfigFile) {
    macro_rules! take {
        ($($field:ident),* $(,)?) => {
            $(if let Some(value) = file.$field.clone() {
                result.$field = value;
            })*
        };
    }

    take!(
        stdio_timeout_secs,
        http_timeout_secs,
        oauth_timeout_secs,
        reachability_timeout_secs,
        sdk_timeout_secs,
        sweep_limit,
        default_unassessed_tokens,
        guard_baseline_tokens,
        sdk_validation,
        check_package_versions,
        client_name,
    );
}

fn apply_cli_options(result: &mut AssessConfig, cli: &CliOptions) {
    if let Some(secs) = cli.http_timeout_secs {
        result.http_timeout_secs = secs;
    }
    if let Some(secs) = cli.stdio_timeout_secs {
        result.stdio_timeout_secs = secs;
    }
    if let Some(limit) = cli.sweep_limit {
        result.sweep_limit = limit;
    }
    if cli.no_sdk_validation {
        result.sdk_validation = false;
    }
    if cli.check_package_versions {
        result.check_package_versions = true;
    }
}
