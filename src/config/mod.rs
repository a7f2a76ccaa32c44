// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for mcp-assess.
//!
//! Handles loading and merging of configuration from multiple sources:
//! - Global config: ~/.mcp-assess/config.json
//! - Workspace config: .mcp-assess.json or .mcp-assess.yaml
//! - Explicit config: `--config <path>`
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > explicit > workspace > global > defaults).
//! Server lists are read separately with [`load_servers_file`].

mod loader;
mod merger;
mod types;

pub use loader::{
    find_server, get_global_config_dir, get_global_config_path, load_config_file,
    load_global_config, load_servers_file, load_workspace_config, CONFIG_FILES,
    GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};

pub use merger::{merge_config, CliOptions};

pub use types::{AssessConfig, AssessConfigFile, McpServerEntry, ServersFile};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources for a workspace.
pub fn load_config(
    workspace_root: &Path,
    explicit: Option<&Path>,
    cli_options: CliOptions,
) -> Result<AssessConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let explicit = explicit.map(load_config_file).transpose()?;

    let config = merge_config(&[global, workspace, explicit], &cli_options);
    if config.sweep_limit == 0 {
        return Err(ConfigError::invalid_value("sweepLimit", "must be at least 1"));
    }
    Ok(config)
}
