// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations,
//! and reading server list files.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ConfigError;
use crate::mcp::ServerDescriptor;

use super::types::{AssessConfigFile, ServersFile};

/// Workspace config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[".mcp-assess.json", ".mcp-assess.yaml", ".mcp-assess.yml"];

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".mcp-assess";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    get_global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration from ~/.mcp-assess/config.json.
pub fn load_global_config() -> Result<Option<AssessConfigFile>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load workspace configuration, searching [`CONFIG_FILES`] in order.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<AssessConfigFile>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<AssessConfigFile, ConfigError> {
    debug!(path = %path.display(), "Loading config");
    parse_file(path)
}

fn parse_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Load server descriptors from a `{"mcpServers": {...}}` file.
///
/// Entries with `"enabled": false` are skipped. The result is sorted by
/// name so sweeps and reports are stable.
pub fn load_servers_file(path: &Path) -> Result<Vec<ServerDescriptor>, ConfigError> {
    let file: ServersFile = parse_file(path)?;

    let mut servers: Vec<ServerDescriptor> = file
        .mcp_servers
        .into_iter()
        .filter(|(_, entry)| entry.enabled != Some(false))
        .map(|(name, entry)| entry.into_descriptor(name))
        .collect();
    servers.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(path = %path.display(), count = servers.len(), "Loaded servers");
    Ok(servers)
}

/// Pick one server by name.
pub fn find_server<'a>(
    servers: &'a [ServerDescriptor],
    name: &str,
) -> Result<&'a ServerDescriptor, ConfigError> {
    servers
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| ConfigError::UnknownServer(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_json_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"httpTimeoutSecs": 4, "checkPackageVersions": true}"#).unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.http_timeout_secs, Some(4));
        assert_eq!(config.check_package_versions, Some(true));
    }

    #[test]
    fn test_load_yaml_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "sweepLimit: 1\nclientName: yaml-client\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.sweep_limit, Some(1));
        assert_eq!(config.client_name.as_deref(), Some("yaml-client"));
    }

    #[test]
    fn test_workspace_search_order() {
        let temp = TempDir::new().unwrap();
        assert!(load_workspace_config(temp.path()).unwrap().is_none());

        std::fs::write(temp.path().join(".mcp-assess.yaml"), "sweepLimit: 2\n").unwrap();
        std::fs::write(temp.path().join(".mcp-assess.json"), r#"{"sweepLimit": 9}"#).unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.sweep_limit, Some(9));
    }

    #[test]
    fn test_invalid_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_config_file(&path), Err(ConfigError::JsonError(_))));

        let missing = temp.path().join("missing.json");
        assert!(matches!(load_config_file(&missing), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_servers_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("servers.json");
        std::fs::write(
            &path,
            r#"{
                "mcpServers": {
                    "remote": {"url": "https://example.com/mcp"},
                    "fs": {"command": "npx", "args": ["-y", "@acme/fs"], "env": {"ROOT": "/tmp"}},
                    "off": {"command": "node", "enabled": false}
                }
            }"#,
        )
        .unwrap();

        let servers = load_servers_file(&path).unwrap();
        let names: Vec<&str> = servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["fs", "remote"]);
        assert!(servers[0].is_process());
        assert_eq!(servers[0].env["ROOT"], "/tmp");

        assert!(find_server(&servers, "remote").is_ok());
        assert!(matches!(
            find_server(&servers, "off"),
            Err(ConfigError::UnknownServer(_))
        ));
    }
}
